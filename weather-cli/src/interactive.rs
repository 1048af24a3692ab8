use anyhow::Result;
use inquire::{InquireError, Text};
use tokio::sync::watch;
use weather_lookup_core::{Config, LocationQuery, Locator, RequestState, WeatherClient};

use crate::render;

/// Startup lookup in the background, then a search prompt until Esc/Ctrl-C.
///
/// Output only happens between prompts. A search supersedes the startup
/// lookup if that is still in flight; an empty line shows the latest state.
pub async fn run(client: WeatherClient, locator: Box<dyn Locator>, cfg: &Config) -> Result<()> {
    let mut states = client.subscribe();

    let mut startup = Some(tokio::spawn({
        let client = client.clone();
        let fallback = cfg.default_city.clone();
        let wait = cfg.geolocation_timeout();
        async move {
            if let Err(err) = client.resolve_startup(locator.as_ref(), &fallback, wait).await {
                log::warn!("startup lookup failed: {err}");
            }
        }
    }));

    loop {
        if let Some(text) = unseen_state(&mut states) {
            println!("{text}\n");
        }

        let input = tokio::task::spawn_blocking(|| {
            Text::new("City:")
                .with_help_message("Enter to search, empty line to refresh, Esc to quit")
                .prompt()
        })
        .await?;

        let input = match input {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        let lookup = match LocationQuery::by_name(&input).and_then(|q| client.start(q)) {
            Ok(lookup) => lookup,
            Err(_) => {
                // Blank line: nothing issued, show where things stand.
                let text = render::render(&states.borrow_and_update());
                if !text.is_empty() {
                    println!("{text}\n");
                }
                continue;
            }
        };

        if let Some(task) = startup.take() {
            task.abort();
        }

        eprintln!("{}", render::render(&RequestState::Loading));
        lookup.finish().await;
    }

    if let Some(task) = startup {
        task.abort();
    }
    Ok(())
}

/// Rendered state if it changed since last shown; `Idle` and `Loading`
/// are skipped, the prompt loop shows progress itself.
fn unseen_state(states: &mut watch::Receiver<RequestState>) -> Option<String> {
    if !states.has_changed().unwrap_or(false) {
        return None;
    }
    let state = states.borrow_and_update();
    state.is_terminal().then(|| render::render(&state))
}
