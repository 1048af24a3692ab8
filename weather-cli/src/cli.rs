use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use weather_lookup_core::{
    Config, DisabledLocator, IpLocator, LocationQuery, Locator, RequestState, WeatherClient,
    provider_from_config,
};

use crate::{interactive, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather for a city or your location")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key, display language and default city.
    Configure,

    /// Show current weather once.
    ///
    /// Without a city or coordinates, your location is looked up and the
    /// default city is used if that fails.
    Show {
        /// City name, e.g. "Tehran".
        #[arg(conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        #[command(flatten)]
        opts: LookupOpts,
    },

    /// Look up your location, then keep accepting city searches.
    Interactive {
        #[command(flatten)]
        opts: LookupOpts,
    },

    /// Print where the config file lives.
    ConfigPath,
}

#[derive(Debug, clap::Args)]
pub struct LookupOpts {
    /// Override the configured display language for this run.
    #[arg(long)]
    lang: Option<String>,

    /// Skip geolocation and go straight to the default city.
    #[arg(long)]
    no_locate: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                city,
                lat,
                lon,
                opts,
            } => {
                let cfg = opts.apply(Config::load()?);
                let client = client_from_config(&cfg)?;

                eprintln!("{}", render::render(&RequestState::Loading));
                match (city, lat.zip(lon)) {
                    (Some(city), _) => {
                        client.resolve(LocationQuery::by_name(&city)?).await?;
                    }
                    (None, Some((lat, lon))) => {
                        client.resolve(LocationQuery::ByCoordinates { lat, lon }).await?;
                    }
                    (None, None) => {
                        let locator = locator(&cfg, opts.no_locate)?;
                        client
                            .resolve_startup(
                                locator.as_ref(),
                                &cfg.default_city,
                                cfg.geolocation_timeout(),
                            )
                            .await?;
                    }
                }

                match client.state() {
                    RequestState::Error(message) => anyhow::bail!(message),
                    state => println!("{}", render::render(&state)),
                }
                Ok(())
            }
            Command::Interactive { opts } => {
                let cfg = opts.apply(Config::load()?);
                let client = client_from_config(&cfg)?;
                let locator = locator(&cfg, opts.no_locate)?;

                interactive::run(client, locator, &cfg).await
            }
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
                Ok(())
            }
        }
    }
}

impl LookupOpts {
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(lang) = &self.lang {
            cfg.language = lang.clone();
        }
        cfg
    }
}

fn client_from_config(cfg: &Config) -> Result<WeatherClient> {
    Ok(WeatherClient::new(provider_from_config(cfg)?))
}

fn locator(cfg: &Config, disabled: bool) -> Result<Box<dyn Locator>> {
    if disabled {
        return Ok(Box::new(DisabledLocator));
    }
    Ok(Box::new(IpLocator::new(cfg.geolocation_timeout())?))
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    let key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()
        .context("Failed to read API key")?;
    if !key.trim().is_empty() {
        cfg.set_api_key(key);
    }

    let language = Text::new("Display language:")
        .with_default(&cfg.language)
        .prompt()
        .context("Failed to read display language")?;
    if !language.trim().is_empty() {
        cfg.language = language.trim().to_string();
    }

    let city = Text::new("Default city:")
        .with_default(&cfg.default_city)
        .with_help_message("Used when your location cannot be determined")
        .prompt()
        .context("Failed to read default city")?;
    if !city.trim().is_empty() {
        cfg.default_city = city.trim().to_string();
    }

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}
