use chrono::Local;
use weather_lookup_core::{RequestState, WeatherReport};

/// Text for one state. `Idle` renders as nothing.
pub fn render(state: &RequestState) -> String {
    match state {
        RequestState::Idle => String::new(),
        RequestState::Loading => "Loading...".to_string(),
        RequestState::Error(message) => format!("Error: {message}"),
        RequestState::Loaded(report) => render_report(report),
    }
}

fn render_report(report: &WeatherReport) -> String {
    let place = if report.country.is_empty() {
        report.city.clone()
    } else {
        format!("{}, {}", report.city, report.country)
    };

    let mut lines = vec![
        place,
        format!("{}°  {}", report.rounded_temperature(), report.description),
        format!("Feels like:  {}°", report.rounded_feels_like()),
        format!("Humidity:    {}%", report.humidity_pct),
        format!("Wind:        {} m/s", report.wind_speed_mps),
    ];

    if !report.icon.is_empty() {
        lines.push(format!("Icon:        {}", report.icon_url()));
    }
    if let Some(observed) = report.observed_at {
        lines.push(format!(
            "Observed:    {}",
            observed.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }

    lines.join("\n")
}
