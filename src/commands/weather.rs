//! `.weather [city]` via the OpenWeatherMap current-weather API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CommandError, CommandHandler, Invocation, Reply};

/// Offset between Kelvin and Celsius.
const KELVIN_OFFSET: f64 = 273.15;

/// Message OpenWeatherMap puts in a 200 response for an unknown city.
const NOT_FOUND_MESSAGE: &str = "Error: Not found city";

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    message: Option<serde_json::Value>,
    name: Option<String>,
    sys: Option<Sys>,
    main: Option<Main>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Sys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

/// Current-weather lookup.
#[derive(Debug, Clone)]
pub struct Weather {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    default_city: String,
}

impl Weather {
    /// Create the handler against `url` (the `/data/2.5/weather` endpoint).
    pub fn new(
        client: reqwest::Client,
        url: String,
        api_key: Option<String>,
        default_city: String,
    ) -> Self {
        Self {
            client,
            url,
            api_key,
            default_city,
        }
    }

    /// City from the arguments: the first two words, or the default.
    fn city(&self, invocation: &Invocation) -> String {
        match invocation.args.as_slice() {
            [] => self.default_city.clone(),
            [one] => one.clone(),
            [first, second, ..] => format!("{first} {second}"),
        }
    }

    async fn fetch(&self, city: &str) -> Result<String, CommandError> {
        let mut request = self.client.get(&self.url).query(&[("q", city)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("appid", key.as_str())]);
        }
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CommandError::NotFound(city.to_owned()));
        }
        if !status.is_success() {
            return Err(CommandError::Status(status.as_u16()));
        }
        let report: Report = response.json().await?;
        render_report(&report, city)
    }
}

fn render_report(report: &Report, city: &str) -> Result<String, CommandError> {
    if report
        .message
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .is_some_and(|m| m == NOT_FOUND_MESSAGE)
    {
        return Err(CommandError::NotFound(city.to_owned()));
    }
    let (Some(name), Some(sys), Some(main)) = (&report.name, &report.sys, &report.main) else {
        return Err(CommandError::Malformed("missing name, sys or main".to_owned()));
    };
    let condition = report
        .weather
        .first()
        .map(|c| c.description.as_str())
        .unwrap_or("unknown");
    let celsius = main.temp - KELVIN_OFFSET;

    Ok(format!(
        "{name}, {} | {celsius:.1}°C | {condition} | Rel. Humidity: {}% | {}hPa",
        sys.country, main.humidity, main.pressure
    ))
}

#[async_trait]
impl CommandHandler for Weather {
    fn name(&self) -> &'static str {
        ".weather"
    }

    fn usage(&self) -> &'static str {
        ".weather <city>: Show the weather for the input city"
    }

    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        if invocation.first_arg() == Some("help") {
            reply.send("Usage: .weather <city>").await;
            return Ok(());
        }
        let city = self.city(invocation);
        debug!(%city, "fetching weather");
        let line = self.fetch(&city).await?;
        reply.send(line).await;
        Ok(())
    }

    fn failure_message(&self, error: &CommandError) -> String {
        match error {
            CommandError::NotFound(_) => "City not found".to_owned(),
            CommandError::Status(code) => format!("Error getting weather ({code})"),
            CommandError::Http(e) => match e.status() {
                Some(status) => format!("Error getting weather ({})", status.as_u16()),
                None => "Error getting weather".to_owned(),
            },
            _ => "Error getting weather".to_owned(),
        }
    }
}
