//! `get_weather`: geocode a free-form location, then fetch current
//! conditions and a short daily forecast from Open-Meteo. No API key needed.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::config::RuntimeConfig;

use super::{clamped_limit, require_str, Args, ErrorCode, ToolError, ToolOutcome};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Query sanitization ──────────────────────────────────────────────────────

/// Words that carry no location information in a weather question.
const STOPWORDS: &[&str] = &[
    "weather", "forecast", "temperature", "what", "whats", "what's", "is", "the", "in", "at",
    "for", "like", "today", "tomorrow", "now", "current", "currently", "please", "tell", "me",
    "how", "hot", "cold", "will", "it", "be",
];

/// Reduce a conversational query to its location words.
pub fn sanitize_location_query(query: &str) -> String {
    let cleaned: Vec<&str> = query
        .split(|c: char| c.is_whitespace() || c == '?' || c == ',' || c == '.' || c == '!')
        .filter(|word| !word.is_empty())
        .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .collect();
    if cleaned.is_empty() {
        query.trim().to_string()
    } else {
        cleaned.join(" ")
    }
}

/// WMO weather interpretation codes.
pub fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 63 | 65 => "rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 => "snowfall",
        77 => "snow grains",
        80 | 81 | 82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown conditions",
    }
}

// ─── Upstream shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
    #[serde(default)]
    daily: Option<DailyForecast>,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: u32,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    time: Vec<String>,
    temperature_2m_min: Vec<f64>,
    temperature_2m_max: Vec<f64>,
    weather_code: Vec<u32>,
}

fn network_error(stage: &str, e: reqwest::Error) -> ToolError {
    if e.is_timeout() || e.is_connect() {
        ToolError::new(
            ErrorCode::UpstreamNetworkError,
            format!("{stage}: {e}"),
        )
    } else {
        ToolError::new(ErrorCode::UpstreamError, format!("{stage}: {e}"))
    }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

pub async fn get_weather(args: &Args, _config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let query = require_str(args, "query")?;
    let days = clamped_limit(args, "days", 1, 3);
    let location_query = sanitize_location_query(&query);

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ToolError::internal(format!("building http client: {e}")))?;

    let geo: GeocodingResponse = client
        .get(GEOCODING_URL)
        .query(&[
            ("name", location_query.as_str()),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ])
        .send()
        .await
        .map_err(|e| network_error("geocoding request", e))?
        .error_for_status()
        .map_err(|e| network_error("geocoding response", e))?
        .json()
        .await
        .map_err(|e| network_error("geocoding body", e))?;

    let place = geo.results.into_iter().next().ok_or_else(|| {
        ToolError::not_found(format!("no location matched \"{location_query}\""))
    })?;

    let forecast: ForecastResponse = client
        .get(FORECAST_URL)
        .query(&[
            ("latitude", place.latitude.to_string()),
            ("longitude", place.longitude.to_string()),
            (
                "current",
                "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code"
                    .to_string(),
            ),
            (
                "daily",
                "temperature_2m_min,temperature_2m_max,weather_code".to_string(),
            ),
            ("timezone", "auto".to_string()),
            ("forecast_days", days.to_string()),
        ])
        .send()
        .await
        .map_err(|e| network_error("forecast request", e))?
        .error_for_status()
        .map_err(|e| network_error("forecast response", e))?
        .json()
        .await
        .map_err(|e| network_error("forecast body", e))?;

    let description = describe_weather_code(forecast.current.weather_code);
    let location = match &place.country {
        Some(country) => format!("{}, {country}", place.name),
        None => place.name.clone(),
    };

    let daily: Vec<serde_json::Value> = forecast
        .daily
        .as_ref()
        .map(|d| {
            d.time
                .iter()
                .enumerate()
                .take(days)
                .map(|(i, date)| {
                    json!({
                        "date": date,
                        "minC": d.temperature_2m_min.get(i),
                        "maxC": d.temperature_2m_max.get(i),
                        "description": d.weather_code.get(i).map(|c| describe_weather_code(*c)),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let text = format!(
        "{location}: {description}, {:.1}°C (feels like {:.1}°C), humidity {:.0}%, wind {:.1} km/h",
        forecast.current.temperature_2m,
        forecast.current.apparent_temperature,
        forecast.current.relative_humidity_2m,
        forecast.current.wind_speed_10m,
    );

    Ok(ToolOutcome::new(
        text,
        json!({
            "provider": "open-meteo",
            "location": location,
            "latitude": place.latitude,
            "longitude": place.longitude,
            "timezone": forecast.timezone.or(place.timezone),
            "current": {
                "temperatureC": forecast.current.temperature_2m,
                "apparentTemperatureC": forecast.current.apparent_temperature,
                "humidityPercent": forecast.current.relative_humidity_2m,
                "windSpeedKmh": forecast.current.wind_speed_10m,
                "weatherCode": forecast.current.weather_code,
                "description": description,
            },
            "daily": daily,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_question_words() {
        assert_eq!(
            sanitize_location_query("what is the weather in San Francisco today?"),
            "San Francisco"
        );
        assert_eq!(sanitize_location_query("weather Berlin"), "Berlin");
    }

    #[test]
    fn test_sanitize_keeps_pure_location() {
        assert_eq!(sanitize_location_query("Tokyo, Japan"), "Tokyo Japan");
    }

    #[test]
    fn test_sanitize_falls_back_when_everything_is_stopwords() {
        assert_eq!(
            sanitize_location_query("what is the weather"),
            "what is the weather"
        );
    }

    #[test]
    fn test_weather_code_descriptions() {
        assert_eq!(describe_weather_code(0), "clear sky");
        assert_eq!(describe_weather_code(63), "rain");
        assert_eq!(describe_weather_code(95), "thunderstorm");
        assert_eq!(describe_weather_code(1234), "unknown conditions");
    }
}
