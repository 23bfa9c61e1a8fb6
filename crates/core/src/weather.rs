//! Weather lookup against the forecast backend.

use crate::tools::{DispatchError, ToolDefinition, ToolHandler};
use crate::ui::{MapPin, TranscriptRole, UiSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

pub const WEATHER_TOOL_NAME: &str = "get_weather";

#[derive(Deserialize, Debug)]
struct WeatherArgs {
    location: String,
}

/// One day of forecast as returned by the backend. Passed through to the
/// model unchanged; `weather_code` only drives the rendered icon.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ForecastDay {
    pub date: String,
    pub max_temp: f64,
    pub min_temp: f64,
    pub precipitation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<u16>,
}

#[derive(Deserialize, Debug)]
struct WeatherReport {
    temperature: f64,
    unit_temperature: String,
    humidity: f64,
    precipitation: f64,
    unit_precipitation: String,
    wind_speed: f64,
    unit_wind: String,
    #[serde(default)]
    forecast_daily: Vec<ForecastDay>,
    current_time: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    location_name: Option<String>,
}

/// Fetches current conditions and the daily forecast for a location, renders
/// them to the UI, and returns a trimmed payload for the model.
pub struct WeatherTool {
    http: reqwest::Client,
    endpoint: String,
    ui: Arc<dyn UiSink>,
}

impl WeatherTool {
    /// `endpoint` is the weather base URL; the location is appended as an
    /// escaped path segment.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, ui: Arc<dyn UiSink>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            ui,
        }
    }

    fn backend_error(&self, message: String) -> DispatchError {
        DispatchError::Backend {
            name: WEATHER_TOOL_NAME.to_string(),
            message,
        }
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            WEATHER_TOOL_NAME,
            "Get current weather and daily forecast for any location on Earth. \
             Includes temperature, humidity, precipitation, and wind speed.",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city or location name to get weather for"
                    }
                },
                "required": ["location"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> Result<Value, DispatchError> {
        let args: WeatherArgs =
            serde_json::from_value(arguments).map_err(|source| DispatchError::BadArguments {
                name: WEATHER_TOOL_NAME.to_string(),
                source,
            })?;
        info!(location = %args.location, "Fetching weather");

        let url = format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&args.location)
        );
        let report: WeatherReport = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.backend_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| self.backend_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| self.backend_error(format!("invalid weather payload: {e}")))?;

        self.ui
            .push_transcript(TranscriptRole::ToolResult, &render_report(&args.location, &report));

        if let (Some(latitude), Some(longitude)) = (report.latitude, report.longitude) {
            self.ui.show_map(MapPin {
                latitude,
                longitude,
                label: report
                    .location_name
                    .clone()
                    .unwrap_or_else(|| args.location.clone()),
            });
        }

        // Only these fields ever go back to the model.
        Ok(json!({
            "temperature": report.temperature,
            "humidity": report.humidity,
            "precipitation": report.precipitation,
            "wind_speed": report.wind_speed,
            "forecast_daily": report.forecast_daily,
            "current_time": report.current_time,
            "location": args.location,
        }))
    }
}

fn render_report(location: &str, report: &WeatherReport) -> String {
    let mut text = format!(
        "Current weather in {location}:\n\
         • Temperature: {}°{}\n\
         • Humidity: {}%\n\
         • Precipitation: {}{}\n\
         • Wind speed: {}{}",
        report.temperature,
        report.unit_temperature,
        report.humidity,
        report.precipitation,
        report.unit_precipitation,
        report.wind_speed,
        report.unit_wind,
    );
    if !report.forecast_daily.is_empty() {
        let _ = write!(text, "\nForecast:");
        for day in &report.forecast_daily {
            let icon = day.weather_code.map(weather_icon).unwrap_or("");
            let _ = write!(
                text,
                "\n  {} {icon} {}° / {}°, {}{}",
                day.date, day.max_temp, day.min_temp, day.precipitation, report.unit_precipitation
            );
        }
    }
    text
}

/// WMO weather code to display icon.
fn weather_icon(code: u16) -> &'static str {
    match code {
        0 => "☀️",
        1 => "🌤️",
        2 => "⛅",
        3 => "☁️",
        45 | 48 => "🌫️",
        51 | 53 | 80 => "🌦️",
        55 | 61 | 63 | 65 | 81 | 82 => "🌧️",
        71 | 73 | 75 | 77 | 85 | 86 => "🌨️",
        95 | 96 | 99 => "⛈️",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUiSink;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_payload() -> Value {
        json!({
            "temperature": 18.5,
            "unit_temperature": "C",
            "humidity": 71.0,
            "precipitation": 0.2,
            "unit_precipitation": "mm",
            "wind_speed": 12.0,
            "unit_wind": "km/h",
            "forecast_daily": [
                { "date": "2025-06-01", "max_temp": 20.0, "min_temp": 11.0, "precipitation": 0.0, "weather_code": 1 },
                { "date": "2025-06-02", "max_temp": 17.0, "min_temp": 9.0, "precipitation": 4.2, "weather_code": 61 },
                { "date": "2025-06-03", "max_temp": 19.0, "min_temp": 10.0, "precipitation": 0.0 }
            ],
            "current_time": "2025-06-01T10:00",
            "latitude": 51.2194,
            "longitude": 4.4025,
            "location_name": "Antwerp"
        })
    }

    #[tokio::test]
    async fn returns_only_whitelisted_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/Antwerp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let mut ui = MockUiSink::new();
        ui.expect_push_transcript().times(1).return_const(());
        ui.expect_show_map()
            .times(1)
            .withf(|pin| pin.label == "Antwerp" && (pin.latitude - 51.2194).abs() < 1e-9)
            .return_const(());

        let tool = WeatherTool::new(
            reqwest::Client::new(),
            format!("{}/weather", server.uri()),
            Arc::new(ui),
        );
        let result = tool.call(json!({ "location": "Antwerp" })).await.unwrap();

        let object = result.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "current_time",
                "forecast_daily",
                "humidity",
                "location",
                "precipitation",
                "temperature",
                "wind_speed",
            ]
        );
        assert_eq!(result["forecast_daily"].as_array().unwrap().len(), 3);
        assert_eq!(result["location"], "Antwerp");
    }

    #[tokio::test]
    async fn location_is_escaped_in_the_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/New%20York"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .expect(1)
            .mount(&server)
            .await;

        let mut ui = MockUiSink::new();
        ui.expect_push_transcript().return_const(());
        ui.expect_show_map().return_const(());

        let tool = WeatherTool::new(
            reqwest::Client::new(),
            format!("{}/weather", server.uri()),
            Arc::new(ui),
        );
        tool.call(json!({ "location": "New York" })).await.unwrap();
    }

    #[tokio::test]
    async fn backend_failure_becomes_a_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(
            reqwest::Client::new(),
            format!("{}/weather", server.uri()),
            Arc::new(MockUiSink::new()),
        );
        let err = tool.call(json!({ "location": "Antwerp" })).await.unwrap_err();
        assert!(matches!(err, DispatchError::Backend { name, .. } if name == WEATHER_TOOL_NAME));
    }

    #[tokio::test]
    async fn bad_argument_shape_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_payload()))
            .expect(0)
            .mount(&server)
            .await;

        let tool = WeatherTool::new(
            reqwest::Client::new(),
            format!("{}/weather", server.uri()),
            Arc::new(MockUiSink::new()),
        );
        let err = tool.call(json!({ "place": "Antwerp" })).await.unwrap_err();
        assert!(matches!(err, DispatchError::BadArguments { .. }));
    }

    #[test]
    fn report_rendering_includes_forecast_icons() {
        let report: WeatherReport = serde_json::from_value(sample_payload()).unwrap();
        let text = render_report("Antwerp", &report);
        assert!(text.starts_with("Current weather in Antwerp:"));
        assert!(text.contains("• Temperature: 18.5°C"));
        assert!(text.contains("🌧️"));
        assert!(text.contains("2025-06-03"));
    }
}
