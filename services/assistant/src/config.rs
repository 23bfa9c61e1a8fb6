use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The voices accepted by the realtime endpoint.
pub const VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "sage", "shimmer", "verse",
];

/// The opening message sent as the user's first conversation item.
pub const DEFAULT_GREETING: &str = "My name is Geert and I live in Antwerp, Belgium.";

const DEFAULT_BACKEND: &str = "http://localhost:8888";
const DEFAULT_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";
const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
const DEFAULT_VOICE: &str = "echo";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub session_url: String,
    pub weather_url: String,
    pub search_url: String,
    pub realtime_url: String,
    pub model: String,
    pub voice: String,
    pub greeting: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend_base = std::env::var("BACKEND_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND.to_string())
            .trim_end_matches('/')
            .to_string();
        let session_url =
            std::env::var("SESSION_URL").unwrap_or_else(|_| format!("{backend_base}/session"));
        let weather_url =
            std::env::var("WEATHER_URL").unwrap_or_else(|_| format!("{backend_base}/weather"));
        let search_url =
            std::env::var("SEARCH_URL").unwrap_or_else(|_| format!("{backend_base}/search"));

        let realtime_url =
            std::env::var("REALTIME_URL").unwrap_or_else(|_| DEFAULT_REALTIME_URL.to_string());
        let model =
            std::env::var("REALTIME_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let voice = std::env::var("VOICE").unwrap_or_else(|_| DEFAULT_VOICE.to_string());
        if !VOICES.contains(&voice.as_str()) {
            return Err(ConfigError::InvalidValue(
                "VOICE".to_string(),
                format!("'{voice}' is not a known voice"),
            ));
        }

        let greeting =
            std::env::var("GREETING").unwrap_or_else(|_| DEFAULT_GREETING.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            session_url,
            weather_url,
            search_url,
            realtime_url,
            model,
            voice,
            greeting,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        env::remove_var("BACKEND_BASE_URL");
        env::remove_var("SESSION_URL");
        env::remove_var("WEATHER_URL");
        env::remove_var("SEARCH_URL");
        env::remove_var("REALTIME_URL");
        env::remove_var("REALTIME_MODEL");
        env::remove_var("VOICE");
        env::remove_var("GREETING");
        env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.session_url, "http://localhost:8888/session");
        assert_eq!(config.weather_url, "http://localhost:8888/weather");
        assert_eq!(config.search_url, "http://localhost:8888/search");
        assert_eq!(config.realtime_url, "https://api.openai.com/v1/realtime");
        assert_eq!(config.model, "gpt-4o-realtime-preview-2024-12-17");
        assert_eq!(config.voice, "echo");
        assert_eq!(config.greeting, DEFAULT_GREETING);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        env::set_var("BACKEND_BASE_URL", "http://backend:9000/");
        env::set_var("SESSION_URL", "http://elsewhere/token");
        env::set_var("REALTIME_URL", "https://example.org/realtime");
        env::set_var("REALTIME_MODEL", "custom-model");
        env::set_var("VOICE", "coral");
        env::set_var("GREETING", "Hello from the tests.");
        env::set_var("RUST_LOG", "debug");

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.session_url, "http://elsewhere/token");
        // Trailing slash on the base is stripped before joining.
        assert_eq!(config.weather_url, "http://backend:9000/weather");
        assert_eq!(config.search_url, "http://backend:9000/search");
        assert_eq!(config.realtime_url, "https://example.org/realtime");
        assert_eq!(config.model, "custom-model");
        assert_eq!(config.voice, "coral");
        assert_eq!(config.greeting, "Hello from the tests.");
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_unknown_voice() {
        clear_env_vars();
        env::set_var("VOICE", "baritone");

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "VOICE"),
            _ => panic!("Expected InvalidValue for VOICE"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        env::set_var("RUST_LOG", "not-a-level");

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    fn test_voice_list_matches_endpoint() {
        assert_eq!(VOICES.len(), 8);
        assert!(VOICES.contains(&"echo"));
    }
}
