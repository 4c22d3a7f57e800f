use portal_realtime_types::audio::Voice;
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a key every ephemeral key request fails with 500.
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    pub realtime_model: String,
    pub realtime_voice: Voice,
    pub static_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to. Defaults to
    ///     "0.0.0.0:3000", or "0.0.0.0:$PORT" when only `PORT` is set.
    /// *   `OPENAI_API_KEY`: Your secret key for the OpenAI API.
    /// *   `OPENAI_BASE_URL`: (Optional) Defaults to "https://api.openai.com/v1".
    /// *   `REALTIME_MODEL`: (Optional) Defaults to "gpt-4o-mini".
    /// *   `REALTIME_VOICE`: (Optional) Defaults to "sage".
    /// *   `STATIC_DIR`: (Optional) Directory served for every other path.
    /// *   `RUST_LOG`: (Optional) The log filter. Defaults to "info".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = match (lookup("BIND_ADDRESS"), lookup("PORT")) {
            (Some(address), _) => address,
            (None, Some(port)) => format!("0.0.0.0:{}", port),
            (None, None) => "0.0.0.0:3000".to_string(),
        };
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.is_empty())
            .map(SecretString::from);

        let openai_base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let realtime_model = lookup("REALTIME_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let realtime_voice = lookup("REALTIME_VOICE")
            .map(|voice| voice.parse::<Voice>().unwrap_or_else(|never| match never {}))
            .unwrap_or(Voice::Sage);

        let static_dir = lookup("STATIC_DIR").map(PathBuf::from);

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(&log_filter).map_err(|e| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log filter: {}", log_filter, e),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            openai_base_url,
            realtime_model,
            realtime_voice,
            static_dir,
            log_filter,
        })
    }
}
