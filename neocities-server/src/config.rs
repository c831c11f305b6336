use crate::{
    errors::config_error::ConfigError, models::resource::ResourceBundles,
    socket::connection::SocketSettings,
};
use axum::http::HeaderValue;
use std::{env, fs, net::SocketAddr, str::FromStr, time::Duration};

pub struct Config {
    pub bind_address: SocketAddr,
    pub frontend_origin: HeaderValue,
    pub tick_interval: Duration,
    pub socket_settings: SocketSettings,
    pub chat_max_length: usize,
    pub resource_bundles: ResourceBundles,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address = parse(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let frontend_url = lookup("FRONTEND_URL").unwrap_or("http://localhost:5173".to_string());
        let frontend_origin =
            HeaderValue::from_str(&frontend_url).or(Err(ConfigError::InvalidValue {
                name: "FRONTEND_URL",
                value: frontend_url.clone(),
            }))?;

        let tick_interval = Duration::from_millis(millis(&lookup, "TIMER_TICK_MS", "1000")?);
        let socket_settings = SocketSettings {
            ping_interval_ms: millis(&lookup, "PING_INTERVAL_MS", "25000")?,
            ping_timeout_ms: millis(&lookup, "PING_TIMEOUT_MS", "20000")?,
            max_payload: parse(&lookup, "MAX_PAYLOAD", "1000000")?,
        };
        let chat_max_length = parse(&lookup, "CHAT_MAX_LENGTH", "500")?;

        let resource_bundles = match lookup("RESOURCES_FILE") {
            Some(path) => {
                let json = fs::read_to_string(&path).map_err(ConfigError::CouldNotReadResources)?;
                ResourceBundles::from_json(&json)?
            }
            None => ResourceBundles::default(),
        };

        Ok(Config {
            bind_address,
            frontend_origin,
            tick_interval,
            socket_settings,
            chat_max_length,
            resource_bundles,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = lookup(name).unwrap_or(default.to_string());
    value
        .parse()
        .or(Err(ConfigError::InvalidValue { name, value }))
}

/// Like [`parse`], but zero is rejected since intervals must advance.
fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<u64, ConfigError> {
    match parse(lookup, name, default)? {
        0 => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
        }),
        millis => Ok(millis),
    }
}
