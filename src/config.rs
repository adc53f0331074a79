use std::env;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_GROUP_CAPACITY: u32 = 50;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub socket_url: Option<String>,
    pub rfid_socket_url: Option<String>,
    pub group_capacity: u32,
    pub http_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Exponential backoff used by the live channel driver between connection attempts.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_base_url = env::var("API_BASE_URL")
            .map_err(|_| AppError::Config("API_BASE_URL is not set".to_string()))?;
        let api_token = env::var("API_TOKEN").ok().filter(|t| !t.is_empty());
        let socket_url = env::var("SOCKET_URL").ok().filter(|u| !u.is_empty());
        let rfid_socket_url = env::var("RFID_SOCKET_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| socket_url.clone());

        let group_capacity = parse_var("GROUP_CAPACITY", DEFAULT_GROUP_CAPACITY)?;
        let http_timeout = Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 15u64)?);

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            base: Duration::from_millis(parse_var(
                "RECONNECT_BASE_MS",
                defaults.base.as_millis() as u64,
            )?),
            max: Duration::from_millis(parse_var(
                "RECONNECT_MAX_MS",
                defaults.max.as_millis() as u64,
            )?),
        };

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token,
            socket_url,
            rfid_socket_url,
            group_capacity,
            http_timeout,
            reconnect,
        })
    }

    /// Config pointing at `base_url` with every other setting at its default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            socket_url: None,
            rfid_socket_url: None,
            group_capacity: DEFAULT_GROUP_CAPACITY,
            http_timeout: Duration::from_secs(15),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn socket_url(&self) -> Result<&str, AppError> {
        self.socket_url
            .as_deref()
            .ok_or_else(|| AppError::Config("SOCKET_URL is not set".to_string()))
    }

    pub fn rfid_socket_url(&self) -> Result<&str, AppError> {
        self.rfid_socket_url
            .as_deref()
            .ok_or_else(|| AppError::Config("RFID_SOCKET_URL is not set".to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} is not a valid number: {}", key, raw))),
        _ => Ok(default),
    }
}
