//! Agent configuration: built-in defaults, overridable from `TERMLINK_*` env vars.

use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_CPU_SAMPLE_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub endpoint: String,
    pub name: String,
    pub heartbeat_interval: Duration,
    pub cpu_sample_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            name: default_name(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            cpu_sample_interval: Duration::from_millis(DEFAULT_CPU_SAMPLE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` but reads through `lookup`, so callers can feed a fixed map.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            endpoint: lookup("TERMLINK_ENDPOINT")
                .filter(|v| !v.is_empty())
                .unwrap_or(d.endpoint),
            name: lookup("TERMLINK_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or(d.name),
            heartbeat_interval: secs("TERMLINK_HEARTBEAT_SECS", d.heartbeat_interval),
            cpu_sample_interval: lookup("TERMLINK_CPU_SAMPLE_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(d.cpu_sample_interval),
            request_timeout: secs("TERMLINK_REQUEST_TIMEOUT_SECS", d.request_timeout),
        }
    }

    /// Check that `endpoint` is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), String> {
        let u = url::Url::parse(&self.endpoint)
            .map_err(|e| format!("invalid endpoint {}: {e}", self.endpoint))?;
        match u.scheme() {
            "http" | "https" => {}
            s => return Err(format!("unsupported endpoint scheme {s}")),
        }
        if self.name.trim().is_empty() {
            return Err("terminal name must not be empty".into());
        }
        Ok(())
    }
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "terminal".to_string())
}
