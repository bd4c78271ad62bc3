use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub remote_base_url: String,
    pub api_token: String,
    pub db_connection_string: String,
    pub bind_addr: String,
    pub progress_debounce: Duration,
    pub connectivity_probe_interval: Duration,
}

const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://readsync-offline.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_PROGRESS_DEBOUNCE_MS: u64 = 1500;
const DEFAULT_CONNECTIVITY_PROBE_SECS: u64 = 15;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let remote_base_url = std::env::var("READSYNC_REMOTE_BASE_URL").unwrap_or_default();
        let api_token = std::env::var("READSYNC_API_TOKEN").unwrap_or_default();
        let db_connection_string = std::env::var("READSYNC_DB_CONNECTION_STRING")
            .unwrap_or(DEFAULT_DB_CONNECTION_STRING.into());
        let bind_addr = std::env::var("READSYNC_BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        let debounce_ms = parse_u64("READSYNC_PROGRESS_DEBOUNCE_MS", DEFAULT_PROGRESS_DEBOUNCE_MS)?;
        let probe_secs = parse_u64(
            "READSYNC_CONNECTIVITY_PROBE_SECS",
            DEFAULT_CONNECTIVITY_PROBE_SECS,
        )?;
        Ok(Config {
            remote_base_url,
            api_token,
            db_connection_string,
            bind_addr,
            progress_debounce: Duration::from_millis(debounce_ms),
            connectivity_probe_interval: Duration::from_secs(probe_secs),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.remote_base_url.is_empty() {
            return Err("READSYNC_REMOTE_BASE_URL is missing".into());
        }
        if self.progress_debounce.is_zero() {
            return Err("READSYNC_PROGRESS_DEBOUNCE_MS must be greater than zero".into());
        }
        if self.connectivity_probe_interval.is_zero() {
            return Err("READSYNC_CONNECTIVITY_PROBE_SECS must be greater than zero".into());
        }
        Ok(())
    }
}

fn parse_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        _ => Ok(default),
    }
}
