//! Console configuration.
//!
//! Constants live here alongside `AppConfig`, which is read once at startup
//! from `AURA_*` environment variables. Every value has a default so the
//! console runs against a local backend with no setup.

use std::net::SocketAddr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Aura";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Location label attached to evidence when the operator gives none.
pub const DEFAULT_LOCATION: &str = "Sector 4";

/// Analysis backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Console API bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Per-stage timeout; `AURA_STAGE_TIMEOUT_SECS=0` disables it.
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_EVIDENCE_MB: usize = 25;

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "aura_lib=info,aura=info,tower_http=warn"
}

// ═══════════════════════════════════════════════════════════
// AppConfig
// ═══════════════════════════════════════════════════════════

/// Runtime configuration for the console.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the analysis backend (no trailing slash).
    pub backend_url: String,
    /// Where the console API listens.
    pub bind_addr: SocketAddr,
    /// Upper bound for one stage call. `None` waits forever.
    pub stage_timeout: Option<Duration>,
    /// TCP connect timeout for backend calls.
    pub connect_timeout: Duration,
    /// Location label used when a submission carries none.
    pub default_location: String,
    /// Largest evidence file accepted, in bytes.
    pub max_evidence_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("AURA_BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "AURA_BACKEND_URL",
                value: backend_url,
                reason: "must start with http:// or https://".into(),
            });
        }

        let bind_raw =
            lookup("AURA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "AURA_BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let stage_secs = parse_number(
            &lookup,
            "AURA_STAGE_TIMEOUT_SECS",
            DEFAULT_STAGE_TIMEOUT_SECS,
        )?;
        let connect_secs = parse_number(
            &lookup,
            "AURA_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let max_mb = parse_number(&lookup, "AURA_MAX_EVIDENCE_MB", DEFAULT_MAX_EVIDENCE_MB)?;
        if max_mb == 0 {
            return Err(ConfigError::InvalidValue {
                var: "AURA_MAX_EVIDENCE_MB",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let default_location = lookup("AURA_LOCATION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            bind_addr,
            // 0 disables the per-stage timeout
            stage_timeout: (stage_secs > 0).then(|| Duration::from_secs(stage_secs)),
            connect_timeout: Duration::from_secs(connect_secs.max(1)),
            default_location,
            max_evidence_bytes: max_mb * 1024 * 1024,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            stage_timeout: Some(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            default_location: DEFAULT_LOCATION.to_string(),
            max_evidence_bytes: DEFAULT_MAX_EVIDENCE_MB * 1024 * 1024,
        }
    }
}

fn parse_number<F, N>(lookup: &F, var: &'static str, default: N) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<N>().map_err(|e| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
