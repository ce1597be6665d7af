// Runtime configuration from command-line flags and environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, builder::BoolishValueParser};

use crate::cache::default_cache_dir;
use crate::error::{MonitorError, Result};
use crate::sources::client::DEFAULT_TIMEOUT;
use crate::sources::{AcledCredentials, DataKind};

#[derive(Parser, Debug, Clone)]
#[command(name = "world-monitor")]
#[command(about = "World monitoring dashboard backend", version)]
pub struct Config {
    /// Listen host
    #[arg(long, env = "WM_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listen port
    #[arg(long, env = "WM_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Verbose logging
    #[arg(
        long,
        env = "WM_DEBUG",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Cache directory (defaults to the platform cache dir)
    #[arg(long, env = "WM_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// TTL in seconds applied to every data kind, replacing the per-kind defaults
    #[arg(long, env = "WM_CACHE_TTL")]
    pub cache_ttl: Option<u64>,

    /// Upstream request timeout in seconds
    #[arg(long, env = "WM_REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub request_timeout: u64,

    /// ACLED API key
    #[arg(long, env = "ACLED_API_KEY", hide_env_values = true)]
    pub acled_api_key: Option<String>,

    /// ACLED account email
    #[arg(long, env = "ACLED_EMAIL")]
    pub acled_email: Option<String>,

    /// TOML file replacing the built-in map layers
    #[arg(long, env = "WM_LAYERS_FILE")]
    pub layers_file: Option<PathBuf>,

    /// Directory of static dashboard files served at `/`
    #[arg(long, env = "WM_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout == 0 {
            return Err(MonitorError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        if self.cache_ttl == Some(0) {
            return Err(MonitorError::Config(
                "cache TTL must be at least one second".to_string(),
            ));
        }
        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(MonitorError::Config(format!(
                    "static directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.cache_ttl
            .map(|secs| TtlPolicy::fixed(Duration::from_secs(secs)))
            .unwrap_or_default()
    }

    /// ACLED is enabled only when both key and email are set.
    pub fn acled_credentials(&self) -> Option<AcledCredentials> {
        AcledCredentials::from_parts(self.acled_api_key.as_deref(), self.acled_email.as_deref())
    }
}

/// Per-kind cache TTLs, optionally pinned to one value for every kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlPolicy {
    fixed: Option<Duration>,
}

impl TtlPolicy {
    pub fn fixed(ttl: Duration) -> Self {
        Self { fixed: Some(ttl) }
    }

    pub fn for_kind(&self, kind: DataKind) -> Duration {
        self.fixed.unwrap_or_else(|| kind.default_ttl())
    }
}
