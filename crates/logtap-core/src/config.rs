//! Configuration types for logtap.
//!
//! [`Config::load`] reads `~/.config/logtap/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist, and then applies `LOGTAP_*`
//! environment overrides (`LOGTAP_DOCKER__HOST=tcp://127.0.0.1:2375`).
//! [`Config::defaults`] returns the same defaults without touching the
//! filesystem or the environment (useful in tests).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[docker]
# Empty means: use $DOCKER_HOST, then unix:///var/run/docker.sock
host = ""

[follow]
max_frame_bytes = 16777216

[reconnect]
max_retries        = 5
initial_backoff_ms = 100
max_backoff_ms     = 2000
multiplier         = 2.0
"#;

const DEFAULT_DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from `~/.config/logtap/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub follow: FollowConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// `[docker]` section of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub host: String,
}

/// `[follow]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowConfig {
    /// Upper bound on a single frame's payload; a larger length field means
    /// the stream is corrupt.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// `[reconnect]` section of `config.toml`. Bounded exponential backoff used
/// when a followed stream drops at the connection level.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Reopen attempts allowed per outage (not counting the original open).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_frame_bytes() -> usize { 16 * 1024 * 1024 }
fn default_max_retries() -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 100 }
fn default_max_backoff_ms() -> u64 { 2_000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ReconnectConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl DockerConfig {
    /// Endpoint to dial: the configured host, else `$DOCKER_HOST`, else the
    /// local daemon socket.
    pub fn resolved_host(&self) -> String {
        if !self.host.trim().is_empty() {
            return self.host.trim().to_string();
        }
        std::env::var("DOCKER_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DOCKER_SOCKET.to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/logtap/config.toml`, layered on top of the
    /// built-in defaults and under `LOGTAP_*` environment variables. Creates
    /// the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
            tracing::info!(path = %path.display(), "wrote default config");
        }
        tracing::debug!(path = %path.display(), "loading config");

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(config::Environment::with_prefix("LOGTAP").separator("__"))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("logtap")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
