use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Segment retry parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per segment (including the first).
    pub max_attempts: u32,
    /// Linear backoff step in milliseconds: the wait before retry n is `n * step_delay_ms`.
    pub step_delay_ms: u64,
    /// Deadline for a single spectator request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step_delay_ms: 2000,
            request_timeout_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            step_delay: Duration::from_millis(self.step_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Capture pacing (optional `[capture]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Poll interval while the match has not started yet.
    pub start_poll_secs: u64,
    /// Delay before retrying a failed metadata / chunk-info poll.
    pub error_retry_secs: u64,
    /// Added to the server's `nextAvailableChunk` before the next chunk-info poll.
    pub chunk_slack_ms: u64,
    /// Wait between drain checks once the last chunk has been seen.
    pub drain_wait_secs: u64,
    /// Number of drain waits before finalizing with downloads still running.
    pub max_drain_waits: u32,
    /// The capture is canceled once the consecutive poll error count exceeds this.
    pub max_meta_errors: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            start_poll_secs: 30,
            error_retry_secs: 10,
            chunk_slack_ms: 1000,
            drain_wait_secs: 10,
            max_drain_waits: 10,
            max_meta_errors: 10,
        }
    }
}

impl CaptureConfig {
    pub fn start_poll(&self) -> Duration {
        Duration::from_secs(self.start_poll_secs)
    }

    pub fn error_retry(&self) -> Duration {
        Duration::from_secs(self.error_retry_secs)
    }

    pub fn drain_wait(&self) -> Duration {
        Duration::from_secs(self.drain_wait_secs)
    }
}

/// Points one region's captures at a different spectator base URL (e.g. a mirror).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectatorOverride {
    pub region_id: u8,
    /// Base URL up to and including the host/port, e.g. `http://127.0.0.1:8080/`.
    pub base_url: String,
}

/// Global configuration loaded from `~/.config/aof/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AofConfig {
    /// Where finished `.aof` containers are written. Defaults to the XDG data dir.
    #[serde(default)]
    pub replay_dir: Option<PathBuf>,
    /// Where downloaded segments are cached during capture. Defaults to the XDG cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Loopback address the playback server binds to.
    #[serde(default)]
    pub playback_host: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub spectator_override: Vec<SpectatorOverride>,
}

impl AofConfig {
    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn capture(&self) -> CaptureConfig {
        self.capture.clone().unwrap_or_default()
    }

    pub fn playback_host(&self) -> &str {
        self.playback_host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn spectator_override(&self, region_id: u8) -> Option<&str> {
        self.spectator_override
            .iter()
            .find(|o| o.region_id == region_id)
            .map(|o| o.base_url.as_str())
    }

    /// Rejects override URLs that are not absolute http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        for o in &self.spectator_override {
            let url = url::Url::parse(&o.base_url).with_context(|| {
                format!("spectator_override for region {}: bad base_url {:?}", o.region_id, o.base_url)
            })?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                anyhow::bail!(
                    "spectator_override for region {}: base_url must be http(s) with a host, got {:?}",
                    o.region_id,
                    o.base_url
                );
            }
        }
        Ok(())
    }

    /// Resolved container directory (config value or `~/.local/share/aof/replays`).
    pub fn replay_dir(&self) -> Result<PathBuf> {
        match &self.replay_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(xdg::BaseDirectories::with_prefix("aof")?
                .get_data_home()
                .join("replays")),
        }
    }

    /// Resolved segment cache directory (config value or `~/.cache/aof/segments`).
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(xdg::BaseDirectories::with_prefix("aof")?
                .get_cache_home()
                .join("segments")),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("aof")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AofConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AofConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: AofConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
