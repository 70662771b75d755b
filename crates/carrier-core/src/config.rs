use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/carrier/config.toml`.
///
/// Treated as fixed for the controller's lifetime; the controller takes a
/// copy at construction and never re-reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    /// Managed storage root where artifacts land (and eviction walks).
    pub download_dir: PathBuf,
    /// Concurrency ceiling: at most this many jobs active at once.
    pub max_concurrent: usize,
    /// Free-space floor in MB that must hold after reserving all active + queued jobs.
    pub min_free_disk_mb: u64,
    /// Soft warning threshold in MB (never blocks admission).
    pub disk_warning_mb: u64,
    /// Retry budget: a job gets max_retry_attempts + 1 tries in total.
    pub max_retry_attempts: u32,
    /// Poll interval while a job is paused, in milliseconds.
    pub pause_poll_ms: u64,
    /// Delay before retrying after a timeout-class stall, in seconds.
    pub stall_retry_delay_secs: u64,
    /// Delay before retrying after any other transfer error, in seconds.
    pub error_retry_delay_secs: u64,
    /// Minimum interval between UI progress edits, in seconds.
    pub ui_edit_interval_secs: f64,
    /// Minimum interval between notification-surface updates, in seconds.
    pub notify_interval_secs: f64,
    /// Unchanged-byte-count window after which redundant re-renders are suppressed, in seconds.
    pub stall_window_secs: u64,
    /// Bounded wait for in-flight jobs on shutdown, in seconds.
    pub shutdown_drain_secs: u64,
}

fn default_download_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join("Downloads"),
        None => PathBuf::from("downloads"),
    }
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent: 5,
            min_free_disk_mb: 200,
            disk_warning_mb: 500,
            max_retry_attempts: 3,
            pause_poll_ms: 400,
            stall_retry_delay_secs: 2,
            error_retry_delay_secs: 1,
            ui_edit_interval_secs: 3.0,
            notify_interval_secs: 2.0,
            stall_window_secs: 30,
            shutdown_drain_secs: 5,
        }
    }
}

impl CarrierConfig {
    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be >= 1");
        }
        if self.pause_poll_ms == 0 {
            anyhow::bail!("pause_poll_ms must be > 0");
        }
        if self.ui_edit_interval_secs < 0.0 || self.notify_interval_secs < 0.0 {
            anyhow::bail!("rate intervals must be non-negative");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("carrier")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CarrierConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CarrierConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: CarrierConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
