//! `carrier config` – print the effective configuration.

use anyhow::Result;
use carrier_core::config::{config_path, CarrierConfig};

pub fn run_config(cfg: &CarrierConfig) -> Result<()> {
    println!("config file: {}", config_path()?.display());
    println!();
    println!("download_dir          = {}", cfg.download_dir.display());
    println!("max_concurrent        = {}", cfg.max_concurrent);
    println!("min_free_disk_mb      = {}", cfg.min_free_disk_mb);
    println!("disk_warning_mb       = {}", cfg.disk_warning_mb);
    println!("max_retry_attempts    = {}", cfg.max_retry_attempts);
    println!("stall_window_secs     = {}", cfg.stall_window_secs);
    println!("shutdown_drain_secs   = {}", cfg.shutdown_drain_secs);
    Ok(())
}
