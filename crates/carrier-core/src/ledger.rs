//! Disk-space ledger: admission feasibility and eviction-based remediation.
//!
//! Reservations are implicit: the controller sums the expected sizes of all
//! queued + active jobs and passes that total in, so there is no stored
//! ledger entity to drift out of sync. The check runs twice per job, at
//! submission (fast reject) and again at promotion time, because free space
//! is a moving target.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MB: u64 = 1024 * 1024;

/// Free space for the filesystem containing `path`, in MB.
#[cfg(unix)]
pub fn free_disk_mb(path: &Path) -> Result<u64> {
    use std::os::unix::ffi::OsStrExt;

    let c = std::ffi::CString::new(path.as_os_str().as_bytes())
        .context("path contains interior NUL")?;
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c.as_ptr(), &mut st) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs failed for {}", path.display()));
    }
    Ok((st.f_bavail as u64).saturating_mul(st.f_frsize as u64) / MB)
}

/// Non-Unix fallback: free-space accounting is unavailable, so admission
/// always passes. The controller still enforces the concurrency ceiling.
#[cfg(not(unix))]
pub fn free_disk_mb(_path: &Path) -> Result<u64> {
    Ok(u64::MAX / MB)
}

fn mb_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(MB)
}

/// Result of a space check, including what eviction accomplished.
#[derive(Debug, Clone)]
pub struct SpaceCheck {
    pub ok: bool,
    /// Files deleted by eviction (0 when no remediation was needed).
    pub deleted: usize,
    /// Projected free MB after reserving everything (may be negative).
    pub projected_mb: i64,
    /// The floor the projection must satisfy.
    pub required_mb: u64,
    pub free_before_mb: u64,
    pub free_after_mb: u64,
}

type Probe = Box<dyn Fn(&Path) -> Result<u64> + Send + Sync>;

/// Space accounting over one managed storage root.
pub struct Ledger {
    root: PathBuf,
    floor_mb: u64,
    probe: Probe,
}

impl Ledger {
    pub fn new(root: PathBuf, floor_mb: u64) -> Self {
        Self {
            root,
            floor_mb,
            probe: Box::new(free_disk_mb),
        }
    }

    /// Test seam: replace the free-space probe.
    pub fn with_probe(
        root: PathBuf,
        floor_mb: u64,
        probe: impl Fn(&Path) -> Result<u64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            root,
            floor_mb,
            probe: Box::new(probe),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn floor_mb(&self) -> u64 {
        self.floor_mb
    }

    pub fn free_mb(&self) -> Result<u64> {
        (self.probe)(&self.root)
    }

    fn projected_mb(&self, reserved_bytes: u64) -> Result<i64> {
        let free = self.free_mb()?;
        Ok(free as i64 - mb_ceil(reserved_bytes) as i64)
    }

    /// Decide whether a job of `size` bytes can be admitted on top of
    /// `reserved_bytes` (sum of all other queued + active jobs), evicting
    /// oldest files if the projection falls below the floor.
    pub fn ensure_space(&self, name: &str, reserved_bytes: u64, size: u64) -> Result<SpaceCheck> {
        let cumulative = reserved_bytes.saturating_add(size);
        let before = self.free_mb()?;
        let projected = self.projected_mb(cumulative)?;
        if projected >= self.floor_mb as i64 {
            return Ok(SpaceCheck {
                ok: true,
                deleted: 0,
                projected_mb: projected,
                required_mb: self.floor_mb,
                free_before_mb: before,
                free_after_mb: before,
            });
        }

        let target = self.floor_mb + mb_ceil(cumulative);
        let deleted = self.evict_until(target);
        let after = self.free_mb()?;
        let projected = self.projected_mb(cumulative)?;
        let ok = projected >= self.floor_mb as i64;
        if ok {
            tracing::warn!(
                name,
                deleted,
                "auto-clean removed {deleted} files (free {before}MB -> {after}MB)"
            );
        } else {
            tracing::error!(name, projected_mb = projected, "insufficient disk space");
        }
        Ok(SpaceCheck {
            ok,
            deleted,
            projected_mb: projected,
            required_mb: self.floor_mb,
            free_before_mb: before,
            free_after_mb: after,
        })
    }

    /// Delete oldest files (by mtime) under the root until free space reaches
    /// `target_free_mb` or candidates run out. Best effort: unreadable entries
    /// and failed deletes are skipped, directories are left in place.
    fn evict_until(&self, target_free_mb: u64) -> usize {
        let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
        collect_files(&self.root, &mut candidates);
        candidates.sort_by_key(|(mtime, _)| *mtime);

        let mut deleted = 0;
        for (_, path) in candidates {
            match self.free_mb() {
                Ok(free) if free >= target_free_mb => break,
                Ok(_) => {}
                Err(_) => break,
            }
            if fs::remove_file(&path).is_ok() {
                tracing::info!("evicted {}", path.display());
                deleted += 1;
            }
        }
        deleted
    }
}

fn collect_files(dir: &Path, out: &mut Vec<(SystemTime, PathBuf)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            collect_files(&path, out);
        } else if meta.is_file() {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((mtime, path));
        }
    }
}

/// Remove now-empty parent directories of `path`, walking up to (but never
/// removing or escaping) `stop`. Returns the number removed. Best effort.
pub fn remove_empty_parents(path: &Path, stop: &Path) -> usize {
    let mut removed = 0;
    let mut cur = match path.parent() {
        Some(p) => p.to_path_buf(),
        None => return 0,
    };
    while cur != stop && cur.starts_with(stop) {
        let empty = match fs::read_dir(&cur) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => break,
        };
        if !empty || fs::remove_dir(&cur).is_err() {
            break;
        }
        removed += 1;
        cur = match cur.parent() {
            Some(p) => p.to_path_buf(),
            None => break,
        };
    }
    removed
}
