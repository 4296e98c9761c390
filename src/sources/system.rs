//! Host metrics via sysinfo

use super::{MetricsSource, CPU_PERCENT, DISK_PERCENT, MEMORY_PERCENT};
use crate::error::SourceError;
use std::path::PathBuf;
use std::sync::Mutex;
use sysinfo::{Disks, System};

/// CPU, memory and disk usage of the local host
pub struct SystemSource {
    system: Mutex<System>,
    disk_mount: PathBuf,
}

impl SystemSource {
    /// Create a source that reports disk usage for `/`
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            disk_mount: PathBuf::from("/"),
        }
    }

    /// Builder: monitor a different mount point
    pub fn with_disk_mount(mut self, mount: impl Into<PathBuf>) -> Self {
        self.disk_mount = mount.into();
        self
    }

    fn with_system<T>(&self, metric: &str, f: impl FnOnce(&mut System) -> T) -> Result<T, SourceError> {
        let mut system = self.system.lock().map_err(|_| SourceError::Unavailable {
            metric: metric.to_string(),
            reason: "system handle poisoned".into(),
        })?;
        Ok(f(&mut system))
    }

    fn cpu_percent(&self) -> Result<f64, SourceError> {
        self.with_system(CPU_PERCENT, |system| {
            // Usage is a delta between two refreshes
            system.refresh_cpu();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            system.refresh_cpu();
            f64::from(system.global_cpu_info().cpu_usage())
        })
    }

    fn memory_percent(&self) -> Result<f64, SourceError> {
        let (used, total) = self.with_system(MEMORY_PERCENT, |system| {
            system.refresh_memory();
            (system.used_memory(), system.total_memory())
        })?;

        percent(MEMORY_PERCENT, used, total)
    }

    fn disk_percent(&self) -> Result<f64, SourceError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == self.disk_mount.as_path())
            .ok_or_else(|| SourceError::Unavailable {
                metric: DISK_PERCENT.to_string(),
                reason: format!("no filesystem mounted at {}", self.disk_mount.display()),
            })?;

        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        percent(DISK_PERCENT, used, total)
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemSource {
    fn sample(&self, metric: &str) -> Result<f64, SourceError> {
        let value = match metric {
            CPU_PERCENT => self.cpu_percent()?,
            MEMORY_PERCENT => self.memory_percent()?,
            DISK_PERCENT => self.disk_percent()?,
            other => return Err(SourceError::UnknownMetric(other.to_string())),
        };
        log::debug!("Sampled {} = {:.1}%", metric, value);
        Ok(value)
    }

    fn name(&self) -> &str {
        "system"
    }
}

fn percent(metric: &str, used: u64, total: u64) -> Result<f64, SourceError> {
    if total == 0 {
        return Err(SourceError::Unavailable {
            metric: metric.to_string(),
            reason: "total reported as zero".into(),
        });
    }
    Ok(used as f64 / total as f64 * 100.0)
}
