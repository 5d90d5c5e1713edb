//! Host metric providers backed by `sysinfo`.
//!
//! All readings are percentages in `[0, 100]`.

use std::path::Path;
use std::thread;

use sysinfo::{Disks, System};
use sysmon_store::{FnProvider, MetricRegistry, MonitorError, Result};

/// CPU utilisation across all cores.
pub const CPU_USAGE: &str = "cpu-usage";
/// Used share of physical memory.
pub const MEMORY_USAGE: &str = "memory-usage";
/// Used share of the root filesystem (first disk if there is no `/` mount).
pub const DISK_0_USAGE: &str = "disk-0-usage";

/// Registry with every metric this host can report.
#[must_use]
pub fn system_registry() -> MetricRegistry {
    let mut registry = MetricRegistry::new();
    registry.register(CPU_USAGE, FnProvider::new(cpu_usage));
    registry.register(MEMORY_USAGE, FnProvider::new(memory_usage));
    registry.register(DISK_0_USAGE, FnProvider::new(disk_0_usage));
    registry
}

fn cpu_usage() -> Result<f64> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(unavailable(CPU_USAGE, "platform not supported"));
    }

    // Usage is a delta between two refreshes.
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    if sys.cpus().is_empty() {
        return Err(unavailable(CPU_USAGE, "no CPUs reported"));
    }
    Ok(f64::from(sys.global_cpu_usage()).clamp(0.0, 100.0))
}

fn memory_usage() -> Result<f64> {
    let mut sys = System::new();
    sys.refresh_memory();
    percent(sys.used_memory(), sys.total_memory())
        .ok_or_else(|| unavailable(MEMORY_USAGE, "total memory reported as zero"))
}

fn disk_0_usage() -> Result<f64> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .ok_or_else(|| unavailable(DISK_0_USAGE, "no disks found"))?;

    let total = disk.total_space();
    let used = total.saturating_sub(disk.available_space());
    percent(used, total).ok_or_else(|| {
        unavailable(
            DISK_0_USAGE,
            &format!("{} reports zero capacity", disk.mount_point().display()),
        )
    })
}

/// `part / whole * 100`, or `None` when `whole` is zero.
fn percent(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0))
}

fn unavailable(name: &str, reason: &str) -> MonitorError {
    MonitorError::MetricUnavailable {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
