//! System monitoring tools: CPU and memory load, disk space, top processes.
//!
//! Statistics come from `sysinfo`. Sampling blocks (CPU usage needs two
//! readings a short interval apart), so every tool runs on the blocking
//! thread pool.

use std::cmp::Reverse;

use async_trait::async_trait;
use serde_json::{json, Value};
use sysinfo::{Disks, ProcessesToUpdate, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::error::{Result, RobotError};

use super::{Tool, ToolContext};

/// Processes listed by `list_processes`.
const TOP_PROCESSES: usize = 10;

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn no_parameters() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

async fn sample<F>(f: F) -> Result<String>
where
    F: FnOnce() -> String + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RobotError::Tool(format!("system sampling failed: {}", e)))
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

fn format_resources(cpu: f32, used_memory: u64, total_memory: u64) -> String {
    format!(
        "CPU Usage: {:.1}%\nRAM Usage: {:.1}% ({}MB used)",
        cpu,
        percent(used_memory, total_memory),
        used_memory / (1024 * 1024)
    )
}

fn format_disk(mount: &str, available: u64, total: u64) -> String {
    format!(
        "{} - Free: {:.1} GB ({:.1}% full)",
        mount,
        available as f64 / GB,
        percent(total.saturating_sub(available), total)
    )
}

/// Current CPU and RAM usage.
pub struct CheckResourcesTool;

#[async_trait]
impl Tool for CheckResourcesTool {
    fn name(&self) -> &str {
        "check_resources"
    }

    fn description(&self) -> &str {
        "Check CPU and RAM usage."
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        sample(|| {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            format_resources(sys.global_cpu_usage(), sys.used_memory(), sys.total_memory())
        })
        .await
    }
}

/// Free space on every mounted disk.
pub struct DiskUsageTool;

#[async_trait]
impl Tool for DiskUsageTool {
    fn name(&self) -> &str {
        "disk_usage"
    }

    fn description(&self) -> &str {
        "Check free space on drives."
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        sample(|| {
            let disks = Disks::new_with_refreshed_list();
            let report: Vec<String> = disks
                .list()
                .iter()
                // Empty optical drives and pseudo filesystems report no capacity
                .filter(|d| d.total_space() > 0)
                .map(|d| {
                    format_disk(
                        &d.mount_point().display().to_string(),
                        d.available_space(),
                        d.total_space(),
                    )
                })
                .collect();
            if report.is_empty() {
                "No disks found.".to_string()
            } else {
                report.join("\n")
            }
        })
        .await
    }
}

/// Processes using the most memory.
pub struct ListProcessesTool;

#[async_trait]
impl Tool for ListProcessesTool {
    fn name(&self) -> &str {
        "list_processes"
    }

    fn description(&self) -> &str {
        "List top memory consuming processes."
    }

    fn parameters(&self) -> Value {
        no_parameters()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        sample(|| {
            let mut sys = System::new();
            sys.refresh_processes(ProcessesToUpdate::All, true);
            let mut procs: Vec<(String, u64)> = sys
                .processes()
                .values()
                .map(|p| (p.name().to_string_lossy().into_owned(), p.memory()))
                .collect();
            procs.sort_by_key(|(_, memory)| Reverse(*memory));

            let mut lines = vec![format!("Top {} Memory Hogs:", TOP_PROCESSES)];
            lines.extend(
                procs
                    .into_iter()
                    .take(TOP_PROCESSES)
                    .map(|(name, memory)| format!("{}: {:.1} MB", name, memory as f64 / MB)),
            );
            lines.join("\n")
        })
        .await
    }
}
