//! Process metrics for heartbeats, sampled from the agent's own process via sysinfo.

use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

use crate::types::ProcessStats;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// May wait for a short sampling window before returning.
    async fn sample(&self) -> ProcessStats;
}

pub struct SysinfoMetrics {
    sys: Mutex<System>,
    pid: Option<Pid>,
    interval: Duration,
}

impl SysinfoMetrics {
    pub fn new(interval: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("cannot resolve current pid: {e}");
                None
            }
        };
        Self {
            sys: Mutex::new(System::new()),
            pid,
            interval,
        }
    }
}

#[async_trait]
impl MetricsSource for SysinfoMetrics {
    async fn sample(&self) -> ProcessStats {
        let Some(pid) = self.pid else {
            return ProcessStats::default();
        };
        let kind = ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_tasks();

        // cpu% needs two refreshes with some wall time between them
        let mut sys = self.sys.lock().await;
        sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);
        sleep(self.interval).await;
        sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);

        let Some(p) = sys.process(pid) else {
            warn!(%pid, "own process missing from sysinfo; reporting zeroed stats");
            return ProcessStats::default();
        };
        ProcessStats {
            cpu_percent: p.cpu_usage(),
            rss_bytes: p.memory(),
            connections: open_sockets(),
            threads: p.tasks().map(|t| t.len()).filter(|n| *n > 0).unwrap_or(1),
            start_time: p.start_time() as f64,
        }
    }
}

/// TCP/UDP sockets held by this process. Unix-domain sockets are not network
/// connections, so only fds whose inode shows up in the inet tables count.
#[cfg(target_os = "linux")]
fn open_sockets() -> usize {
    let Ok(dir) = std::fs::read_dir("/proc/self/fd") else {
        return 0;
    };
    let inet = inet_socket_inodes();
    dir.filter_map(Result::ok)
        .filter_map(|e| std::fs::read_link(e.path()).ok())
        .filter_map(|target| socket_inode(&target.to_string_lossy()))
        .filter(|ino| inet.contains(ino))
        .count()
}

/// `socket:[12345]` -> 12345
#[cfg(target_os = "linux")]
fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

#[cfg(target_os = "linux")]
fn inet_socket_inodes() -> std::collections::HashSet<u64> {
    ["tcp", "tcp6", "udp", "udp6"]
        .iter()
        .filter_map(|t| std::fs::read_to_string(format!("/proc/self/net/{t}")).ok())
        .flat_map(|text| parse_inet_inodes(&text))
        .collect()
}

// /proc/net/{tcp,udp}: header line, then inode in the tenth column
#[cfg(target_os = "linux")]
fn parse_inet_inodes(text: &str) -> Vec<u64> {
    text.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(9)?.parse::<u64>().ok())
        .filter(|ino| *ino != 0)
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn open_sockets() -> usize {
    0
}
