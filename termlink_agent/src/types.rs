//! Data types exchanged with the controller.
//! Keep this module minimal and stable; it defines the wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access key pair handed out by the controller on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredIdentity {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl RegisteredIdentity {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }
}

/// A session as reported by the host. Only `is_finished` is interpreted;
/// every other field is carried through to the controller as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub is_finished: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionSummary {
    pub fn new(is_finished: bool) -> Self {
        Self {
            is_finished,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Snapshot of the current process, as produced by a `MetricsSource`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessStats {
    pub cpu_percent: f32,
    pub rss_bytes: u64,
    pub connections: usize,
    pub threads: usize,
    // seconds since the unix epoch
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatPayload {
    pub cpu_used: f32,
    pub memory_used: u64,
    pub connections: usize,
    pub threads: usize,
    pub boot_time: f64,
    pub session_online: usize,
    pub sessions: Vec<SessionSummary>,
}

impl HeartbeatPayload {
    pub fn new(stats: ProcessStats, sessions: Vec<SessionSummary>) -> Self {
        let session_online = sessions.iter().filter(|s| !s.is_finished).count();
        Self {
            cpu_used: stats.cpu_percent,
            memory_used: stats.rss_bytes,
            connections: stats.connections,
            threads: stats.threads,
            boot_time: stats.start_time,
            session_online,
            sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    KillSession,
    Other(String),
}

/// Unit of work the controller hands back in a heartbeat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
}

impl TerminalTask {
    /// Parse a JSON array of task objects, preserving order.
    pub fn from_multi_json(value: Value) -> Result<Vec<TerminalTask>, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn kind(&self) -> TaskKind {
        match self.name.as_str() {
            "kill_session" => TaskKind::KillSession,
            other => TaskKind::Other(other.to_string()),
        }
    }
}

/// One command executed inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub user: String,
    pub asset: String,
    pub system_user: String,
    pub input: String,
    pub output: String,
    pub session: String,
    pub timestamp: i64,
}
