//! Hooks the agent reports through instead of logging globally.
//! The host picks the implementation; `TracingObserver` forwards to `tracing`.

use std::fmt;

use tracing::{error, info, warn};

use crate::error::{AgentError, RegisterError};
use crate::state::LinkState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Heartbeat,
    PushSessionReplay,
    PushSessionCommand,
    FinishTask,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Heartbeat => "heartbeat",
            Operation::PushSessionReplay => "push_session_replay",
            Operation::PushSessionCommand => "push_session_command",
            Operation::FinishTask => "finish_task",
        };
        f.write_str(s)
    }
}

pub trait AgentObserver: Send + Sync {
    fn registered(&self, _name: &str) {}
    fn register_failed(&self, _name: &str, _err: &RegisterError) {}
    fn operation_failed(&self, _op: Operation, _err: &AgentError) {}
    fn state_changed(&self, _from: LinkState, _to: LinkState) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AgentObserver for TracingObserver {
    fn registered(&self, name: &str) {
        info!(%name, "terminal registered");
    }

    fn register_failed(&self, name: &str, err: &RegisterError) {
        error!(%name, "register failed: {err}");
    }

    fn operation_failed(&self, op: Operation, err: &AgentError) {
        error!(operation = %op, "{err}");
    }

    fn state_changed(&self, from: LinkState, to: LinkState) {
        match to {
            LinkState::Degraded => warn!(%from, %to, "controller link degraded"),
            _ => info!(%from, %to, "controller link state"),
        }
    }
}
