//! Client-side terminal agent.
//!
//! A [`TerminalAgent`] registers a terminal with the controller, sends
//! heartbeats carrying process metrics and receives pending
//! [`TerminalTask`]s in return, and relays session replays and executed
//! commands. HTTP and metrics are injected capabilities
//! ([`HttpTransport`], [`MetricsSource`]); [`TerminalAgent::from_config`]
//! wires the reqwest and sysinfo implementations.

pub mod agent;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod state;
pub mod transport;
pub mod types;

pub use agent::TerminalAgent;
pub use config::AgentConfig;
pub use endpoint::Endpoint;
pub use error::{AgentError, RegisterError, TransportError};
pub use metrics::{MetricsSource, SysinfoMetrics};
pub use observer::{AgentObserver, Operation, TracingObserver};
pub use state::LinkState;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, RequestBody, ReqwestTransport, Upload};
pub use types::{
    CommandRecord, HeartbeatPayload, ProcessStats, RegisteredIdentity, SessionSummary, TaskKind,
    TerminalTask,
};
