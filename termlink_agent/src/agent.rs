//! `TerminalAgent`: registration, heartbeat/task exchange and session artifact relay.
//!
//! Registration is the only operation that fails loudly; an unregistered
//! terminal cannot do anything else. Everything after that is best effort:
//! the plain methods report failures to the observer and return an empty/false
//! sentinel, while the `try_` twins hand back the error itself.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::AgentConfig;
use crate::endpoint::Endpoint;
use crate::error::{AgentError, RegisterError, TransportError};
use crate::metrics::{MetricsSource, SysinfoMetrics};
use crate::observer::{AgentObserver, Operation, TracingObserver};
use crate::state::{AgentState, LinkState};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, ReqwestTransport, Upload};
use crate::types::{
    CommandRecord, HeartbeatPayload, RegisteredIdentity, SessionSummary, TerminalTask,
};

const REPLAY_FIELD: &str = "archive";

pub struct TerminalAgent {
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<dyn MetricsSource>,
    observer: Arc<dyn AgentObserver>,
    state: AgentState,
}

impl TerminalAgent {
    pub fn new(transport: Arc<dyn HttpTransport>, metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            transport,
            metrics,
            observer: Arc::new(TracingObserver),
            state: AgentState::default(),
        }
    }

    /// reqwest transport and sysinfo metrics, both configured from `cfg`.
    pub fn from_config(cfg: &AgentConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(cfg)?;
        let metrics = SysinfoMetrics::new(cfg.cpu_sample_interval);
        Ok(Self::new(Arc::new(transport), Arc::new(metrics)))
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start out registered with a previously issued key pair.
    pub fn with_identity(self, identity: RegisteredIdentity) -> Self {
        self.state.set_identity(identity);
        self
    }

    pub fn identity(&self) -> Option<&RegisteredIdentity> {
        self.state.identity()
    }

    pub fn link_state(&self) -> LinkState {
        self.state.link()
    }

    pub async fn register(&self, name: &str) -> Result<RegisteredIdentity, RegisterError> {
        let res = self.try_register(name).await;
        match &res {
            Ok(_) => {
                self.observer.registered(name);
                self.observer
                    .state_changed(LinkState::Unregistered, LinkState::Registered);
            }
            Err(e) => self.observer.register_failed(name, e),
        }
        res
    }

    async fn try_register(&self, name: &str) -> Result<RegisteredIdentity, RegisterError> {
        if self.state.identity().is_some() {
            return Err(RegisterError::AlreadyRegistered);
        }
        let req = ApiRequest::post(
            Endpoint::TerminalRegister,
            RequestBody::Json(json!({ "name": name })),
        );
        let resp = self.transport.send(req).await?;
        match resp.status {
            201 => {
                let identity = parse_access_key(&resp.body)?;
                // a concurrent register may have won
                if !self.state.set_identity(identity.clone()) {
                    return Err(RegisterError::AlreadyRegistered);
                }
                Ok(identity)
            }
            409 => Err(RegisterError::NameExists(name.to_string())),
            status => Err(RegisterError::Unknown {
                name: name.to_string(),
                status,
                body: resp.body,
            }),
        }
    }

    pub async fn heartbeat(&self, sessions: &[SessionSummary]) -> Vec<TerminalTask> {
        self.try_heartbeat(sessions)
            .await
            .unwrap_or_else(|e| self.swallow(Operation::Heartbeat, e))
    }

    pub async fn try_heartbeat(
        &self,
        sessions: &[SessionSummary],
    ) -> Result<Vec<TerminalTask>, AgentError> {
        let identity = self.require_identity()?;
        let stats = self.metrics.sample().await;
        let payload = HeartbeatPayload::new(stats, sessions.to_vec());
        let req = ApiRequest::post(
            Endpoint::TerminalHeartbeat,
            RequestBody::Json(serde_json::to_value(&payload)?),
        )
        .authenticated(identity);

        // the link is only up once the task list decodes
        let tasks = match self.transport.send(req).await {
            Ok(resp) => expect_status(&resp, 201)
                .and_then(|_| Ok(TerminalTask::from_multi_json(resp.body)?)),
            Err(e) => Err(e.into()),
        };
        self.mark_link(tasks.is_ok());
        tasks
    }

    pub async fn push_session_replay(&self, archive: &Path, session_id: &str) -> bool {
        self.try_push_session_replay(archive, session_id)
            .await
            .map(|_| true)
            .unwrap_or_else(|e| self.swallow(Operation::PushSessionReplay, e))
    }

    /// The file is opened here and moved into the request, so it is closed as
    /// soon as the transport finishes with it, on every outcome.
    pub async fn try_push_session_replay(
        &self,
        archive: &Path,
        session_id: &str,
    ) -> Result<(), AgentError> {
        let identity = self.require_identity()?;
        let file = tokio::fs::File::open(archive).await?;
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{session_id}.replay"));
        let req = ApiRequest::post(
            Endpoint::SessionReplay,
            RequestBody::Multipart(Upload {
                field: REPLAY_FIELD,
                file_name,
                file,
            }),
        )
        .with_pk(session_id)
        .authenticated(identity);

        let resp = self.transport.send(req).await?;
        expect_status(&resp, 201)
    }

    pub async fn push_session_command(&self, batch: &[CommandRecord]) -> bool {
        self.try_push_session_command(batch)
            .await
            .map(|_| true)
            .unwrap_or_else(|e| self.swallow(Operation::PushSessionCommand, e))
    }

    pub async fn try_push_session_command(&self, batch: &[CommandRecord]) -> Result<(), AgentError> {
        let identity = self.require_identity()?;
        let req = ApiRequest::post(
            Endpoint::SessionCommand,
            RequestBody::Json(serde_json::to_value(batch)?),
        )
        .authenticated(identity);
        let resp = self.transport.send(req).await?;
        expect_status(&resp, 201)
    }

    pub async fn finish_task(&self, task_id: &str) -> bool {
        self.try_finish_task(task_id)
            .await
            .map(|_| true)
            .unwrap_or_else(|e| self.swallow(Operation::FinishTask, e))
    }

    pub async fn try_finish_task(&self, task_id: &str) -> Result<(), AgentError> {
        let identity = self.require_identity()?;
        let req = ApiRequest::patch(
            Endpoint::FinishTask,
            RequestBody::Json(json!({ "is_finished": true })),
        )
        .with_pk(task_id)
        .authenticated(identity);
        let resp = self.transport.send(req).await?;
        expect_status(&resp, 200)
    }

    fn require_identity(&self) -> Result<RegisteredIdentity, AgentError> {
        self.state.identity().cloned().ok_or(AgentError::Unregistered)
    }

    fn mark_link(&self, ok: bool) {
        let next = if ok {
            LinkState::Active
        } else {
            LinkState::Degraded
        };
        let prev = self.state.transition(next);
        if prev != next {
            self.observer.state_changed(prev, next);
        }
    }

    fn swallow<T: Default>(&self, op: Operation, err: AgentError) -> T {
        self.observer.operation_failed(op, &err);
        T::default()
    }
}

fn expect_status(resp: &ApiResponse, expected: u16) -> Result<(), AgentError> {
    if resp.status == expected {
        Ok(())
    } else {
        Err(AgentError::UnexpectedStatus {
            status: resp.status,
            expected,
        })
    }
}

fn parse_access_key(body: &Value) -> Result<RegisteredIdentity, RegisterError> {
    let key = body
        .get("access_key")
        .ok_or(RegisterError::Malformed("access_key"))?;
    let field = |name: &'static str, what: &'static str| {
        key.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(RegisterError::Malformed(what))
    };
    Ok(RegisteredIdentity {
        access_key_id: field("id", "access_key.id")?,
        access_key_secret: field("secret", "access_key.secret")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_extraction() {
        let body = json!({"access_key": {"id": "k1", "secret": "s1"}, "name": "t"});
        let id = parse_access_key(&body).unwrap();
        assert_eq!(id, RegisteredIdentity::new("k1", "s1"));

        let missing = json!({"access_key": {"id": "k1"}});
        assert!(matches!(
            parse_access_key(&missing),
            Err(RegisterError::Malformed("access_key.secret"))
        ));
        assert!(matches!(
            parse_access_key(&Value::Null),
            Err(RegisterError::Malformed("access_key"))
        ));
    }

    #[test]
    fn status_check() {
        let ok = ApiResponse {
            status: 201,
            body: Value::Null,
        };
        assert!(expect_status(&ok, 201).is_ok());
        assert!(matches!(
            expect_status(&ok, 200),
            Err(AgentError::UnexpectedStatus {
                status: 201,
                expected: 200
            })
        ));
    }
}
