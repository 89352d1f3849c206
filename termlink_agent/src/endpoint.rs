//! Controller routes used by the agent.

use std::fmt;

use url::Url;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TerminalRegister,
    TerminalHeartbeat,
    SessionReplay,
    SessionCommand,
    FinishTask,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::TerminalRegister => "terminal-register",
            Endpoint::TerminalHeartbeat => "terminal-heartbeat",
            Endpoint::SessionReplay => "session-replay",
            Endpoint::SessionCommand => "session-command",
            Endpoint::FinishTask => "finish-task",
        }
    }

    // `{pk}` is substituted by `url`
    fn template(self) -> &'static str {
        match self {
            Endpoint::TerminalRegister => "/api/applications/v1/terminal/",
            Endpoint::TerminalHeartbeat => "/api/applications/v1/terminal/heartbeat/",
            Endpoint::SessionReplay => "/api/applications/v1/sessions/{pk}/replay/",
            Endpoint::SessionCommand => "/api/audits/v1/command/",
            Endpoint::FinishTask => "/api/applications/v1/tasks/{pk}/",
        }
    }

    /// Full request URL under `base`, keeping any path prefix `base` carries.
    /// `pk` fills the `{pk}` slot as a single percent-encoded segment; routes
    /// without a slot ignore it.
    pub fn url(self, base: &Url, pk: Option<&str>) -> Result<Url, TransportError> {
        let mut url = base.clone();
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                TransportError::InvalidRequest(format!("endpoint {base} cannot take a path"))
            })?;
            segs.pop_if_empty();
            for part in self.template().split('/').filter(|p| !p.is_empty()) {
                if part != "{pk}" {
                    segs.push(part);
                    continue;
                }
                match pk {
                    Some("" | "." | "..") | None => {
                        return Err(TransportError::InvalidRequest(format!(
                            "{self} needs a resource id, got {pk:?}"
                        )))
                    }
                    Some(pk) => {
                        segs.push(pk);
                    }
                }
            }
            segs.push("");
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
