//! Heartbeat loop: one heartbeat per tick, then act on whatever tasks came back.

use std::time::Duration;

use termlink_agent::{SessionSummary, TaskKind, TerminalAgent, TerminalTask};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub async fn run(agent: &TerminalAgent, interval: Duration, once: bool) -> anyhow::Result<()> {
    // the standalone host owns no sessions of its own
    let sessions: Vec<SessionSummary> = Vec::new();
    if once {
        tick(agent, &sessions).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(agent, &sessions).await;
            }
            _ = &mut shutdown => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Returns how many tasks were acknowledged.
pub async fn tick(agent: &TerminalAgent, sessions: &[SessionSummary]) -> usize {
    let tasks = agent.heartbeat(sessions).await;
    let mut acked = 0;
    for task in tasks.iter().filter(|t| !t.is_finished) {
        if handle_task(agent, task).await {
            acked += 1;
        }
    }
    acked
}

async fn handle_task(agent: &TerminalAgent, task: &TerminalTask) -> bool {
    match task.kind() {
        TaskKind::KillSession => {
            info!(task = %task.id, session = %task.args, "terminating session");
            agent.finish_task(&task.id).await
        }
        TaskKind::Other(name) => {
            warn!(task = %task.id, %name, "ignoring unsupported task");
            false
        }
    }
}
