//! Entry point for the termlink host. Parses args, registers once and runs the heartbeat loop.

mod credentials;
mod host;

use anyhow::{bail, Context};
use credentials::{credentials_path, load_credentials, save_credentials};
use std::env;
use std::time::Duration;
use termlink_agent::{AgentConfig, TerminalAgent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct ParsedArgs {
    endpoint: Option<String>,
    name: Option<String>,
    interval_secs: Option<u64>,
    once: bool,
    dry_run: bool,
}

enum Parsed {
    Run(ParsedArgs),
    Help(String),
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--endpoint URL|-e URL] [--name NAME|-n NAME] [--interval SECS|-i SECS] [--once] [--dry-run]"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Parsed, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "termlink".into());
    let mut out = ParsedArgs::default();

    let parse_secs = |v: Option<String>| -> Result<u64, String> {
        v.as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .ok_or_else(|| format!("--interval expects a positive number of seconds. {}", usage(&prog)))
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help(usage(&prog))),
            "--endpoint" | "-e" => out.endpoint = it.next(),
            "--name" | "-n" => out.name = it.next(),
            "--interval" | "-i" => out.interval_secs = Some(parse_secs(it.next())?),
            "--once" => out.once = true,
            "--dry-run" => out.dry_run = true,
            _ if arg.starts_with("--endpoint=") => {
                out.endpoint = arg.split_once('=').map(|(_, v)| v.to_string());
            }
            _ if arg.starts_with("--name=") => {
                out.name = arg.split_once('=').map(|(_, v)| v.to_string());
            }
            _ if arg.starts_with("--interval=") => {
                out.interval_secs = Some(parse_secs(arg.split_once('=').map(|(_, v)| v.to_string()))?);
            }
            _ => return Err(format!("Unexpected argument {arg}. {}", usage(&prog))),
        }
    }
    Ok(Parsed::Run(out))
}

fn resolve_config(parsed: &ParsedArgs) -> AgentConfig {
    let mut cfg = AgentConfig::from_env();
    if let Some(e) = parsed.endpoint.as_ref().filter(|e| !e.is_empty()) {
        cfg.endpoint = e.clone();
    }
    if let Some(n) = parsed.name.as_ref().filter(|n| !n.is_empty()) {
        cfg.name = n.clone();
    }
    if let Some(s) = parsed.interval_secs {
        cfg.heartbeat_interval = Duration::from_secs(s);
    }
    cfg
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn ensure_registered(agent: TerminalAgent, cfg: &AgentConfig) -> anyhow::Result<TerminalAgent> {
    let mut store = load_credentials();
    if let Some(identity) = store.identity_for(&cfg.endpoint, &cfg.name) {
        info!(access_key = %identity.access_key_id, "using stored access key");
        return Ok(agent.with_identity(identity));
    }
    let identity = agent
        .register(&cfg.name)
        .await
        .with_context(|| format!("registering terminal {} at {}", cfg.name, cfg.endpoint))?;
    store.remember(&cfg.endpoint, &cfg.name, &identity);
    if let Err(e) = save_credentials(&store) {
        warn!("could not persist access key to {}: {e}", credentials_path().display());
    }
    Ok(agent)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(Parsed::Run(p)) => p,
        Ok(Parsed::Help(msg)) => {
            eprintln!("{msg}");
            return Ok(());
        }
        Err(msg) => bail!(msg),
    };

    let cfg = resolve_config(&parsed);
    cfg.validate().map_err(anyhow::Error::msg)?;

    if parsed.dry_run {
        let stored = load_credentials()
            .identity_for(&cfg.endpoint, &cfg.name)
            .is_some();
        println!("endpoint: {}", cfg.endpoint);
        println!("name: {}", cfg.name);
        println!("heartbeat: {}s", cfg.heartbeat_interval.as_secs());
        println!("credentials: {}", if stored { "stored" } else { "none" });
        return Ok(());
    }

    init_tracing();
    let agent = TerminalAgent::from_config(&cfg).context("building agent")?;
    let agent = ensure_registered(agent, &cfg).await?;
    info!(endpoint = %cfg.endpoint, name = %cfg.name, "terminal online");
    host::run(&agent, cfg.heartbeat_interval, parsed.once).await
}
