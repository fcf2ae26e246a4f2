//! Composition root for the rounds diagnostic daemon.
//!
//! The only module that wires concrete adapters to core ports. Concrete
//! telemetry/diagnosis backends are out of scope here (see `DESIGN.md`);
//! this root wires the in-memory fakes shipped with `rounds-core` behind
//! the same ports a real backend would implement, so all three run modes
//! (`daemon`, `cli`, `webhook`) are exercised end-to-end with a real
//! `SurrealHandle` signature store.

mod budget;
mod notification;
mod scheduler;
mod settings;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use rounds_core::fakes::{MemoryTelemetry, MockDiagnosisEngine};
use rounds_core::{Investigator, ManagementPort, ManagementService, PollPort, PollService, TriageEngine};
use rounds_store::SurrealHandle;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use crate::budget::BudgetLedger;
use crate::notification::StdoutNotifier;
use crate::scheduler::Scheduler;
use crate::settings::{RunMode, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    rounds_core::init_tracing(settings.log_json, settings.tracing_level());

    info!(run_mode = ?settings.run_mode, "starting rounds daemon");

    let store = Arc::new(
        SurrealHandle::setup_db()
            .await
            .context("failed to connect to signature store")?,
    );
    let telemetry = Arc::new(MemoryTelemetry::default());
    let diagnosis = Arc::new(MockDiagnosisEngine::always_fails());
    let notification = Arc::new(StdoutNotifier);
    let triage = TriageEngine::default();

    let poll_investigator = Investigator::new(
        telemetry.clone(),
        store.clone(),
        diagnosis.clone(),
        notification.clone(),
        triage.clone(),
        Some(settings.codebase_path.clone()),
    );
    let management_investigator = Investigator::new(
        telemetry.clone(),
        store.clone(),
        diagnosis,
        notification,
        triage.clone(),
        Some(settings.codebase_path.clone()),
    );

    let poll_service: Arc<dyn PollPort> = Arc::new(PollService::new(
        telemetry.clone(),
        store.clone(),
        poll_investigator,
        triage,
        settings.error_lookback_minutes,
        None,
    ));
    let management_service: Arc<dyn ManagementPort> = Arc::new(ManagementService::new(
        store,
        telemetry,
        management_investigator,
    ));

    match settings.run_mode {
        RunMode::Daemon => run_daemon(poll_service, &settings).await,
        RunMode::Cli => run_interactive_cli(management_service).await,
        RunMode::Webhook => run_webhook(poll_service, management_service, &settings).await,
    }
}

async fn run_daemon(poll: Arc<dyn PollPort>, settings: &Settings) -> anyhow::Result<()> {
    let budget = Arc::new(BudgetLedger::new(settings.daily_budget_limit));
    let scheduler = Arc::new(Scheduler::new(poll, budget, settings.poll_interval_seconds));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, stopping scheduler");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

async fn run_webhook(
    poll: Arc<dyn PollPort>,
    management: Arc<dyn ManagementPort>,
    settings: &Settings,
) -> anyhow::Result<()> {
    let router = rounds_web::router(poll, management, settings.webhook_api_key.clone());
    let addr = format!("{}:{}", settings.webhook_host, settings.webhook_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {addr}"))?;

    info!(%addr, "webhook server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("webhook server error")?;
    Ok(())
}

/// Interactive REPL over `ManagementPort`: one JSON command per line.
/// Mirrors the CLI's command set for ad-hoc operation against the
/// daemon's own wiring without a separate process.
async fn run_interactive_cli(management: Arc<dyn ManagementPort>) -> anyhow::Result<()> {
    println!("rounds interactive CLI. Type 'help' or 'exit'.");

    loop {
        print!("rounds> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.eq_ignore_ascii_case("help") {
            print_cli_help();
            continue;
        }

        match dispatch_interactive_command(&management, line).await {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap()),
            Err(e) => {
                error!(error = %e, "command failed");
                println!(
                    "{}",
                    serde_json::json!({ "status": "error", "message": e.to_string() })
                );
            }
        }
    }

    Ok(())
}

async fn dispatch_interactive_command(
    management: &Arc<dyn ManagementPort>,
    line: &str,
) -> anyhow::Result<serde_json::Value> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let args_str = parts.next().unwrap_or("").trim();
    let args: serde_json::Value = if args_str.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(args_str).context("arguments must be a JSON object")?
    };

    let signature_id = || -> anyhow::Result<Uuid> {
        args.get("signature_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: signature_id"))?
            .parse()
            .context("signature_id must be a UUID")
    };

    let value = match command {
        "list" => {
            let status = args
                .get("status")
                .and_then(|v| v.as_str())
                .map(|s| serde_json::from_value(serde_json::Value::String(s.to_uppercase())))
                .transpose()
                .context("invalid status")?;
            serde_json::to_value(management.list_signatures(status).await?)?
        }
        "details" => serde_json::to_value(management.get_signature_details(signature_id()?).await?)?,
        "mute" => {
            let reason = args.get("reason").and_then(|v| v.as_str()).map(String::from);
            serde_json::to_value(management.mute(signature_id()?, reason).await?)?
        }
        "resolve" => {
            let fix = args
                .get("fix_applied")
                .and_then(|v| v.as_str())
                .map(String::from);
            serde_json::to_value(management.resolve(signature_id()?, fix).await?)?
        }
        "retriage" => serde_json::to_value(management.retriage(signature_id()?).await?)?,
        "reinvestigate" => serde_json::to_value(management.reinvestigate(signature_id()?).await?)?,
        other => anyhow::bail!("unknown command: {other}. Use 'help' for available commands."),
    };
    Ok(value)
}

fn print_cli_help() {
    println!(
        r#"Available commands (JSON arguments after the command name):

  list {{"status": "new"}}
  details {{"signature_id": "..."}}
  mute {{"signature_id": "...", "reason": "..."}}
  resolve {{"signature_id": "...", "fix_applied": "..."}}
  retriage {{"signature_id": "..."}}
  reinvestigate {{"signature_id": "..."}}
  help
  exit
"#
    );
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = &mut ctrl_c => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
