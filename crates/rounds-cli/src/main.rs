//! `rounds` - command-line management interface for the diagnostic agent.
//!
//! Thin wrapper over `ManagementPort`: one subcommand per operation, JSON
//! output by default, optional `--format text` for a human-readable
//! rendering. Exit code 0 on success, 1 on error.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use rounds_core::fakes::{MemoryTelemetry, MockDiagnosisEngine, RecordingNotifier};
use rounds_core::{Investigator, ManagementPort, ManagementService, Signature, SignatureStatus, TriageEngine};
use rounds_store::SurrealHandle;
use serde_json::json;
use tracing::Level;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rounds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage signatures tracked by the rounds diagnostic agent", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Mute a signature to stop further notifications
    Mute {
        #[arg(long)]
        signature_id: Uuid,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Mark a signature resolved
    Resolve {
        #[arg(long)]
        signature_id: Uuid,

        #[arg(long)]
        fix_applied: Option<String>,
    },

    /// Reset a signature to NEW and clear its diagnosis
    Retriage {
        #[arg(long)]
        signature_id: Uuid,
    },

    /// Retriage and immediately run a fresh investigation
    Reinvestigate {
        #[arg(long)]
        signature_id: Uuid,
    },

    /// Show the assembled detail view for a signature
    Details {
        #[arg(long)]
        signature_id: Uuid,
    },

    /// List signatures, optionally filtered by status
    List {
        #[arg(long, value_enum)]
        status: Option<CliStatus>,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum CliStatus {
    New,
    Investigating,
    Diagnosed,
    Resolved,
    Muted,
}

impl From<CliStatus> for SignatureStatus {
    fn from(value: CliStatus) -> Self {
        match value {
            CliStatus::New => SignatureStatus::New,
            CliStatus::Investigating => SignatureStatus::Investigating,
            CliStatus::Diagnosed => SignatureStatus::Diagnosed,
            CliStatus::Resolved => SignatureStatus::Resolved,
            CliStatus::Muted => SignatureStatus::Muted,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    rounds_core::init_tracing(false, level);

    // The CLI is a standalone composition root: it opens its own in-memory
    // store and null-adapter telemetry/diagnosis/notification backends, so
    // `reinvestigate` works offline. Pointing it at the daemon's persistent
    // store is a matter of swapping `SurrealHandle::setup_db` for a
    // connection to the shared database once a concrete backend is wired in.
    let management = match build_management_service().await {
        Ok(service) => service,
        Err(e) => {
            emit_error(cli.format, &e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Mute { signature_id, reason } => {
            management.mute(signature_id, reason).await.map(SuccessBody::Signature)
        }
        Commands::Resolve { signature_id, fix_applied } => management
            .resolve(signature_id, fix_applied)
            .await
            .map(SuccessBody::Signature),
        Commands::Retriage { signature_id } => {
            management.retriage(signature_id).await.map(SuccessBody::Signature)
        }
        Commands::Reinvestigate { signature_id } => management
            .reinvestigate(signature_id)
            .await
            .map(SuccessBody::Diagnosis),
        Commands::Details { signature_id } => management
            .get_signature_details(signature_id)
            .await
            .map(SuccessBody::Details),
        Commands::List { status } => management
            .list_signatures(status.map(SignatureStatus::from))
            .await
            .map(SuccessBody::Signatures),
    };

    match result {
        Ok(body) => {
            emit_success(cli.format, &body);
            ExitCode::SUCCESS
        }
        Err(e) => {
            emit_error(cli.format, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn build_management_service() -> anyhow::Result<ManagementService> {
    let store = Arc::new(SurrealHandle::setup_db().await?);
    let telemetry = Arc::new(MemoryTelemetry::default());
    let diagnosis = Arc::new(MockDiagnosisEngine::always_fails());
    let notification = Arc::new(RecordingNotifier::default());
    let triage = TriageEngine::default();

    let investigator = Investigator::new(
        telemetry.clone(),
        store.clone(),
        diagnosis,
        notification,
        triage,
        None,
    );

    Ok(ManagementService::new(store, telemetry, investigator))
}

enum SuccessBody {
    Signature(Signature),
    Signatures(Vec<Signature>),
    Diagnosis(rounds_core::Diagnosis),
    Details(rounds_core::SignatureDetails),
}

fn emit_success(format: OutputFormat, body: &SuccessBody) {
    match format {
        OutputFormat::Json => {
            let value = match body {
                SuccessBody::Signature(s) => json!({ "status": "ok", "signature": s }),
                SuccessBody::Signatures(items) => json!({ "status": "ok", "signatures": items }),
                SuccessBody::Diagnosis(d) => json!({ "status": "ok", "diagnosis": d }),
                SuccessBody::Details(d) => json!({ "status": "ok", "details": d }),
            };
            println!("{}", serde_json::to_string_pretty(&value).unwrap());
        }
        OutputFormat::Text => print_text(body),
    }
}

fn print_text(body: &SuccessBody) {
    match body {
        SuccessBody::Signature(s) => {
            println!("signature {}  [{:?}]", s.id, s.status);
            println!("  fingerprint: {}", s.fingerprint);
            println!("  service/error_type: {}/{}", s.service, s.error_type);
            println!("  occurrences: {}", s.occurrence_count);
        }
        SuccessBody::Signatures(items) => {
            if items.is_empty() {
                println!("no signatures found");
            }
            for s in items {
                println!(
                    "{}  {:?}  {}/{}  x{}",
                    s.id, s.status, s.service, s.error_type, s.occurrence_count
                );
            }
        }
        SuccessBody::Diagnosis(d) => {
            println!("confidence: {:?}", d.confidence);
            println!("root cause: {}", d.root_cause);
            println!("suggested fix: {}", d.suggested_fix);
            println!("cost: ${:.2}", d.cost_usd);
        }
        SuccessBody::Details(d) => {
            println!("signature {}  [{:?}]", d.signature.id, d.signature.status);
            println!("  recent events: {}", d.recent_events.len());
            println!("  related signatures: {}", d.related_signatures.len());
            if let Some(diag) = &d.diagnosis {
                println!("  diagnosis: {}", diag.root_cause);
            }
        }
    }
}

fn emit_error(format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Json => {
            let value = json!({ "status": "error", "message": message });
            println!("{}", serde_json::to_string_pretty(&value).unwrap());
        }
        OutputFormat::Text => println!("error: {}", message),
    }
}
