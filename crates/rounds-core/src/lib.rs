//! Core library for the diagnostic agent.
//!
//! Re-exports the domain model, the fingerprinting and triage engines, the
//! port traits collaborators implement, the orchestration services built
//! on top of them, and in-memory fakes for composing a runnable system
//! without real backends.

pub mod domain;
pub mod fakes;
pub mod fingerprint;
pub mod investigator;
pub mod management_service;
pub mod poll_service;
pub mod ports;
pub mod telemetry;
pub mod triage;

pub use domain::{
    Confidence, Diagnosis, DiagnosticError, ErrorEvent, InvestigationContext, InvestigationResult,
    LogEntry, PollResult, Result, Severity, Signature, SignatureStatus, SpanNode, SpanStatus,
    StackFrame, TraceTree, MAX_RECENT_EVENTS,
};

pub use fingerprint::Fingerprinter;
pub use investigator::Investigator;
pub use management_service::ManagementService;
pub use poll_service::PollService;
pub use ports::{
    DiagnosisPort, ManagementPort, NotificationPort, PollPort, SignatureDetails,
    SignatureStorePort, StoreStats, TelemetryPort,
};
pub use telemetry::init_tracing;
pub use triage::{TriageConfig, TriageEngine};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
