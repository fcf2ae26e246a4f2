//! Domain models for the diagnostic agent.
//!
//! Canonical definitions for the core entities: `ErrorEvent`, `Signature`,
//! `Diagnosis`, `TraceTree`, and the context/result value types assembled
//! around them.

pub mod error;
pub mod models;

pub use error::{DiagnosticError, Result};
pub use models::{
    Confidence, Diagnosis, ErrorEvent, InvestigationContext, InvestigationResult, LogEntry,
    PollResult, Severity, Signature, SignatureStatus, SpanNode, SpanStatus, StackFrame, TraceTree,
    MAX_RECENT_EVENTS,
};
