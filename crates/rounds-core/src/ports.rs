//! Capability interfaces between the core and its adapters.
//!
//! The core depends only on these traits; concrete telemetry/store/
//! diagnosis/notification backends, and the driving CLI/webhook surfaces,
//! are swappable implementations wired at the composition root.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Diagnosis, DiagnosticError, ErrorEvent, InvestigationContext, InvestigationResult, LogEntry,
    PollResult, Signature, SignatureStatus, TraceTree,
};

pub type Result<T> = std::result::Result<T, DiagnosticError>;

/// Aggregate statistics over the signature store, as returned by
/// `SignatureStorePort::get_stats`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StoreStats {
    pub total_signatures: u64,
    pub by_status: std::collections::BTreeMap<String, u64>,
    pub by_service: std::collections::BTreeMap<String, u64>,
    pub oldest_signature_age_hours: Option<f64>,
    pub avg_occurrence_count: Option<f64>,
    pub total_errors_seen: Option<u64>,
}

/// Capability to fetch recent errors, traces, and correlated logs from an
/// observability backend.
#[async_trait]
pub trait TelemetryPort: Send + Sync {
    /// Events with `timestamp >= since`, optionally restricted to
    /// `services`. Implementations cap the result (>= 1000 recommended).
    async fn get_recent_errors(
        &self,
        since: DateTime<Utc>,
        services: Option<&[String]>,
    ) -> Result<Vec<ErrorEvent>>;

    /// A single trace. Fails if `trace_id` doesn't match `^[0-9a-fA-F]+$`,
    /// is longer than 32 chars, or is absent from the backend.
    async fn get_trace(&self, trace_id: &str) -> Result<TraceTree>;

    /// Validates every id upfront (fails if any is malformed), then
    /// best-effort fetches each trace; individual fetch failures are
    /// skipped with a warning rather than failing the whole call.
    async fn get_traces(&self, trace_ids: &[String]) -> Result<Vec<TraceTree>>;

    /// Logs correlated to the given trace ids within `±window_minutes`.
    async fn get_correlated_logs(
        &self,
        trace_ids: &[String],
        window_minutes: i64,
    ) -> Result<Vec<LogEntry>>;

    /// Recent events carrying (or computable to) `fingerprint`, capped at
    /// `limit`.
    async fn get_events_for_signature(
        &self,
        fingerprint: &str,
        limit: usize,
    ) -> Result<Vec<ErrorEvent>>;
}

/// Capability to persist and query signatures.
#[async_trait]
pub trait SignatureStorePort: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Signature>>;

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Signature>>;

    /// Upsert. Implementations may treat `save` and `update` identically.
    async fn save(&self, sig: &Signature) -> Result<()>;

    async fn update(&self, sig: &Signature) -> Result<()>;

    /// All `status == New` signatures, ordered by `(last_seen desc,
    /// occurrence_count desc)`.
    async fn get_pending_investigation(&self) -> Result<Vec<Signature>>;

    /// All signatures regardless of status, optionally filtered to
    /// `status`. Added beyond the minimal port surface so
    /// `ManagementService::list_signatures` can genuinely return
    /// signatures in any lifecycle state, not just `New`.
    async fn list_all(&self, status: Option<SignatureStatus>) -> Result<Vec<Signature>>;

    /// Same service + error_type as `sig`, excluding `sig` itself, capped
    /// at `limit`.
    async fn get_similar(&self, sig: &Signature, limit: usize) -> Result<Vec<Signature>>;

    async fn get_stats(&self) -> Result<StoreStats>;
}

/// Capability to invoke the LLM-backed diagnosis pipeline, budget-aware.
#[async_trait]
pub trait DiagnosisPort: Send + Sync {
    /// True estimated USD cost of diagnosing `context`. Never capped to any
    /// budget.
    async fn estimate_cost(&self, context: &InvestigationContext) -> Result<f64>;

    /// Produces a diagnosis. Fails with `DiagnosticError::BudgetExceeded`
    /// when the estimate exceeds the per-call budget, `Timeout` or
    /// `Transport` on I/O failure, `Parse` on a malformed response. The
    /// returned `Diagnosis::cost_usd` is the actual (or best-available)
    /// cost.
    async fn diagnose(&self, context: &InvestigationContext) -> Result<Diagnosis>;
}

/// Capability to deliver diagnosis reports and periodic roll-ups to humans.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// At-least-once delivery.
    async fn report(&self, sig: &Signature, diagnosis: &Diagnosis) -> Result<()>;

    async fn report_summary(&self, stats: &StoreStats) -> Result<()>;
}

/// Driving port: the periodic poll/investigation cycle, invoked by the
/// scheduler.
#[async_trait]
pub trait PollPort: Send + Sync {
    async fn execute_poll_cycle(&self) -> Result<PollResult>;

    async fn execute_investigation_cycle(&self) -> Result<InvestigationResult>;
}

/// Driving port: human-initiated lifecycle operations, invoked by the CLI
/// or webhook surfaces.
#[async_trait]
pub trait ManagementPort: Send + Sync {
    async fn mute(&self, id: Uuid, reason: Option<String>) -> Result<Signature>;

    async fn resolve(&self, id: Uuid, fix: Option<String>) -> Result<Signature>;

    async fn retriage(&self, id: Uuid) -> Result<Signature>;

    async fn reinvestigate(&self, id: Uuid) -> Result<Diagnosis>;

    async fn get_signature_details(&self, id: Uuid) -> Result<SignatureDetails>;

    async fn list_signatures(&self, status: Option<SignatureStatus>) -> Result<Vec<Signature>>;
}

/// Assembled view returned by `ManagementPort::get_signature_details`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignatureDetails {
    pub signature: Signature,
    pub recent_events: Vec<ErrorEvent>,
    pub related_signatures: Vec<Signature>,
    pub diagnosis: Option<Diagnosis>,
}
