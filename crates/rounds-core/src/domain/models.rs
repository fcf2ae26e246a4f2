//! Core entities: stack frames, error events, signatures, diagnoses, trace
//! trees, logs, and the context/result value types assembled around them.
//!
//! Field shapes follow the distilled domain model one-for-one; construction
//! and mutation helpers enforce the invariants documented on `Signature`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::{DiagnosticError, Result};

/// One frame of a stack trace. `lineno` is kept for display but ignored by
/// fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub module: String,
    pub function: String,
    pub filename: String,
    pub lineno: Option<u32>,
}

impl StackFrame {
    pub fn new(
        module: impl Into<String>,
        function: impl Into<String>,
        filename: impl Into<String>,
        lineno: Option<u32>,
    ) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            filename: filename.into(),
            lineno,
        }
    }
}

/// Severity of an `ErrorEvent` or `LogEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// One raw error occurrence, as reported by telemetry. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub trace_id: String,
    pub span_id: String,
    pub service: String,
    pub error_type: String,
    pub error_message: String,
    pub stack: Vec<StackFrame>,
    pub timestamp: DateTime<Utc>,
    pub attributes: BTreeMap<String, Value>,
    pub severity: Severity,
}

/// Lifecycle state of a `Signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureStatus {
    New,
    Investigating,
    Diagnosed,
    Resolved,
    Muted,
}

/// Confidence level attached to a `Diagnosis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// An LLM-produced root-cause diagnosis, attached to a `Signature` once
/// produced. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub root_cause: String,
    pub evidence: Vec<String>,
    pub suggested_fix: String,
    pub confidence: Confidence,
    pub diagnosed_at: DateTime<Utc>,
    pub model: String,
    pub cost_usd: f64,
}

impl Diagnosis {
    /// Validates the non-empty-field and non-negative-cost invariants.
    pub fn new(
        root_cause: impl Into<String>,
        evidence: Vec<String>,
        suggested_fix: impl Into<String>,
        confidence: Confidence,
        diagnosed_at: DateTime<Utc>,
        model: impl Into<String>,
        cost_usd: f64,
    ) -> Result<Self> {
        let root_cause = root_cause.into();
        let suggested_fix = suggested_fix.into();
        let model = model.into();
        if root_cause.trim().is_empty() {
            return Err(DiagnosticError::Validation(
                "root_cause must not be empty".into(),
            ));
        }
        if evidence.is_empty() || evidence.iter().any(|e| e.trim().is_empty()) {
            return Err(DiagnosticError::Validation(
                "evidence must be a non-empty list of non-empty strings".into(),
            ));
        }
        if suggested_fix.trim().is_empty() {
            return Err(DiagnosticError::Validation(
                "suggested_fix must not be empty".into(),
            ));
        }
        if cost_usd < 0.0 {
            return Err(DiagnosticError::Validation(
                "cost_usd must be >= 0".into(),
            ));
        }
        Ok(Self {
            root_cause,
            evidence,
            suggested_fix,
            confidence,
            diagnosed_at,
            model,
            cost_usd,
        })
    }
}

/// A class of errors sharing a fingerprint. Identity = `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub id: Uuid,
    pub fingerprint: String,
    pub stack_hash: String,
    pub error_type: String,
    pub service: String,
    pub message_template: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
    pub status: SignatureStatus,
    pub diagnosis: Option<Diagnosis>,
    pub tags: BTreeSet<String>,
}

impl Signature {
    /// Names commonly checked against `tags`.
    pub const TAG_CRITICAL: &'static str = "critical";
    pub const TAG_FLAKY_TEST: &'static str = "flaky-test";

    /// Constructs a brand-new signature from a first occurrence. Status is
    /// always `New`, `occurrence_count` always `1`.
    pub fn new(
        fingerprint: impl Into<String>,
        stack_hash: impl Into<String>,
        error_type: impl Into<String>,
        service: impl Into<String>,
        message_template: impl Into<String>,
        seen_at: DateTime<Utc>,
    ) -> Result<Self> {
        let sig = Self {
            id: Uuid::new_v4(),
            fingerprint: fingerprint.into(),
            stack_hash: stack_hash.into(),
            error_type: error_type.into(),
            service: service.into(),
            message_template: message_template.into(),
            first_seen: seen_at,
            last_seen: seen_at,
            occurrence_count: 1,
            status: SignatureStatus::New,
            diagnosis: None,
            tags: BTreeSet::new(),
        };
        sig.validate()?;
        Ok(sig)
    }

    /// Checks the invariants that must hold on construction and after every
    /// mutation: `occurrence_count >= 1` and `last_seen >= first_seen`.
    pub fn validate(&self) -> Result<()> {
        if self.occurrence_count < 1 {
            return Err(DiagnosticError::Validation(
                "occurrence_count must be >= 1".into(),
            ));
        }
        if self.last_seen < self.first_seen {
            return Err(DiagnosticError::Validation(
                "last_seen must be >= first_seen".into(),
            ));
        }
        Ok(())
    }

    /// Records another occurrence of this fingerprint at `seen_at`. Does not
    /// change `status`.
    pub fn record_occurrence(&mut self, seen_at: DateTime<Utc>) -> Result<()> {
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
        self.occurrence_count += 1;
        self.validate()
    }

    pub fn is_critical(&self) -> bool {
        self.tags.contains(Self::TAG_CRITICAL)
    }

    pub fn is_flaky_test(&self) -> bool {
        self.tags.contains(Self::TAG_FLAKY_TEST)
    }

    pub fn mute(&mut self) {
        self.status = SignatureStatus::Muted;
    }

    pub fn resolve(&mut self) {
        self.status = SignatureStatus::Resolved;
    }

    /// Clears any attached diagnosis and reopens the signature as `New`.
    pub fn retriage(&mut self) {
        self.diagnosis = None;
        self.status = SignatureStatus::New;
    }

    pub fn transition_to_investigating(&mut self) {
        self.status = SignatureStatus::Investigating;
    }

    /// Reverts an in-flight investigation back to `New` after a diagnosis
    /// failure.
    pub fn revert_to_new(&mut self) {
        self.status = SignatureStatus::New;
    }

    pub fn attach_diagnosis(&mut self, diagnosis: Diagnosis) {
        self.diagnosis = Some(diagnosis);
        self.status = SignatureStatus::Diagnosed;
    }
}

/// Status of a `SpanNode` within a `TraceTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

/// One node of a span tree. Children own their subtrees; there is no parent
/// back-pointer on the owned form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanNode {
    pub span_id: String,
    pub service: String,
    pub operation: String,
    pub duration_ms: f64,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, Value>,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    /// Collects every node in this subtree (including self) whose status is
    /// `Error`, depth-first.
    fn collect_error_spans<'a>(&'a self, out: &mut Vec<&'a SpanNode>) {
        if self.status == SpanStatus::Error {
            out.push(self);
        }
        for child in &self.children {
            child.collect_error_spans(out);
        }
    }
}

/// A full trace: its root span plus a derived flat view of error spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceTree {
    pub trace_id: String,
    pub root: SpanNode,
}

impl TraceTree {
    pub fn new(trace_id: impl Into<String>, root: SpanNode) -> Self {
        Self {
            trace_id: trace_id.into(),
            root,
        }
    }

    /// Flat, depth-first sequence of spans with `status == Error`.
    pub fn error_spans(&self) -> Vec<&SpanNode> {
        let mut out = Vec::new();
        self.root.collect_error_spans(&mut out);
        out
    }
}

/// One log line, optionally correlated to a trace/span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub body: String,
    pub attributes: BTreeMap<String, Value>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

/// The assembled context handed to the diagnosis port for one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationContext {
    pub signature: Signature,
    pub recent_events: Vec<ErrorEvent>,
    pub traces: Vec<TraceTree>,
    pub logs: Vec<LogEntry>,
    pub codebase_path: Option<String>,
    pub historical_context: Vec<Signature>,
}

/// Maximum number of recent events assembled into an `InvestigationContext`.
pub const MAX_RECENT_EVENTS: usize = 5;

/// Summary counters returned by `PollService::execute_poll_cycle`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PollResult {
    pub errors_found: u64,
    pub new_signatures: u64,
    pub updated_signatures: u64,
    pub investigations_queued: u64,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Summary counters returned by `PollService::execute_investigation_cycle`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestigationResult {
    pub investigations_attempted: u64,
    pub investigations_failed: u64,
    pub diagnoses_produced: Vec<Diagnosis>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(mins_ago: i64) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::minutes(mins_ago)
    }

    #[test]
    fn new_signature_has_count_one_and_status_new() {
        let sig = Signature::new("fp", "sh", "TimeoutError", "api", "timeout after *", t(0))
            .unwrap();
        assert_eq!(sig.occurrence_count, 1);
        assert_eq!(sig.status, SignatureStatus::New);
        assert!(sig.diagnosis.is_none());
    }

    #[test]
    fn record_occurrence_bumps_count_and_last_seen() {
        let mut sig = Signature::new("fp", "sh", "E", "svc", "msg", t(10)).unwrap();
        sig.record_occurrence(t(0)).unwrap();
        assert_eq!(sig.occurrence_count, 2);
        assert_eq!(sig.last_seen, t(0));
    }

    #[test]
    fn validate_rejects_last_seen_before_first_seen() {
        let mut sig = Signature::new("fp", "sh", "E", "svc", "msg", t(0)).unwrap();
        sig.last_seen = t(10);
        assert!(sig.validate().is_err());
    }

    #[test]
    fn retriage_clears_diagnosis_and_reopens() {
        let mut sig = Signature::new("fp", "sh", "E", "svc", "msg", t(0)).unwrap();
        sig.attach_diagnosis(
            Diagnosis::new(
                "root",
                vec!["evidence".into()],
                "fix",
                Confidence::High,
                t(0),
                "model",
                0.01,
            )
            .unwrap(),
        );
        assert_eq!(sig.status, SignatureStatus::Diagnosed);
        sig.retriage();
        assert_eq!(sig.status, SignatureStatus::New);
        assert!(sig.diagnosis.is_none());
    }

    #[test]
    fn diagnosis_rejects_empty_evidence() {
        let err = Diagnosis::new("root", vec![], "fix", Confidence::Low, t(0), "m", 0.0);
        assert!(err.is_err());
    }

    #[test]
    fn trace_tree_collects_only_error_spans() {
        let leaf_ok = SpanNode {
            span_id: "b".into(),
            service: "svc".into(),
            operation: "op".into(),
            duration_ms: 1.0,
            status: SpanStatus::Ok,
            attributes: BTreeMap::new(),
            children: vec![],
        };
        let leaf_err = SpanNode {
            span_id: "c".into(),
            service: "svc".into(),
            operation: "op2".into(),
            duration_ms: 1.0,
            status: SpanStatus::Error,
            attributes: BTreeMap::new(),
            children: vec![],
        };
        let root = SpanNode {
            span_id: "a".into(),
            service: "svc".into(),
            operation: "root".into(),
            duration_ms: 5.0,
            status: SpanStatus::Ok,
            attributes: BTreeMap::new(),
            children: vec![leaf_ok, leaf_err],
        };
        let tree = TraceTree::new("trace1", root);
        let errs = tree.error_spans();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].span_id, "c");
    }
}
