//! In-memory implementations of every port, for composing a runnable
//! system in tests without a real telemetry/store/LLM/notification
//! backend. Same `Mutex<HashMap<...>>`-backed-struct pattern as the
//! storage crate's fakes, applied to the new port set.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Confidence, Diagnosis, DiagnosticError, ErrorEvent, InvestigationContext, LogEntry,
    Signature, SignatureStatus, TraceTree,
};
use crate::ports::{
    DiagnosisPort, NotificationPort, Result, SignatureStorePort, StoreStats, TelemetryPort,
};

/// In-memory `SignatureStorePort`, keyed by id with a secondary
/// fingerprint index held implicitly via linear scan (fine at test scale).
#[derive(Default)]
pub struct MemorySignatureStore {
    signatures: Mutex<HashMap<Uuid, Signature>>,
}

#[async_trait]
impl SignatureStorePort for MemorySignatureStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Signature>> {
        Ok(self.signatures.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Signature>> {
        Ok(self
            .signatures
            .lock()
            .unwrap()
            .values()
            .find(|s| s.fingerprint == fingerprint)
            .cloned())
    }

    async fn save(&self, sig: &Signature) -> Result<()> {
        self.signatures.lock().unwrap().insert(sig.id, sig.clone());
        Ok(())
    }

    async fn update(&self, sig: &Signature) -> Result<()> {
        self.signatures.lock().unwrap().insert(sig.id, sig.clone());
        Ok(())
    }

    async fn get_pending_investigation(&self) -> Result<Vec<Signature>> {
        let mut pending: Vec<Signature> = self
            .signatures
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == SignatureStatus::New)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| b.occurrence_count.cmp(&a.occurrence_count))
        });
        Ok(pending)
    }

    async fn list_all(&self, status: Option<SignatureStatus>) -> Result<Vec<Signature>> {
        Ok(self
            .signatures
            .lock()
            .unwrap()
            .values()
            .filter(|s| status.map(|st| st == s.status).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_similar(&self, sig: &Signature, limit: usize) -> Result<Vec<Signature>> {
        Ok(self
            .signatures
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.id != sig.id && s.service == sig.service && s.error_type == sig.error_type)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let signatures = self.signatures.lock().unwrap();
        let total_signatures = signatures.len() as u64;
        let mut by_status = std::collections::BTreeMap::new();
        let mut by_service = std::collections::BTreeMap::new();
        let mut total_occurrences = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;

        for sig in signatures.values() {
            *by_status.entry(format!("{:?}", sig.status)).or_insert(0u64) += 1;
            *by_service.entry(sig.service.clone()).or_insert(0u64) += 1;
            total_occurrences += sig.occurrence_count;
            oldest = Some(oldest.map_or(sig.first_seen, |o: DateTime<Utc>| o.min(sig.first_seen)));
        }

        let avg_occurrence_count = if total_signatures > 0 {
            Some(total_occurrences as f64 / total_signatures as f64)
        } else {
            None
        };
        let oldest_signature_age_hours =
            oldest.map(|o| (Utc::now() - o).num_seconds() as f64 / 3600.0);

        Ok(StoreStats {
            total_signatures,
            by_status,
            by_service,
            oldest_signature_age_hours,
            avg_occurrence_count,
            total_errors_seen: Some(total_occurrences),
        })
    }
}

/// In-memory `TelemetryPort` backed by a caller-populated event list.
#[derive(Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<ErrorEvent>>,
}

impl MemoryTelemetry {
    pub fn push_event(&self, event: ErrorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl TelemetryPort for MemoryTelemetry {
    async fn get_recent_errors(
        &self,
        since: DateTime<Utc>,
        services: Option<&[String]>,
    ) -> Result<Vec<ErrorEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= since)
            .filter(|e| services.map(|s| s.contains(&e.service)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_trace(&self, trace_id: &str) -> Result<TraceTree> {
        validate_trace_id(trace_id)?;
        Err(DiagnosticError::NotFound(format!("trace {trace_id}")))
    }

    async fn get_traces(&self, trace_ids: &[String]) -> Result<Vec<TraceTree>> {
        for id in trace_ids {
            validate_trace_id(id)?;
        }
        Ok(Vec::new())
    }

    async fn get_correlated_logs(
        &self,
        _trace_ids: &[String],
        _window_minutes: i64,
    ) -> Result<Vec<LogEntry>> {
        Ok(Vec::new())
    }

    async fn get_events_for_signature(
        &self,
        fingerprint: &str,
        limit: usize,
    ) -> Result<Vec<ErrorEvent>> {
        let fingerprinter = crate::fingerprint::Fingerprinter::new();
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| fingerprinter.fingerprint(e) == fingerprint)
            .take(limit)
            .cloned()
            .collect())
    }
}

fn validate_trace_id(trace_id: &str) -> Result<()> {
    let valid = !trace_id.is_empty()
        && trace_id.len() <= 32
        && trace_id.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(DiagnosticError::Validation(format!(
            "malformed trace id: {trace_id}"
        )))
    }
}

/// Scripted `DiagnosisPort`: either always succeeds with a fixed confidence
/// or always fails with a transport error.
pub struct MockDiagnosisEngine {
    outcome: MockOutcome,
}

enum MockOutcome {
    Succeed(Confidence),
    Fail,
}

impl MockDiagnosisEngine {
    pub fn always_succeeds(confidence: Confidence) -> Self {
        Self {
            outcome: MockOutcome::Succeed(confidence),
        }
    }

    pub fn always_fails() -> Self {
        Self {
            outcome: MockOutcome::Fail,
        }
    }
}

#[async_trait]
impl DiagnosisPort for MockDiagnosisEngine {
    async fn estimate_cost(&self, _context: &InvestigationContext) -> Result<f64> {
        Ok(0.01)
    }

    async fn diagnose(&self, context: &InvestigationContext) -> Result<Diagnosis> {
        match &self.outcome {
            MockOutcome::Succeed(confidence) => Diagnosis::new(
                format!("root cause for {}", context.signature.fingerprint),
                vec!["mock evidence".to_string()],
                "mock suggested fix".to_string(),
                *confidence,
                Utc::now(),
                "mock-model",
                0.01,
            ),
            MockOutcome::Fail => Err(DiagnosticError::Transport(
                "mock diagnosis backend unavailable".to_string(),
            )),
        }
    }
}

/// Recording `NotificationPort`: accumulates every report/summary it
/// receives so tests can assert on delivery counts without a real sink.
#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<(Signature, Diagnosis)>>,
    summaries: Mutex<Vec<StoreStats>>,
}

impl RecordingNotifier {
    pub fn reports_sent(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn summaries_sent(&self) -> usize {
        self.summaries.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn report(&self, sig: &Signature, diagnosis: &Diagnosis) -> Result<()> {
        self.reports
            .lock()
            .unwrap()
            .push((sig.clone(), diagnosis.clone()));
        Ok(())
    }

    async fn report_summary(&self, stats: &StoreStats) -> Result<()> {
        self.summaries.lock().unwrap().push(stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Severity, StackFrame};
    use std::collections::BTreeMap;

    fn sample_event() -> ErrorEvent {
        ErrorEvent {
            trace_id: "deadbeef".into(),
            span_id: "beef".into(),
            service: "api".into(),
            error_type: "E".into(),
            error_message: "boom".into(),
            stack: vec![StackFrame::new("m", "f", "file.py", None)],
            timestamp: Utc::now(),
            attributes: BTreeMap::new(),
            severity: Severity::Error,
        }
    }

    #[tokio::test]
    async fn memory_store_roundtrips_by_id_and_fingerprint() {
        let store = MemorySignatureStore::default();
        let sig = Signature::new("fp", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        store.save(&sig).await.unwrap();
        assert!(store.get_by_id(sig.id).await.unwrap().is_some());
        assert!(store.get_by_fingerprint("fp").await.unwrap().is_some());
        assert!(store.get_by_fingerprint("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_telemetry_filters_by_since_and_service() {
        let telemetry = MemoryTelemetry::default();
        telemetry.push_event(sample_event());
        let future = Utc::now() + chrono::Duration::hours(1);
        let none = telemetry.get_recent_errors(future, None).await.unwrap();
        assert!(none.is_empty());

        let past = Utc::now() - chrono::Duration::hours(1);
        let some = telemetry.get_recent_errors(past, None).await.unwrap();
        assert_eq!(some.len(), 1);

        let filtered = telemetry
            .get_recent_errors(past, Some(&["other".to_string()]))
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn get_trace_rejects_malformed_id() {
        let telemetry = MemoryTelemetry::default();
        let result = telemetry.get_trace("not-hex!!").await;
        assert!(matches!(result, Err(DiagnosticError::Validation(_))));
    }

    #[tokio::test]
    async fn recording_notifier_counts_reports() {
        let notifier = RecordingNotifier::default();
        let sig = Signature::new("fp", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        let diag = Diagnosis::new(
            "r",
            vec!["e".into()],
            "f",
            Confidence::High,
            Utc::now(),
            "m",
            0.0,
        )
        .unwrap();
        notifier.report(&sig, &diag).await.unwrap();
        notifier.report(&sig, &diag).await.unwrap();
        assert_eq!(notifier.reports_sent(), 2);
    }
}
