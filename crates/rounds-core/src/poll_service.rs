//! Periodic ingest: pulls recent error events from telemetry, deduplicates
//! them against known signatures, and drives the subset that qualifies
//! through investigation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::domain::{DiagnosticError, InvestigationResult, PollResult};
use crate::investigator::Investigator;
use crate::ports::{PollPort, SignatureStorePort, TelemetryPort};
use crate::triage::TriageEngine;

type Result<T> = std::result::Result<T, DiagnosticError>;

/// Orchestrates the poll and investigation cycles on behalf of the
/// scheduler.
pub struct PollService {
    telemetry: Arc<dyn TelemetryPort>,
    store: Arc<dyn SignatureStorePort>,
    investigator: Investigator,
    triage: TriageEngine,
    lookback_minutes: i64,
    services_filter: Option<Vec<String>>,
}

impl PollService {
    pub fn new(
        telemetry: Arc<dyn TelemetryPort>,
        store: Arc<dyn SignatureStorePort>,
        investigator: Investigator,
        triage: TriageEngine,
        lookback_minutes: i64,
        services_filter: Option<Vec<String>>,
    ) -> Self {
        Self {
            telemetry,
            store,
            investigator,
            triage,
            lookback_minutes,
            services_filter,
        }
    }

    async fn poll_cycle(&self) -> Result<PollResult> {
        let since = Utc::now() - Duration::minutes(self.lookback_minutes);
        let errors = self
            .telemetry
            .get_recent_errors(since, self.services_filter.as_deref())
            .await?;

        let fingerprinter = crate::fingerprint::Fingerprinter::new();

        let mut new_signatures = 0u64;
        let mut updated_signatures = 0u64;
        let mut investigations_queued = 0u64;

        for error_event in &errors {
            let fp = fingerprinter.fingerprint(error_event);
            let touched = match self.store.get_by_fingerprint(&fp).await {
                Ok(Some(mut existing)) => {
                    if let Err(e) = existing.record_occurrence(error_event.timestamp) {
                        error!(fingerprint = %fp, error = %e, "failed to apply occurrence invariant, skipping event");
                        continue;
                    }
                    if let Err(e) = self.store.update(&existing).await {
                        error!(fingerprint = %fp, error = %e, "failed to persist updated signature, skipping event");
                        continue;
                    }
                    updated_signatures += 1;
                    existing
                }
                Ok(None) => {
                    let templated = fingerprinter.templatize_message(&error_event.error_message);
                    let stack_hash = fingerprinter.hash_stack(&error_event.stack);
                    let sig = match crate::domain::Signature::new(
                        fp.clone(),
                        stack_hash,
                        error_event.error_type.clone(),
                        error_event.service.clone(),
                        templated,
                        error_event.timestamp,
                    ) {
                        Ok(s) => s,
                        Err(e) => {
                            error!(fingerprint = %fp, error = %e, "failed to construct signature, skipping event");
                            continue;
                        }
                    };
                    if let Err(e) = self.store.save(&sig).await {
                        error!(fingerprint = %fp, error = %e, "failed to persist new signature, skipping event");
                        continue;
                    }
                    new_signatures += 1;
                    sig
                }
                Err(e) => {
                    error!(fingerprint = %fp, error = %e, "store lookup failed, skipping event");
                    continue;
                }
            };

            if self.triage.should_investigate(&touched) {
                investigations_queued += 1;
            }
        }

        info!(
            errors_found = errors.len(),
            new_signatures, updated_signatures, investigations_queued, "poll cycle complete"
        );

        Ok(PollResult {
            errors_found: errors.len() as u64,
            new_signatures,
            updated_signatures,
            investigations_queued,
            timestamp: Some(Utc::now()),
        })
    }

    async fn investigation_cycle(&self) -> Result<InvestigationResult> {
        let mut pending = self.store.get_pending_investigation().await?;
        self.triage.sort_by_priority(&mut pending);

        let mut attempted = 0u64;
        let mut failed = 0u64;
        let mut diagnoses = Vec::new();

        for mut sig in pending {
            if !self.triage.should_investigate(&sig) {
                continue;
            }
            attempted += 1;
            match self.investigator.investigate(&mut sig).await {
                Ok(diagnosis) => diagnoses.push(diagnosis),
                Err(e) => {
                    warn!(signature_id = %sig.id, error = %e, "investigation failed");
                    failed += 1;
                }
            }
        }

        Ok(InvestigationResult {
            investigations_attempted: attempted,
            investigations_failed: failed,
            diagnoses_produced: diagnoses,
            timestamp: Some(Utc::now()),
        })
    }
}

#[async_trait::async_trait]
impl PollPort for PollService {
    async fn execute_poll_cycle(&self) -> Result<PollResult> {
        self.poll_cycle().await
    }

    async fn execute_investigation_cycle(&self) -> Result<InvestigationResult> {
        self.investigation_cycle().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Confidence, ErrorEvent, Severity, StackFrame};
    use crate::fakes::{MemorySignatureStore, MemoryTelemetry, MockDiagnosisEngine, RecordingNotifier};
    use std::collections::BTreeMap;

    fn event(service: &str, error_type: &str, message: &str, ts: chrono::DateTime<Utc>) -> ErrorEvent {
        ErrorEvent {
            trace_id: "abc123".into(),
            span_id: "def456".into(),
            service: service.into(),
            error_type: error_type.into(),
            error_message: message.into(),
            stack: vec![StackFrame::new("api.h", "run", "handler.py", Some(42))],
            timestamp: ts,
            attributes: BTreeMap::new(),
            severity: Severity::Error,
        }
    }

    fn build_service(
        telemetry: Arc<MemoryTelemetry>,
        store: Arc<MemorySignatureStore>,
    ) -> PollService {
        let investigator = Investigator::new(
            telemetry.clone(),
            store.clone(),
            Arc::new(MockDiagnosisEngine::always_succeeds(Confidence::High)),
            Arc::new(RecordingNotifier::default()),
            TriageEngine::default(),
            None,
        );
        PollService::new(telemetry, store, investigator, TriageEngine::default(), 60, None)
    }

    /// Scenario S1: a single new error creates one NEW signature with
    /// occurrence_count 1, and is not queued for investigation.
    #[tokio::test]
    async fn s1_new_error_creates_signature() {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        telemetry.push_event(event("api", "TimeoutError", "timeout after 30s", Utc::now()));

        let service = build_service(telemetry, store.clone());
        let result = service.execute_poll_cycle().await.unwrap();

        assert_eq!(result.errors_found, 1);
        assert_eq!(result.new_signatures, 1);
        assert_eq!(result.updated_signatures, 0);
        assert_eq!(result.investigations_queued, 0);

        let all = store.list_all(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].occurrence_count, 1);
        assert_eq!(all[0].status, crate::domain::SignatureStatus::New);
    }

    /// Scenario S2: fingerprint collapses IP/port/duration variants into
    /// one signature with occurrence_count 3 and a masked message template.
    #[tokio::test]
    async fn s2_fingerprint_collapses_variants() {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        let now = Utc::now();
        telemetry.push_event(event(
            "api",
            "ConnectionError",
            "Connection to 10.0.0.5:5432 timed out after 30s",
            now,
        ));
        telemetry.push_event(event(
            "api",
            "ConnectionError",
            "Connection to 10.0.0.7:5432 timed out after 90s",
            now,
        ));
        telemetry.push_event(event(
            "api",
            "ConnectionError",
            "Connection to 10.0.0.5:6432 timed out after 30s",
            now,
        ));

        let service = build_service(telemetry, store.clone());
        let result = service.execute_poll_cycle().await.unwrap();

        assert_eq!(result.new_signatures, 1);
        assert_eq!(result.updated_signatures, 2);

        let all = store.list_all(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].occurrence_count, 3);
        assert_eq!(all[0].message_template, "Connection to *:* timed out after *s");
    }

    #[tokio::test]
    async fn empty_batch_yields_all_zero_counts() {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        let service = build_service(telemetry, store);
        let result = service.execute_poll_cycle().await.unwrap();
        assert_eq!(result.errors_found, 0);
        assert_eq!(result.new_signatures, 0);
        assert_eq!(result.updated_signatures, 0);
        assert_eq!(result.investigations_queued, 0);
    }
}
