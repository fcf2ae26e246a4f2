//! Per-signature investigation workflow: assemble context, call the
//! diagnosis port, persist the outcome, and notify if triage says so.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{DiagnosticError, InvestigationContext, Signature, MAX_RECENT_EVENTS};
use crate::ports::{DiagnosisPort, NotificationPort, SignatureStorePort, TelemetryPort};
use crate::triage::TriageEngine;

type Result<T> = std::result::Result<T, DiagnosticError>;

/// Orchestrates one signature's end-to-end investigation.
pub struct Investigator {
    telemetry: Arc<dyn TelemetryPort>,
    store: Arc<dyn SignatureStorePort>,
    diagnosis: Arc<dyn DiagnosisPort>,
    notification: Arc<dyn NotificationPort>,
    triage: TriageEngine,
    codebase_path: Option<String>,
    correlated_logs_window_minutes: i64,
    similar_signatures_limit: usize,
}

impl Investigator {
    pub fn new(
        telemetry: Arc<dyn TelemetryPort>,
        store: Arc<dyn SignatureStorePort>,
        diagnosis: Arc<dyn DiagnosisPort>,
        notification: Arc<dyn NotificationPort>,
        triage: TriageEngine,
        codebase_path: Option<String>,
    ) -> Self {
        Self {
            telemetry,
            store,
            diagnosis,
            notification,
            triage,
            codebase_path,
            correlated_logs_window_minutes: 5,
            similar_signatures_limit: 5,
        }
    }

    /// Runs the full investigation sequence for `sig`, returning the
    /// produced diagnosis. On diagnosis failure, reverts `sig` to `New`
    /// (best-effort persist, failure logged but not fatal) and propagates
    /// the original error.
    pub async fn investigate(&self, sig: &mut Signature) -> Result<crate::domain::Diagnosis> {
        let recent_events = self
            .telemetry
            .get_events_for_signature(&sig.fingerprint, MAX_RECENT_EVENTS)
            .await?;

        let trace_ids: Vec<String> = recent_events
            .iter()
            .map(|e| e.trace_id.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let traces = if trace_ids.is_empty() {
            Vec::new()
        } else {
            match self.telemetry.get_traces(&trace_ids).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(signature_id = %sig.id, error = %e, "failed to fetch traces, continuing without them");
                    Vec::new()
                }
            }
        };

        let logs = if trace_ids.is_empty() {
            Vec::new()
        } else {
            match self
                .telemetry
                .get_correlated_logs(&trace_ids, self.correlated_logs_window_minutes)
                .await
            {
                Ok(l) => l,
                Err(e) => {
                    warn!(signature_id = %sig.id, error = %e, "failed to fetch correlated logs, continuing without them");
                    Vec::new()
                }
            }
        };

        let historical_context = self
            .store
            .get_similar(sig, self.similar_signatures_limit)
            .await
            .unwrap_or_else(|e| {
                warn!(signature_id = %sig.id, error = %e, "failed to fetch similar signatures, continuing without them");
                Vec::new()
            });

        let context = InvestigationContext {
            signature: sig.clone(),
            recent_events,
            traces,
            logs,
            codebase_path: self.codebase_path.clone(),
            historical_context,
        };

        sig.transition_to_investigating();
        self.store.update(sig).await?;

        info!(signature_id = %sig.id, fingerprint = %sig.fingerprint, "investigation started");

        let diagnosis_result = self.diagnosis.diagnose(&context).await;

        let diagnosis = match diagnosis_result {
            Ok(d) => d,
            Err(e) => {
                error!(signature_id = %sig.id, error = %e, "diagnosis failed, reverting to new");
                sig.revert_to_new();
                if let Err(persist_err) = self.store.update(sig).await {
                    error!(signature_id = %sig.id, error = %persist_err, "failed to persist reverted status");
                }
                return Err(e);
            }
        };

        sig.attach_diagnosis(diagnosis.clone());
        self.store.update(sig).await?;

        info!(
            signature_id = %sig.id,
            confidence = ?diagnosis.confidence,
            cost_usd = diagnosis.cost_usd,
            "investigation produced diagnosis"
        );

        if self.triage.should_notify(sig, &diagnosis, None) {
            if let Err(e) = self.notification.report(sig, &diagnosis).await {
                warn!(signature_id = %sig.id, error = %e, "notification failed, diagnosis retained");
            }
        }

        Ok(diagnosis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Confidence, SignatureStatus};
    use crate::fakes::{MemorySignatureStore, MemoryTelemetry, MockDiagnosisEngine, RecordingNotifier};
    use chrono::Utc;

    fn sig() -> Signature {
        Signature::new("fp", "sh", "TimeoutError", "api", "timeout after *", Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn successful_investigation_attaches_diagnosis_and_notifies_on_high_confidence() {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        let diagnosis = Arc::new(MockDiagnosisEngine::always_succeeds(Confidence::High));
        let notification = Arc::new(RecordingNotifier::default());

        let investigator = Investigator::new(
            telemetry,
            store.clone(),
            diagnosis,
            notification.clone(),
            TriageEngine::default(),
            None,
        );

        let mut signature = sig();
        store.save(&signature).await.unwrap();

        let result = investigator.investigate(&mut signature).await;
        assert!(result.is_ok());
        assert_eq!(signature.status, SignatureStatus::Diagnosed);
        assert!(signature.diagnosis.is_some());
        assert_eq!(notification.reports_sent(), 1);
    }

    #[tokio::test]
    async fn failed_diagnosis_reverts_to_new_and_propagates_error() {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let store = Arc::new(MemorySignatureStore::default());
        let diagnosis = Arc::new(MockDiagnosisEngine::always_fails());
        let notification = Arc::new(RecordingNotifier::default());

        let investigator = Investigator::new(
            telemetry,
            store.clone(),
            diagnosis,
            notification,
            TriageEngine::default(),
            None,
        );

        let mut signature = sig();
        store.save(&signature).await.unwrap();

        let result = investigator.investigate(&mut signature).await;
        assert!(result.is_err());
        assert_eq!(signature.status, SignatureStatus::New);
        assert!(signature.diagnosis.is_none());

        let persisted = store.get_by_id(signature.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, SignatureStatus::New);
    }
}
