//! Human-initiated lifecycle operations on signatures: mute, resolve,
//! retriage, on-demand re-investigation, and read-only inspection.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{Diagnosis, DiagnosticError, MAX_RECENT_EVENTS, Signature, SignatureStatus};
use crate::investigator::Investigator;
use crate::ports::{ManagementPort, SignatureDetails, SignatureStorePort, TelemetryPort};

type Result<T> = std::result::Result<T, DiagnosticError>;

/// Drives mute/resolve/retriage/reinvestigate/details/list over a signature
/// store, delegating the heavier on-demand investigation to `Investigator`.
pub struct ManagementService {
    store: Arc<dyn SignatureStorePort>,
    telemetry: Arc<dyn TelemetryPort>,
    investigator: Investigator,
}

impl ManagementService {
    pub fn new(
        store: Arc<dyn SignatureStorePort>,
        telemetry: Arc<dyn TelemetryPort>,
        investigator: Investigator,
    ) -> Self {
        Self {
            store,
            telemetry,
            investigator,
        }
    }

    async fn require(&self, id: Uuid) -> Result<Signature> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| DiagnosticError::NotFound(format!("signature {id}")))
    }
}

#[async_trait::async_trait]
impl ManagementPort for ManagementService {
    async fn mute(&self, id: Uuid, reason: Option<String>) -> Result<Signature> {
        let mut sig = self.require(id).await?;
        let old_status = sig.status;
        sig.mute();
        self.store.update(&sig).await?;
        info!(
            signature_id = %id,
            fingerprint = %sig.fingerprint,
            old_status = ?old_status,
            new_status = ?sig.status,
            reason = reason.as_deref().unwrap_or(""),
            "signature muted"
        );
        Ok(sig)
    }

    async fn resolve(&self, id: Uuid, fix: Option<String>) -> Result<Signature> {
        let mut sig = self.require(id).await?;
        let old_status = sig.status;
        sig.resolve();
        self.store.update(&sig).await?;
        info!(
            signature_id = %id,
            fingerprint = %sig.fingerprint,
            old_status = ?old_status,
            new_status = ?sig.status,
            fix = fix.as_deref().unwrap_or(""),
            "signature resolved"
        );
        Ok(sig)
    }

    async fn retriage(&self, id: Uuid) -> Result<Signature> {
        let mut sig = self.require(id).await?;
        let old_status = sig.status;
        sig.retriage();
        self.store.update(&sig).await?;
        info!(
            signature_id = %id,
            fingerprint = %sig.fingerprint,
            old_status = ?old_status,
            new_status = ?sig.status,
            "signature retriaged"
        );
        Ok(sig)
    }

    /// Clears any existing diagnosis, reopens the signature, then runs an
    /// investigation inline using empty historical trace/log data fetched
    /// fresh by the investigator — favoring turnaround speed for an
    /// operator-triggered retry over richer but slower context assembly.
    async fn reinvestigate(&self, id: Uuid) -> Result<Diagnosis> {
        let mut sig = self.require(id).await?;
        let old_status = sig.status;
        sig.retriage();
        self.store.update(&sig).await?;
        info!(
            signature_id = %id,
            fingerprint = %sig.fingerprint,
            old_status = ?old_status,
            "signature reinvestigation started"
        );
        self.investigator.investigate(&mut sig).await
    }

    async fn get_signature_details(&self, id: Uuid) -> Result<SignatureDetails> {
        let sig = self.require(id).await?;
        let recent_events = self
            .telemetry
            .get_events_for_signature(&sig.fingerprint, MAX_RECENT_EVENTS)
            .await
            .unwrap_or_default();
        let related_signatures = self.store.get_similar(&sig, 5).await.unwrap_or_default();
        let diagnosis = sig.diagnosis.clone();
        Ok(SignatureDetails {
            signature: sig,
            recent_events,
            related_signatures,
            diagnosis,
        })
    }

    async fn list_signatures(&self, status: Option<SignatureStatus>) -> Result<Vec<Signature>> {
        self.store.list_all(status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;
    use crate::fakes::{MemorySignatureStore, MemoryTelemetry, MockDiagnosisEngine, RecordingNotifier};
    use crate::triage::TriageEngine;
    use chrono::Utc;

    fn build_service(
        store: Arc<MemorySignatureStore>,
        diagnosis: Arc<MockDiagnosisEngine>,
    ) -> ManagementService {
        let telemetry = Arc::new(MemoryTelemetry::default());
        let investigator = Investigator::new(
            telemetry.clone(),
            store.clone(),
            diagnosis,
            Arc::new(RecordingNotifier::default()),
            TriageEngine::default(),
            None,
        );
        ManagementService::new(store, telemetry, investigator)
    }

    #[tokio::test]
    async fn mute_transitions_status_and_persists() {
        let store = Arc::new(MemorySignatureStore::default());
        let sig = Signature::new("fp", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        store.save(&sig).await.unwrap();

        let service = build_service(store.clone(), Arc::new(MockDiagnosisEngine::always_fails()));
        let updated = service.mute(sig.id, Some("known issue".into())).await.unwrap();
        assert_eq!(updated.status, SignatureStatus::Muted);

        let persisted = store.get_by_id(sig.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, SignatureStatus::Muted);
    }

    #[tokio::test]
    async fn mute_unknown_id_returns_not_found() {
        let store = Arc::new(MemorySignatureStore::default());
        let service = build_service(store, Arc::new(MockDiagnosisEngine::always_fails()));
        let result = service.mute(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(DiagnosticError::NotFound(_))));
    }

    #[tokio::test]
    async fn retriage_clears_diagnosis_and_reopens() {
        let store = Arc::new(MemorySignatureStore::default());
        let mut sig = Signature::new("fp", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        sig.attach_diagnosis(
            Diagnosis::new("r", vec!["e".into()], "f", Confidence::High, Utc::now(), "m", 0.0)
                .unwrap(),
        );
        store.save(&sig).await.unwrap();

        let service = build_service(store.clone(), Arc::new(MockDiagnosisEngine::always_fails()));
        let updated = service.retriage(sig.id).await.unwrap();
        assert_eq!(updated.status, SignatureStatus::New);
        assert!(updated.diagnosis.is_none());
    }

    #[tokio::test]
    async fn list_signatures_filters_by_status_across_full_lifecycle() {
        let store = Arc::new(MemorySignatureStore::default());
        let new_sig = Signature::new("fp1", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        let mut muted_sig = Signature::new("fp2", "sh", "E", "svc", "msg", Utc::now()).unwrap();
        muted_sig.mute();
        store.save(&new_sig).await.unwrap();
        store.save(&muted_sig).await.unwrap();

        let service = build_service(store, Arc::new(MockDiagnosisEngine::always_fails()));
        let muted = service
            .list_signatures(Some(SignatureStatus::Muted))
            .await
            .unwrap();
        assert_eq!(muted.len(), 1);
        assert_eq!(muted[0].id, muted_sig.id);

        let all = service.list_signatures(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
