//! SurrealDB-backed implementation of `SignatureStorePort`.
//!
//! Connection setup mirrors the teacher's original persistence layer: an
//! in-process engine selected at construction, namespace/database
//! selection, then idempotent schema initialization before first use.

use async_trait::async_trait;
use rounds_core::{Result as CoreResult, Signature, SignatureStatus, SignatureStorePort, StoreStats};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::schema::SIGNATURES_SCHEMA;
use crate::Result;

/// SurrealDB connection handle for the signature store.
pub struct SurrealHandle {
    db: Surreal<Db>,
}

impl SurrealHandle {
    /// Connect to an in-memory SurrealDB instance and set up the schema.
    /// Schema setup double-checks under SurrealDB's own `IF NOT EXISTS`
    /// guards, so this is safe to call concurrently from multiple
    /// first-use call sites.
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("connecting to SurrealDB (in-memory)");

        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        db.use_ns("rounds")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("initializing signatures schema");
        self.db
            .query(SIGNATURES_SCHEMA)
            .await
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;
        Ok(())
    }
}

fn record_id(id: Uuid) -> (&'static str, String) {
    ("signatures", id.to_string())
}

#[async_trait]
impl SignatureStorePort for SurrealHandle {
    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> CoreResult<Option<Signature>> {
        let sig: Option<Signature> = self
            .db
            .select(record_id(id))
            .await
            .map_err(StoreError::from)?;
        Ok(sig)
    }

    #[instrument(skip(self))]
    async fn get_by_fingerprint(&self, fingerprint: &str) -> CoreResult<Option<Signature>> {
        let fp = fingerprint.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM signatures WHERE fingerprint = $fp LIMIT 1")
            .bind(("fp", fp))
            .await
            .map_err(StoreError::from)?;
        let signatures: Vec<Signature> = result.take(0).map_err(StoreError::from)?;
        Ok(signatures.into_iter().next())
    }

    #[instrument(skip(self, sig), fields(signature_id = %sig.id))]
    async fn save(&self, sig: &Signature) -> CoreResult<()> {
        let _created: Option<Signature> = self
            .db
            .create(record_id(sig.id))
            .content(sig.clone())
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    #[instrument(skip(self, sig), fields(signature_id = %sig.id))]
    async fn update(&self, sig: &Signature) -> CoreResult<()> {
        let _updated: Option<Signature> = self
            .db
            .update(record_id(sig.id))
            .content(sig.clone())
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pending_investigation(&self) -> CoreResult<Vec<Signature>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM signatures WHERE status = 'NEW' \
                 ORDER BY last_seen DESC, occurrence_count DESC",
            )
            .await
            .map_err(StoreError::from)?;
        let signatures: Vec<Signature> = result.take(0).map_err(StoreError::from)?;
        Ok(signatures)
    }

    #[instrument(skip(self))]
    async fn list_all(&self, status: Option<SignatureStatus>) -> CoreResult<Vec<Signature>> {
        let signatures: Vec<Signature> = match status {
            Some(status) => {
                let status_str = serde_json::to_value(status)
                    .map_err(StoreError::from)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let mut result = self
                    .db
                    .query("SELECT * FROM signatures WHERE status = $status")
                    .bind(("status", status_str))
                    .await
                    .map_err(StoreError::from)?;
                result.take(0).map_err(StoreError::from)?
            }
            None => {
                let mut result = self
                    .db
                    .query("SELECT * FROM signatures")
                    .await
                    .map_err(StoreError::from)?;
                result.take(0).map_err(StoreError::from)?
            }
        };
        Ok(signatures)
    }

    #[instrument(skip(self, sig), fields(signature_id = %sig.id))]
    async fn get_similar(&self, sig: &Signature, limit: usize) -> CoreResult<Vec<Signature>> {
        let service = sig.service.clone();
        let error_type = sig.error_type.clone();
        let self_id = sig.id.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM signatures WHERE service = $service AND error_type = $error_type \
                 AND id != $self_id LIMIT $limit",
            )
            .bind(("service", service))
            .bind(("error_type", error_type))
            .bind(("self_id", self_id))
            .bind(("limit", limit as i64))
            .await
            .map_err(StoreError::from)?;
        let signatures: Vec<Signature> = result.take(0).map_err(StoreError::from)?;
        Ok(signatures)
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> CoreResult<StoreStats> {
        let all = self.list_all(None).await?;
        let total_signatures = all.len() as u64;

        let mut by_status = std::collections::BTreeMap::new();
        let mut by_service = std::collections::BTreeMap::new();
        let mut total_occurrences = 0u64;
        let mut oldest: Option<chrono::DateTime<chrono::Utc>> = None;

        for sig in &all {
            *by_status.entry(format!("{:?}", sig.status)).or_insert(0u64) += 1;
            *by_service.entry(sig.service.clone()).or_insert(0u64) += 1;
            total_occurrences += sig.occurrence_count;
            oldest = Some(oldest.map_or(sig.first_seen, |o| o.min(sig.first_seen)));
        }

        let avg_occurrence_count = if total_signatures > 0 {
            Some(total_occurrences as f64 / total_signatures as f64)
        } else {
            None
        };
        let oldest_signature_age_hours = oldest
            .map(|o| (chrono::Utc::now() - o).num_seconds() as f64 / 3600.0);

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
