//! Schema definition for the `signatures` table.
//!
//! Single collection keyed by `id`, with a unique secondary index on
//! `fingerprint` and secondary indexes on `status`, `service`, and
//! `(last_seen DESC)`. Diagnosis is stored as a nested document; tags as
//! an array of strings. Schema initialization is idempotent — `DEFINE ...
//! IF NOT EXISTS` lets `init_schema` run safely on every connection.
pub const SIGNATURES_SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS signatures SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_signature_fingerprint ON signatures FIELDS fingerprint UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_signature_status ON signatures FIELDS status;
    DEFINE INDEX IF NOT EXISTS idx_signature_service ON signatures FIELDS service;
    DEFINE INDEX IF NOT EXISTS idx_signature_last_seen ON signatures FIELDS last_seen;
"#;
