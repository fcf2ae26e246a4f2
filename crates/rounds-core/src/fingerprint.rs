//! Deterministic normalization and hashing of error events into stable
//! signature identities.
//!
//! `Fingerprinter` is total and stateless: every method is a pure function
//! of its input, and the regex substitution order in `templatize_message`
//! is part of the contract — changing it changes fingerprints for every
//! signature already on disk.

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::domain::{ErrorEvent, StackFrame};

/// Stateless engine turning raw error events into stable fingerprints.
///
/// Regexes are compiled once at construction and reused for every call.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    ipv4: Regex,
    port_suffix: Regex,
    numeric_run: Regex,
    iso_date: Regex,
    clock_time: Regex,
    uuid: Regex,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            ipv4: Regex::new(r"\d{1,3}(\.\d{1,3}){3}").unwrap(),
            port_suffix: Regex::new(r":\d+").unwrap(),
            numeric_run: Regex::new(r"\d{3,}").unwrap(),
            iso_date: Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap(),
            clock_time: Regex::new(r"\d{2}:\d{2}:\d{2}").unwrap(),
            uuid: Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
                .unwrap(),
        }
    }

    /// Replaces identity-bearing but non-discriminating substrings (IPs,
    /// ports, numeric runs, dates, clock times, UUIDs) with `*`, in the
    /// fixed order the contract requires.
    pub fn templatize_message(&self, message: &str) -> String {
        let s = self.ipv4.replace_all(message, "*");
        let s = self.port_suffix.replace_all(&s, ":*");
        let s = self.numeric_run.replace_all(&s, "*");
        let s = self.iso_date.replace_all(&s, "*");
        let s = self.clock_time.replace_all(&s, "*");
        let s = self.uuid.replace_all(&s, "*");
        s.into_owned()
    }

    /// Reproduces the stack with `lineno` dropped, order preserved.
    pub fn normalize_stack(&self, stack: &[StackFrame]) -> Vec<StackFrame> {
        stack
            .iter()
            .map(|f| StackFrame::new(f.module.clone(), f.function.clone(), f.filename.clone(), None))
            .collect()
    }

    /// SHA-256 of `module::function` pairs joined by `|`, first 16 hex chars.
    pub fn hash_stack(&self, stack: &[StackFrame]) -> String {
        let joined = stack
            .iter()
            .map(|f| format!("{}::{}", f.module, f.function))
            .collect::<Vec<_>>()
            .join("|");
        let digest = Sha256::digest(joined.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    /// Full 64-hex-char fingerprint: SHA-256 of
    /// `error_type | service | templated_message | stack_hash`.
    pub fn fingerprint(&self, event: &ErrorEvent) -> String {
        let templated = self.templatize_message(&event.error_message);
        let stack_hash = self.hash_stack(&event.stack);
        let payload = format!(
            "{} | {} | {} | {}",
            event.error_type, event.service, templated, stack_hash
        );
        hex::encode(Sha256::digest(payload.as_bytes()))
    }
}
