//! Pure decision logic: which signatures warrant investigation, which
//! diagnoses warrant notification, and in what order pending signatures
//! should be visited.
//!
//! Every method here is total — no I/O, no fallible paths. The point values
//! in `calculate_priority` and the branch order in `should_investigate`/
//! `should_notify` are a contract: changing them changes which signatures
//! get investigated or notified first, which downstream tests assert on
//! directly.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Confidence, Diagnosis, Signature, SignatureStatus};

/// Tunable thresholds for `TriageEngine`.
#[derive(Debug, Clone, Copy)]
pub struct TriageConfig {
    pub min_occurrence_for_investigation: u64,
    pub investigation_cooldown_hours: i64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            min_occurrence_for_investigation: 3,
            investigation_cooldown_hours: 24,
        }
    }
}

/// Pure decision engine over `Signature`/`Diagnosis` pairs.
#[derive(Debug, Clone, Default)]
pub struct TriageEngine {
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    /// Whether `sig` currently qualifies for investigation.
    pub fn should_investigate(&self, sig: &Signature) -> bool {
        self.should_investigate_at(sig, Utc::now())
    }

    /// `should_investigate` parameterized on "now", for deterministic tests.
    pub fn should_investigate_at(&self, sig: &Signature, now: DateTime<Utc>) -> bool {
        if matches!(
            sig.status,
            SignatureStatus::Resolved | SignatureStatus::Muted
        ) {
            return false;
        }
        if let Some(diagnosis) = &sig.diagnosis {
            let cooldown = Duration::hours(self.config.investigation_cooldown_hours);
            if now - diagnosis.diagnosed_at < cooldown {
                return false;
            }
        }
        if sig.occurrence_count < self.config.min_occurrence_for_investigation {
            return false;
        }
        true
    }

    /// Whether a freshly-produced `diagnosis` for `sig` should be notified.
    /// `original_status` is the signature's status *before* the
    /// investigation started (falls back to the current status when absent,
    /// e.g. for on-demand re-investigation where no prior status was
    /// captured).
    pub fn should_notify(
        &self,
        sig: &Signature,
        diagnosis: &Diagnosis,
        original_status: Option<SignatureStatus>,
    ) -> bool {
        if diagnosis.confidence == Confidence::High {
            return true;
        }
        let effective_original = original_status.unwrap_or(sig.status);
        if effective_original == SignatureStatus::New && diagnosis.confidence == Confidence::Medium
        {
            return true;
        }
        if sig.is_critical() {
            return true;
        }
        false
    }

    /// Higher means "investigate sooner". Signed — flaky-test penalties can
    /// drive a signature's priority negative and that is by design, not a
    /// bug to clamp away.
    pub fn calculate_priority(&self, sig: &Signature) -> i64 {
        self.calculate_priority_at(sig, Utc::now())
    }

    pub fn calculate_priority_at(&self, sig: &Signature, now: DateTime<Utc>) -> i64 {
        let mut priority: i64 = sig.occurrence_count.min(100) as i64;

        let age = now - sig.last_seen;
        priority += if age < Duration::hours(1) {
            50
        } else if age < Duration::hours(24) {
            25
        } else {
            0
        };

        if sig.status == SignatureStatus::New {
            priority += 50;
        }

        if sig.is_critical() {
            priority += 100;
        }
        if sig.is_flaky_test() {
            priority -= 20;
        }

        priority
    }

    /// Sorts `signatures` by `calculate_priority` descending, highest first.
    pub fn sort_by_priority(&self, signatures: &mut [Signature]) {
        let now = Utc::now();
        signatures.sort_by(|a, b| {
            self.calculate_priority_at(b, now)
                .cmp(&self.calculate_priority_at(a, now))
        });
    }
}
