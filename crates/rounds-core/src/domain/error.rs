//! Domain-level error taxonomy.
//!
//! Mirrors the error kinds described by the port contracts: not-found,
//! validation, backend-transport, timeout, parse, budget-exceeded. Adapters
//! (telemetry/store/diagnosis/notification) surface their own failures
//! through `#[from]` conversions into this enum at the core boundary.

/// Errors raised by core domain operations and propagated from ports.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("failed to parse downstream response: {0}")]
    Parse(String),

    #[error("diagnosis cost estimate {estimate:.2} exceeds per-call budget {limit:.2}")]
    BudgetExceeded { estimate: f64, limit: f64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core domain operations.
pub type Result<T> = std::result::Result<T, DiagnosticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_identifier() {
        let err = DiagnosticError::NotFound("signature abc123".to_string());
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn budget_exceeded_displays_both_amounts() {
        let err = DiagnosticError::BudgetExceeded {
            estimate: 1.50,
            limit: 1.00,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.50"));
        assert!(msg.contains("1.00"));
    }
}
