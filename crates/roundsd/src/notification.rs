//! Prints diagnosis reports and periodic summaries to stdout.
//!
//! The only notification sink shipped with this repo; richer sinks
//! (chat, issue trackers) are adapter-shaped extension points behind the
//! same `NotificationPort`.

use async_trait::async_trait;
use rounds_core::{Diagnosis, NotificationPort, Result, Signature, StoreStats};

pub struct StdoutNotifier;

#[async_trait]
impl NotificationPort for StdoutNotifier {
    async fn report(&self, sig: &Signature, diagnosis: &Diagnosis) -> Result<()> {
        println!("{}", "=".repeat(80));
        println!("DIAGNOSIS REPORT");
        println!("{}", "=".repeat(80));
        println!("Error Type: {}", sig.error_type);
        println!("Service: {}", sig.service);
        println!("Status: {:?}", sig.status);
        println!();
        println!("{}", "-".repeat(80));
        println!("FAILURE PATTERN");
        println!("{}", "-".repeat(80));
        println!("Fingerprint: {}", sig.fingerprint);
        println!("Message Template: {}", sig.message_template);
        println!("Occurrences: {}  First seen: {}  Last seen: {}", sig.occurrence_count, sig.first_seen, sig.last_seen);
        if !sig.tags.is_empty() {
            println!("Tags: {}", sig.tags.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        println!();
        println!("{}", "-".repeat(80));
        println!("ANALYSIS");
        println!("{}", "-".repeat(80));
        println!("Model: {}  Confidence: {:?}  Cost: ${:.2}", diagnosis.model, diagnosis.confidence, diagnosis.cost_usd);
        println!();
        println!("ROOT CAUSE:\n{}", diagnosis.root_cause);
        println!();
        println!("EVIDENCE:");
        for (i, item) in diagnosis.evidence.iter().enumerate() {
            println!("  {}. {}", i + 1, item);
        }
        println!();
        println!("SUGGESTED FIX:\n{}", diagnosis.suggested_fix);
        println!("{}", "=".repeat(80));
        Ok(())
    }

    async fn report_summary(&self, stats: &StoreStats) -> Result<()> {
        println!("{}", "=".repeat(80));
        println!("SUMMARY REPORT");
        println!("{}", "=".repeat(80));
        println!("Total Signatures: {}", stats.total_signatures);
        if let Some(errors) = stats.total_errors_seen {
            println!("Total Errors Seen: {errors}");
        }
        if !stats.by_status.is_empty() {
            println!("\nBy Status:");
            for (status, count) in &stats.by_status {
                println!("  {status}: {count}");
            }
        }
        if !stats.by_service.is_empty() {
            println!("\nBy Service:");
            for (service, count) in &stats.by_service {
                println!("  {service}: {count}");
            }
        }
        println!("{}", "=".repeat(80));
        Ok(())
    }
}
