//! Cycle-loop scheduler: drives `PollPort` on a fixed cadence, enforcing
//! the daily diagnosis budget and containing any single cycle's errors so
//! the loop itself never dies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rounds_core::PollPort;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::budget::BudgetLedger;

pub struct Scheduler {
    poll: Arc<dyn PollPort>,
    budget: Arc<BudgetLedger>,
    poll_interval: Duration,
    cycle_number: AtomicU64,
}

impl Scheduler {
    pub fn new(poll: Arc<dyn PollPort>, budget: Arc<BudgetLedger>, poll_interval_seconds: u64) -> Self {
        Scheduler {
            poll,
            budget,
            poll_interval: Duration::from_secs(poll_interval_seconds),
            cycle_number: AtomicU64::new(0),
        }
    }

    /// Runs the cycle loop until `shutdown` is signalled. Each iteration
    /// runs a poll cycle, then (budget permitting) an investigation cycle,
    /// then sleeps for `poll_interval`, all interruptible by shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let cycle = self.cycle_number.fetch_add(1, Ordering::SeqCst) + 1;
            info!(cycle, "starting poll cycle");

            match self.poll.execute_poll_cycle().await {
                Ok(result) => info!(
                    cycle,
                    errors_found = result.errors_found,
                    new_signatures = result.new_signatures,
                    updated_signatures = result.updated_signatures,
                    investigations_queued = result.investigations_queued,
                    "poll cycle complete"
                ),
                Err(e) => warn!(cycle, error = %e, "poll cycle failed"),
            }

            if self.budget.budget_exceeded() {
                warn!(cycle, "daily diagnosis budget exceeded, skipping investigation cycle");
            } else {
                match self.poll.execute_investigation_cycle().await {
                    Ok(result) => {
                        for diagnosis in &result.diagnoses_produced {
                            self.budget.record_diagnosis_cost(diagnosis.cost_usd);
                        }
                        info!(
                            cycle,
                            attempted = result.investigations_attempted,
                            failed = result.investigations_failed,
                            diagnosed = result.diagnoses_produced.len(),
                            "investigation cycle complete"
                        );
                    }
                    Err(e) => warn!(cycle, error = %e, "investigation cycle failed"),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped");
    }
}
