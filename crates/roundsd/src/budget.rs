//! Daily diagnosis-spend ledger. The only process-wide mutable state in
//! the daemon; confined here and exposed through a single lock-guarded
//! mutator so concurrent `record_diagnosis_cost` calls sum exactly.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

struct LedgerState {
    budget_date: NaiveDate,
    daily_cost_usd: f64,
}

pub struct BudgetLedger {
    limit: Option<f64>,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    pub fn new(limit: Option<f64>) -> Self {
        BudgetLedger {
            limit,
            state: Mutex::new(LedgerState {
                budget_date: Utc::now().date_naive(),
                daily_cost_usd: 0.0,
            }),
        }
    }

    /// Accumulates `cost` into today's total, rolling the ledger over to
    /// $0 first if the UTC calendar date has advanced since the last call.
    pub fn record_diagnosis_cost(&self, cost: f64) {
        let today = Utc::now().date_naive();
        let mut state = self.state.lock().unwrap();
        if state.budget_date != today {
            state.budget_date = today;
            state.daily_cost_usd = 0.0;
        }
        state.daily_cost_usd += cost;
    }

    pub fn budget_exceeded(&self) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };
        self.state.lock().unwrap().daily_cost_usd >= limit
    }

    #[cfg(test)]
    pub fn daily_cost_usd(&self) -> f64 {
        self.state.lock().unwrap().daily_cost_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_costs_within_one_date() {
        let ledger = BudgetLedger::new(Some(5.0));
        ledger.record_diagnosis_cost(3.0);
        ledger.record_diagnosis_cost(2.5);
        assert!((ledger.daily_cost_usd() - 5.5).abs() < 1e-9);
        assert!(ledger.budget_exceeded());
    }

    #[test]
    fn no_limit_never_exceeded() {
        let ledger = BudgetLedger::new(None);
        ledger.record_diagnosis_cost(1_000_000.0);
        assert!(!ledger.budget_exceeded());
    }

    #[test]
    fn under_limit_not_exceeded() {
        let ledger = BudgetLedger::new(Some(5.0));
        ledger.record_diagnosis_cost(1.0);
        assert!(!ledger.budget_exceeded());
    }

    #[test]
    fn concurrent_record_sums_exactly() {
        use std::sync::Arc;
        use std::thread;

        let ledger = Arc::new(BudgetLedger::new(Some(1000.0)));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.record_diagnosis_cost(0.01);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!((ledger.daily_cost_usd() - 10.0).abs() < 1e-6);
    }
}
