//! Reconciliation of a student's lessons against their billing contracts.
//!
//! Lessons are walked in chronological order. Each linked lesson takes a paid
//! slot while any remain, then a free slot. Lessons beyond a contract's
//! capacity are counted as paid. Contract counters and completion state are
//! rebuilt from scratch on every pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Contract, ContractMode, Student};

/// Slot usage for one contract during a reconciliation pass.
#[derive(Debug, Clone, Copy)]
struct SlotCounter {
    paid_total: u32,
    free_total: u32,
    paid_consumed: u32,
    free_consumed: u32,
}

impl SlotCounter {
    fn for_contract(contract: &Contract) -> Self {
        Self {
            paid_total: contract.effective_paid_slots(),
            free_total: contract.effective_free_slots(),
            paid_consumed: 0,
            free_consumed: 0,
        }
    }

    /// Takes the next slot and returns whether it was a free one.
    fn consume(&mut self) -> bool {
        if self.paid_consumed < self.paid_total {
            self.paid_consumed += 1;
            false
        } else if self.free_consumed < self.free_total {
            self.free_consumed += 1;
            true
        } else {
            // Over capacity: counted as paid.
            self.paid_consumed += 1;
            false
        }
    }
}

/// Recomputes billing state using the current wall-clock time.
pub fn reconcile(student: Student) -> Student {
    reconcile_at(student, Utc::now())
}

/// Recomputes every linked lesson's `is_free` flag and every contract's
/// counters, `completed`, `completed_at` and `updated_at`, stamping with `now`.
///
/// Lessons come back sorted by `created_at`, earliest first. Lessons without a
/// `billing_id`, or pointing at a contract the student does not have, are left
/// untouched.
pub fn reconcile_at(mut student: Student, now: DateTime<Utc>) -> Student {
    for contract in &mut student.billing_history {
        normalize(contract);
    }

    // Stable: lessons sharing a timestamp keep their relative order.
    student.lessons.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut counters: HashMap<Uuid, SlotCounter> = student
        .billing_history
        .iter()
        .map(|c| (c.id, SlotCounter::for_contract(c)))
        .collect();
    let mut linked: HashMap<Uuid, u32> = HashMap::new();

    for lesson in &mut student.lessons {
        let Some(billing_id) = lesson.billing_id else {
            continue;
        };
        *linked.entry(billing_id).or_default() += 1;
        if let Some(counter) = counters.get_mut(&billing_id) {
            lesson.is_free = counter.consume();
        }
    }

    for contract in &mut student.billing_history {
        let counter = counters.get(&contract.id).copied();
        let capacity = contract.capacity();
        let consumed = linked.get(&contract.id).copied().unwrap_or(0);

        contract.consumed_lessons = consumed;
        contract.paid_consumed = counter.map_or(0, |c| c.paid_consumed);
        contract.free_consumed = counter.map_or(0, |c| c.free_consumed);

        let completed = capacity > 0 && consumed >= capacity;
        contract.completed = completed;
        if !completed {
            contract.completed_at = None;
        } else if contract.completed_at.is_none() {
            contract.completed_at = Some(now);
        }
        contract.updated_at = Some(now);
    }

    debug!(
        student_id = %student.id,
        lessons = student.lessons.len(),
        contracts = student.billing_history.len(),
        "billing reconciled"
    );

    student
}

/// Fills in defaults the stored contract may lack.
fn normalize(contract: &mut Contract) {
    match contract.mode {
        ContractMode::Package => {
            if contract.free_lessons.is_none() {
                contract.free_lessons = Some(0);
            }
        }
        ContractMode::Single => contract.free_lessons = Some(0),
    }
}
