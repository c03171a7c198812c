//! Read-only queries over a student's contracts.

use crate::domain::{Contract, Student};

/// The most recently created contract that is not completed yet.
///
/// Contracts created at the same instant are ordered by id, the greater id
/// winning, so the answer never depends on storage order.
pub fn latest_open_contract(student: &Student) -> Option<&Contract> {
    student
        .billing_history
        .iter()
        .filter(|c| !c.completed)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// Number of contracts still running.
///
/// A contract counts as finished when its `completed` flag is set OR when
/// its stored counters already reach `total_lessons + free_lessons`, so a
/// stale flag does not keep a used-up contract in the active list.
pub fn active_contract_count(student: &Student) -> usize {
    student
        .billing_history
        .iter()
        .filter(|c| !is_finished(c))
        .count()
}

fn is_finished(contract: &Contract) -> bool {
    let total = contract
        .total_lessons
        .saturating_add(contract.free_lessons.unwrap_or(0));
    let done_by_count = total > 0 && contract.consumed_lessons >= total;
    contract.completed || done_by_count
}
