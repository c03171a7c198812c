//! Billing progress: which lesson consumed which contract slot, and how far
//! along each contract is.

mod engine;
mod lookup;

#[cfg(test)]
mod tests;

pub use engine::{reconcile, reconcile_at};
pub use lookup::{active_contract_count, latest_open_contract};
