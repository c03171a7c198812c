pub mod billing;
pub mod domain;
pub mod insights;
pub mod ports;
pub mod service;

pub use billing::{active_contract_count, latest_open_contract, reconcile, reconcile_at};
pub use domain::{
    CefrLevel, CefrProfile, Contract, ContractMode, Lesson, Settings, Student, Tracking,
};
pub use insights::{billing_summary, compute_events, compute_stats, BillingSummary, Stats};
pub use ports::{OriginCatalog, PortError, PortResult, PreferenceStore, StudentRepository};
pub use service::{DeskError, DeskResult, StudentDesk, StudentOverview};
