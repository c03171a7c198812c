//! crates/tutor_desk_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of how student data is actually stored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Settings, Student};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the storage backend (file system, JSON).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Loads and stores whole student aggregates.
///
/// Every student is read and written as a unit: lessons and contracts are
/// embedded in the aggregate, never stored on their own.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn list(&self) -> PortResult<Vec<Student>>;

    /// Returns `PortError::NotFound` when no student has this id.
    async fn load(&self, id: Uuid) -> PortResult<Student>;

    async fn insert(&self, student: Student) -> PortResult<()>;

    async fn insert_many(&self, students: Vec<Student>) -> PortResult<()>;

    /// Replaces the stored aggregate with the same id.
    /// Returns `PortError::NotFound` when no student has this id.
    async fn save(&self, student: Student) -> PortResult<()>;

    async fn delete(&self, id: Uuid) -> PortResult<()>;
}

/// The list of places students come from (school, platform, referral...).
#[async_trait]
pub trait OriginCatalog: Send + Sync {
    async fn list_origins(&self) -> PortResult<Vec<String>>;

    /// Adds a trimmed origin unless it is blank or already known.
    /// Always returns the full list.
    async fn add_origin(&self, name: &str) -> PortResult<Vec<String>>;
}

/// Desk-wide state that does not belong to any student.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored settings, or the defaults when none were ever saved.
    async fn settings(&self) -> PortResult<Settings>;

    async fn save_settings(&self, settings: Settings) -> PortResult<()>;

    /// When the activity feed was last cleared, if ever.
    async fn history_cleared_at(&self) -> PortResult<Option<DateTime<Utc>>>;

    async fn set_history_cleared_at(&self, at: DateTime<Utc>) -> PortResult<()>;
}
