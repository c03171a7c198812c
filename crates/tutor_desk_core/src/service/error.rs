//! Errors raised by the student desk service.

use thiserror::Error;
use uuid::Uuid;

use crate::ports::PortError;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    #[error("Lesson not found: {0}")]
    LessonNotFound(Uuid),

    #[error("Contract not found: {0}")]
    ContractNotFound(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

pub type DeskResult<T> = Result<T, DeskError>;
