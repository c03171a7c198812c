//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use tutor_desk_core::ports::OriginCatalog;
use tutor_desk_core::service::StudentDesk;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<StudentDesk>,
    pub origins: Arc<dyn OriginCatalog>,
}
