pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use rest::*;
use state::AppState;

/// Builds the REST router. Layers such as CORS are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/students",
            get(list_students_handler).post(create_student_handler),
        )
        .route("/students/import", post(import_students_handler))
        .route(
            "/students/{id}",
            get(get_student_handler)
                .patch(update_student_handler)
                .delete(delete_student_handler),
        )
        .route("/students/{id}/lessons", post(add_lesson_handler))
        .route(
            "/students/{id}/lessons/{lesson_id}",
            patch(update_lesson_handler).delete(delete_lesson_handler),
        )
        .route("/students/{id}/contracts", post(add_contract_handler))
        .route(
            "/students/{id}/contracts/{contract_id}",
            patch(update_contract_handler).delete(delete_contract_handler),
        )
        .route("/students/{id}/billing", get(billing_summary_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/history", get(history_handler))
        .route("/history/clear", post(clear_history_handler))
        .route(
            "/settings",
            get(get_settings_handler).put(update_settings_handler),
        )
        .route(
            "/origins",
            get(list_origins_handler).post(add_origin_handler),
        )
        .with_state(state)
}
