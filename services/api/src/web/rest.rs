//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::records::{LessonRecord, SettingsRecord, StudentRecord};
use crate::web::protocol::*;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use std::sync::Arc;
use tutor_desk_core::insights::{billing_summary, compute_events, compute_stats};
use tutor_desk_core::domain::Student;
use utoipa::OpenApi;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_students_handler,
        create_student_handler,
        import_students_handler,
        get_student_handler,
        update_student_handler,
        delete_student_handler,
        add_lesson_handler,
        update_lesson_handler,
        delete_lesson_handler,
        add_contract_handler,
        update_contract_handler,
        delete_contract_handler,
        billing_summary_handler,
        dashboard_handler,
        clear_history_handler,
        history_handler,
        get_settings_handler,
        update_settings_handler,
        list_origins_handler,
        add_origin_handler,
    ),
    components(
        schemas(
            StudentRecord,
            LessonRecord,
            StudentListItem,
            CreateStudentRequest,
            StudentPatchRequest,
            NewLessonRequest,
            LessonPatchRequest,
            NewContractRequest,
            ContractPatchRequest,
            BillingSummaryResponse,
            DashboardResponse,
            DeletedResponse,
            ImportResponse,
            HistoryClearedResponse,
            HistoryResponse,
            SettingsRecord,
            SettingsRequest,
            OriginRequest,
            ErrorBody,
        )
    ),
    tags(
        (name = "Tutor Desk API", description = "Students, lessons and lesson-pack billing for private tutors.")
    )
)]
pub struct ApiDoc;

fn student_body(student: Student) -> Json<StudentRecord> {
    Json(StudentRecord::from_domain(student))
}

//=========================================================================================
// Health
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

//=========================================================================================
// Students
//=========================================================================================

/// List every student with the number of contracts still running.
#[utoipa::path(
    get,
    path = "/students",
    responses((status = 200, description = "Students sorted by name", body = Vec<StudentListItem>))
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StudentListItem>>> {
    let students = state.desk.list_students().await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/students",
    request_body = CreateStudentRequest,
    responses((status = 201, description = "Student created", body = StudentRecord))
)]
pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStudentRequest>,
) -> ApiResult<impl IntoResponse> {
    let student = state.desk.create_student(req.into_input()).await?;
    Ok((StatusCode::CREATED, student_body(student)))
}

/// Bulk creation from already-parsed rows. Rows without any name are skipped.
#[utoipa::path(
    post,
    path = "/students/import",
    request_body = Vec<CreateStudentRequest>,
    responses((status = 200, description = "Number of students created", body = ImportResponse))
)]
pub async fn import_students_handler(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<CreateStudentRequest>>,
) -> ApiResult<Json<ImportResponse>> {
    let rows = rows.into_iter().map(CreateStudentRequest::into_input).collect();
    let count = state.desk.import_students(rows).await?;
    Ok(Json(ImportResponse { count }))
}

/// Fetch one student with billing recomputed, lessons newest first.
#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student id")),
    responses(
        (status = 200, description = "The student", body = StudentRecord),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn get_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StudentRecord>> {
    Ok(student_body(state.desk.get_student(id).await?))
}

#[utoipa::path(
    patch,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student id")),
    request_body = StudentPatchRequest,
    responses(
        (status = 200, description = "Updated student", body = StudentRecord),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn update_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StudentPatchRequest>,
) -> ApiResult<Json<StudentRecord>> {
    Ok(student_body(state.desk.update_student(id, req.into_patch()).await?))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    params(("id" = Uuid, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student removed", body = DeletedResponse),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn delete_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = state.desk.delete_student(id).await?;
    Ok(Json(DeletedResponse { id }))
}

//=========================================================================================
// Lessons
//=========================================================================================

/// Record a lesson. Without `billingId` it is billed to the newest open contract.
#[utoipa::path(
    post,
    path = "/students/{id}/lessons",
    params(("id" = Uuid, Path, description = "Student id")),
    request_body = NewLessonRequest,
    responses(
        (status = 201, description = "Student with the new lesson", body = StudentRecord),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn add_lesson_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewLessonRequest>,
) -> ApiResult<impl IntoResponse> {
    let student = state.desk.add_lesson(id, req.into()).await?;
    Ok((StatusCode::CREATED, student_body(student)))
}

#[utoipa::path(
    patch,
    path = "/students/{id}/lessons/{lesson_id}",
    params(
        ("id" = Uuid, Path, description = "Student id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    request_body = LessonPatchRequest,
    responses(
        (status = 200, description = "Updated lesson", body = LessonRecord),
        (status = 404, description = "Unknown student or lesson", body = ErrorBody)
    )
)]
pub async fn update_lesson_handler(
    State(state): State<Arc<AppState>>,
    Path((id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<LessonPatchRequest>,
) -> ApiResult<Json<LessonRecord>> {
    let lesson = state.desk.update_lesson(id, lesson_id, req.into()).await?;
    Ok(Json(LessonRecord::from_domain(lesson)))
}

#[utoipa::path(
    delete,
    path = "/students/{id}/lessons/{lesson_id}",
    params(
        ("id" = Uuid, Path, description = "Student id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Lesson removed", body = DeletedResponse),
        (status = 404, description = "Unknown student or lesson", body = ErrorBody)
    )
)]
pub async fn delete_lesson_handler(
    State(state): State<Arc<AppState>>,
    Path((id, lesson_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = state.desk.delete_lesson(id, lesson_id).await?;
    Ok(Json(DeletedResponse { id }))
}

//=========================================================================================
// Contracts
//=========================================================================================

#[utoipa::path(
    post,
    path = "/students/{id}/contracts",
    params(("id" = Uuid, Path, description = "Student id")),
    request_body = NewContractRequest,
    responses(
        (status = 201, description = "Student with the new contract", body = StudentRecord),
        (status = 400, description = "Invalid contract", body = ErrorBody),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn add_contract_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewContractRequest>,
) -> ApiResult<impl IntoResponse> {
    let student = state.desk.add_contract(id, req.into()).await?;
    Ok((StatusCode::CREATED, student_body(student)))
}

#[utoipa::path(
    patch,
    path = "/students/{id}/contracts/{contract_id}",
    params(
        ("id" = Uuid, Path, description = "Student id"),
        ("contract_id" = Uuid, Path, description = "Contract id")
    ),
    request_body = ContractPatchRequest,
    responses(
        (status = 200, description = "Student with the updated contract", body = StudentRecord),
        (status = 400, description = "Invalid contract", body = ErrorBody),
        (status = 404, description = "Unknown student or contract", body = ErrorBody)
    )
)]
pub async fn update_contract_handler(
    State(state): State<Arc<AppState>>,
    Path((id, contract_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ContractPatchRequest>,
) -> ApiResult<Json<StudentRecord>> {
    let student = state.desk.update_contract(id, contract_id, req.into()).await?;
    Ok(student_body(student))
}

/// Remove a contract. Lessons billed to it are kept.
#[utoipa::path(
    delete,
    path = "/students/{id}/contracts/{contract_id}",
    params(
        ("id" = Uuid, Path, description = "Student id"),
        ("contract_id" = Uuid, Path, description = "Contract id")
    ),
    responses(
        (status = 200, description = "Student without the contract", body = StudentRecord),
        (status = 404, description = "Unknown student or contract", body = ErrorBody)
    )
)]
pub async fn delete_contract_handler(
    State(state): State<Arc<AppState>>,
    Path((id, contract_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<StudentRecord>> {
    let student = state.desk.delete_contract(id, contract_id).await?;
    Ok(student_body(student))
}

#[utoipa::path(
    get,
    path = "/students/{id}/billing",
    params(("id" = Uuid, Path, description = "Student id")),
    responses(
        (status = 200, description = "Contract progress cards", body = BillingSummaryResponse),
        (status = 404, description = "Unknown student", body = ErrorBody)
    )
)]
pub async fn billing_summary_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BillingSummaryResponse>> {
    let student = state.desk.get_student(id).await?;
    Ok(Json(billing_summary(&student).into()))
}

//=========================================================================================
// Dashboard and History
//=========================================================================================

#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Totals and activity feed", body = DashboardResponse))
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DashboardResponse>> {
    let cleared_at = state.desk.history_cleared_at().await?;
    let students: Vec<Student> = state
        .desk
        .list_students()
        .await?
        .into_iter()
        .map(|overview| overview.student)
        .collect();

    Ok(Json(DashboardResponse {
        stats: compute_stats(&students).into(),
        events: compute_events(&students, cleared_at)
            .into_iter()
            .map(Into::into)
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/history/clear",
    responses((status = 200, description = "Update stamps cleared", body = HistoryClearedResponse))
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<HistoryClearedResponse>> {
    let cleared_at = state.desk.clear_history().await?;
    Ok(Json(HistoryClearedResponse { cleared_at }))
}

#[utoipa::path(
    get,
    path = "/history",
    responses((status = 200, description = "Last time the feed was cleared", body = HistoryResponse))
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<HistoryResponse>> {
    let cleared_at = state.desk.history_cleared_at().await?;
    Ok(Json(HistoryResponse { cleared_at }))
}

//=========================================================================================
// Settings
//=========================================================================================

#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Desk settings, defaults included", body = SettingsRecord))
)]
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SettingsRecord>> {
    let settings = state.desk.settings().await?;
    Ok(Json(SettingsRecord::from_domain(settings)))
}

/// Saves the given fields. New contracts take their lesson length and
/// currency from here when the request leaves them out.
#[utoipa::path(
    put,
    path = "/settings",
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings after the update", body = SettingsRecord),
        (status = 400, description = "Unusable value", body = ErrorBody)
    )
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<Json<SettingsRecord>> {
    let settings = state.desk.update_settings(req.into()).await?;
    Ok(Json(SettingsRecord::from_domain(settings)))
}

//=========================================================================================
// Origins
//=========================================================================================

#[utoipa::path(
    get,
    path = "/origins",
    responses((status = 200, description = "Known student origins", body = Vec<String>))
)]
pub async fn list_origins_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.origins.list_origins().await?))
}

#[utoipa::path(
    post,
    path = "/origins",
    request_body = OriginRequest,
    responses((status = 200, description = "Origins after the addition", body = Vec<String>))
)]
pub async fn add_origin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OriginRequest>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.origins.add_origin(&req.name).await?))
}
