//! services/api/src/web/protocol.rs
//!
//! Request and response payloads of the REST API that are not plain records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tutor_desk_core::domain::{ContractMode, Tracking};
use tutor_desk_core::insights::{
    ActivityItem, ActivityKind, BillingSummary, ContractProgress, LastLesson, Stats, StudentRef,
};
use tutor_desk_core::service::{
    ContractPatch, LessonPatch, NewContract, NewLesson, NewStudent, SettingsPatch, StudentOverview,
    StudentPatch, TrackingPatch,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::records::{CefrRecord, ContractModeRecord, ContractRecord, LessonRecord, StudentRecord};

/// Tells "absent" (outer `None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

//=========================================================================================
// Students
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateStudentRequest {
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub email: String,
    pub is_active: Option<bool>,
    pub photo: Option<String>,
    pub origin: Option<String>,
    pub goals: Option<String>,
    pub progress: Option<u8>,
    pub cefr: CefrRecord,
    pub tags: Vec<String>,
}

impl CreateStudentRequest {
    pub fn into_input(self) -> NewStudent {
        NewStudent {
            first_name: self.first_name,
            last_name: self.last_name,
            description: self.description,
            email: self.email,
            is_active: self.is_active.unwrap_or(true),
            photo: self.photo,
            origin: self.origin,
            tracking: Tracking {
                goals: self.goals,
                progress: self.progress,
                cefr: self.cefr.to_domain(),
                tags: self.tags,
            },
        }
    }
}

/// Partial student update. Sending `lessons` or `billingHistory` replaces the
/// whole list and recomputes billing.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentPatchRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub photo: Option<Option<String>>,
    pub origin: Option<String>,
    /// `null` clears the goals.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub goals: Option<Option<String>>,
    /// `null` clears the progress.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<u8>)]
    pub progress: Option<Option<u8>>,
    pub cefr: Option<CefrRecord>,
    pub tags: Option<Vec<String>>,
    pub lessons: Option<Vec<LessonRecord>>,
    pub billing_history: Option<Vec<ContractRecord>>,
}

impl StudentPatchRequest {
    pub fn into_patch(self) -> StudentPatch {
        StudentPatch {
            first_name: self.first_name,
            last_name: self.last_name,
            description: self.description,
            email: self.email,
            is_active: self.is_active,
            photo: self.photo,
            origin: self.origin,
            tracking: TrackingPatch {
                goals: self.goals,
                progress: self.progress,
                cefr: self.cefr.map(CefrRecord::to_domain),
                tags: self.tags,
            },
            lessons: self
                .lessons
                .map(|ls| ls.into_iter().map(LessonRecord::to_domain).collect()),
            billing_history: self
                .billing_history
                .map(|cs| cs.into_iter().map(ContractRecord::to_domain).collect()),
        }
    }
}

/// A student row in the list view.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentListItem {
    #[serde(flatten)]
    pub student: StudentRecord,
    pub billing_active_count: usize,
}

impl From<StudentOverview> for StudentListItem {
    fn from(overview: StudentOverview) -> Self {
        Self {
            student: StudentRecord::from_domain(overview.student),
            billing_active_count: overview.active_contracts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryClearedResponse {
    pub cleared_at: DateTime<Utc>,
}

/// When the activity feed was last cleared; `null` if never.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub cleared_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OriginRequest {
    pub name: String,
}

//=========================================================================================
// Settings
//=========================================================================================

/// Partial settings update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsRequest {
    pub theme: Option<String>,
    pub lesson_duration: Option<u32>,
    pub currency: Option<String>,
    pub default_student_filter: Option<String>,
}

impl From<SettingsRequest> for SettingsPatch {
    fn from(req: SettingsRequest) -> Self {
        SettingsPatch {
            theme: req.theme,
            lesson_duration: req.lesson_duration,
            currency: req.currency,
            default_student_filter: req.default_student_filter,
        }
    }
}

//=========================================================================================
// Lessons
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NewLessonRequest {
    pub created_at: Option<DateTime<Utc>>,
    pub comment: String,
    pub homework: String,
    pub tags: Vec<String>,
    pub billing_id: Option<Uuid>,
}

impl From<NewLessonRequest> for NewLesson {
    fn from(req: NewLessonRequest) -> Self {
        NewLesson {
            created_at: req.created_at,
            comment: req.comment,
            homework: req.homework,
            tags: req.tags,
            billing_id: req.billing_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPatchRequest {
    pub created_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub homework: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `null` unlinks the lesson from its contract.
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub billing_id: Option<Option<Uuid>>,
}

impl From<LessonPatchRequest> for LessonPatch {
    fn from(req: LessonPatchRequest) -> Self {
        LessonPatch {
            created_at: req.created_at,
            comment: req.comment,
            homework: req.homework,
            tags: req.tags,
            billing_id: req.billing_id,
        }
    }
}

//=========================================================================================
// Contracts
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewContractRequest {
    #[serde(default)]
    pub display_name: String,
    pub mode: ContractModeRecord,
    #[serde(default = "one")]
    pub total_lessons: u32,
    #[serde(default)]
    pub free_lessons: u32,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub custom_duration: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub price_per_lesson: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn one() -> u32 {
    1
}

impl From<NewContractRequest> for NewContract {
    fn from(req: NewContractRequest) -> Self {
        NewContract {
            display_name: req.display_name,
            mode: req.mode.into(),
            total_lessons: req.total_lessons,
            free_lessons: req.free_lessons,
            duration_minutes: req.duration_minutes,
            custom_duration: req.custom_duration,
            price_per_lesson: req.price_per_lesson,
            currency: req.currency,
            paid: req.paid,
            notes: req.notes,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractPatchRequest {
    pub display_name: Option<String>,
    pub mode: Option<ContractModeRecord>,
    pub total_lessons: Option<u32>,
    pub free_lessons: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub custom_duration: Option<bool>,
    #[serde(deserialize_with = "double_option_decimal")]
    #[schema(value_type = Option<f64>)]
    pub price_per_lesson: Option<Option<Decimal>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub currency: Option<Option<String>>,
    pub paid: Option<bool>,
    pub notes: Option<String>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub end_date: Option<Option<NaiveDate>>,
}

/// Prices travel as JSON numbers.
fn double_option_decimal<'de, D>(deserializer: D) -> Result<Option<Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    rust_decimal::serde::float_option::deserialize(deserializer).map(Some)
}

impl From<ContractPatchRequest> for ContractPatch {
    fn from(req: ContractPatchRequest) -> Self {
        ContractPatch {
            display_name: req.display_name,
            mode: req.mode.map(ContractMode::from),
            total_lessons: req.total_lessons,
            free_lessons: req.free_lessons,
            duration_minutes: req.duration_minutes,
            custom_duration: req.custom_duration,
            price_per_lesson: req.price_per_lesson,
            currency: req.currency,
            paid: req.paid,
            notes: req.notes,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}

//=========================================================================================
// Dashboard and Billing Views
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentRefResponse {
    pub id: Uuid,
    pub full_name: String,
}

impl From<StudentRef> for StudentRefResponse {
    fn from(r: StudentRef) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastLessonResponse {
    pub student: StudentRefResponse,
    pub created_at: DateTime<Utc>,
}

impl From<LastLesson> for LastLessonResponse {
    fn from(last: LastLesson) -> Self {
        Self {
            student: last.student.into(),
            created_at: last.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub lessons: usize,
    pub last_student: Option<StudentRefResponse>,
    pub last_lesson: Option<LastLessonResponse>,
    pub top_student: Option<StudentRefResponse>,
}

impl From<Stats> for StatsResponse {
    fn from(stats: Stats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            inactive: stats.inactive,
            lessons: stats.lessons,
            last_student: stats.last_student.map(Into::into),
            last_lesson: stats.last_lesson.map(Into::into),
            top_student: stats.top_student.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    /// One of `student:create`, `student:update`, `lesson:add`, `lesson:update`.
    pub kind: String,
    pub label: String,
    pub when: DateTime<Utc>,
    pub student_id: Uuid,
}

impl From<ActivityItem> for ActivityResponse {
    fn from(item: ActivityItem) -> Self {
        let kind = match item.kind {
            ActivityKind::StudentCreate => "student:create",
            ActivityKind::StudentUpdate => "student:update",
            ActivityKind::LessonAdd => "lesson:add",
            ActivityKind::LessonUpdate => "lesson:update",
        };
        Self {
            id: item.id,
            kind: kind.to_string(),
            label: item.label,
            when: item.when,
            student_id: item.student_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub stats: StatsResponse,
    pub events: Vec<ActivityResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractProgressResponse {
    pub contract_id: Uuid,
    pub display_name: String,
    pub mode: ContractModeRecord,
    pub consumed: u32,
    pub capacity: u32,
    pub paid_consumed: u32,
    pub paid_total: u32,
    pub free_consumed: u32,
    pub free_total: u32,
    pub percent: u8,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub billed_amount: Option<Decimal>,
    pub currency: Option<String>,
}

impl From<ContractProgress> for ContractProgressResponse {
    fn from(row: ContractProgress) -> Self {
        Self {
            contract_id: row.contract_id,
            display_name: row.display_name,
            mode: row.mode.into(),
            consumed: row.consumed,
            capacity: row.capacity,
            paid_consumed: row.paid_consumed,
            paid_total: row.paid_total,
            free_consumed: row.free_consumed,
            free_total: row.free_total,
            percent: row.percent,
            completed: row.completed,
            completed_at: row.completed_at,
            billed_amount: row.billed_amount,
            currency: row.currency,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummaryResponse {
    pub student_id: Uuid,
    pub contracts: Vec<ContractProgressResponse>,
    pub active_contracts: usize,
    pub unbilled_lessons: usize,
    pub orphan_lessons: usize,
}

impl From<BillingSummary> for BillingSummaryResponse {
    fn from(summary: BillingSummary) -> Self {
        Self {
            student_id: summary.student_id,
            contracts: summary.contracts.into_iter().map(Into::into).collect(),
            active_contracts: summary.active_contracts,
            unbilled_lessons: summary.unbilled_lessons,
            orphan_lessons: summary.orphan_lessons,
        }
    }
}
