//! services/api/src/records.rs
//!
//! Serializable mirrors of the core domain types. These are both the shape of
//! the persisted JSON document and the bodies returned by the REST API.
//! Field names are camelCase to stay compatible with existing data files.
//!
//! Deserialization is forgiving: missing collections default to empty,
//! unusable `freeLessons` values become `null`, unusable lesson counts become
//! zero and blank dates are dropped.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tutor_desk_core::domain::{
    CefrLevel, CefrProfile, Contract, ContractMode, Lesson, Settings, Student, Tracking,
    DEFAULT_LESSON_MINUTES, DEFAULT_ORIGIN,
};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Lessons
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub homework: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub billing_id: Option<Uuid>,
    #[serde(default)]
    pub is_free: bool,
}

impl LessonRecord {
    pub fn to_domain(self) -> Lesson {
        Lesson {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            comment: self.comment,
            homework: self.homework,
            tags: self.tags,
            billing_id: self.billing_id,
            is_free: self.is_free,
        }
    }

    pub fn from_domain(lesson: Lesson) -> Self {
        Self {
            id: lesson.id,
            created_at: lesson.created_at,
            updated_at: lesson.updated_at,
            comment: lesson.comment,
            homework: lesson.homework,
            tags: lesson.tags,
            billing_id: lesson.billing_id,
            is_free: lesson.is_free,
        }
    }
}

//=========================================================================================
// Contracts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContractModeRecord {
    Single,
    Package,
}

impl From<ContractModeRecord> for ContractMode {
    fn from(mode: ContractModeRecord) -> Self {
        match mode {
            ContractModeRecord::Single => ContractMode::Single,
            ContractModeRecord::Package => ContractMode::Package,
        }
    }
}

impl From<ContractMode> for ContractModeRecord {
    fn from(mode: ContractMode) -> Self {
        match mode {
            ContractMode::Single => ContractModeRecord::Single,
            ContractMode::Package => ContractModeRecord::Package,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_name: String,
    pub mode: ContractModeRecord,
    #[serde(default, deserialize_with = "lenient_total")]
    pub total_lessons: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub free_lessons: Option<u32>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
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
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_total")]
    pub consumed_lessons: u32,
    #[serde(default, deserialize_with = "lenient_total")]
    pub paid_consumed: u32,
    #[serde(default, deserialize_with = "lenient_total")]
    pub free_consumed: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_duration() -> u32 {
    DEFAULT_LESSON_MINUTES
}

impl ContractRecord {
    pub fn to_domain(self) -> Contract {
        Contract {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            display_name: self.display_name,
            mode: self.mode.into(),
            total_lessons: self.total_lessons,
            free_lessons: self.free_lessons,
            duration_minutes: self.duration_minutes,
            custom_duration: self.custom_duration,
            price_per_lesson: self.price_per_lesson,
            currency: self.currency,
            paid: self.paid,
            notes: self.notes,
            start_date: self.start_date,
            end_date: self.end_date,
            consumed_lessons: self.consumed_lessons,
            paid_consumed: self.paid_consumed,
            free_consumed: self.free_consumed,
            completed: self.completed,
            completed_at: self.completed_at,
        }
    }

    pub fn from_domain(contract: Contract) -> Self {
        Self {
            id: contract.id,
            created_at: contract.created_at,
            updated_at: contract.updated_at,
            display_name: contract.display_name,
            mode: contract.mode.into(),
            total_lessons: contract.total_lessons,
            free_lessons: contract.free_lessons,
            duration_minutes: contract.duration_minutes,
            custom_duration: contract.custom_duration,
            price_per_lesson: contract.price_per_lesson,
            currency: contract.currency,
            paid: contract.paid,
            notes: contract.notes,
            start_date: contract.start_date,
            end_date: contract.end_date,
            consumed_lessons: contract.consumed_lessons,
            paid_consumed: contract.paid_consumed,
            free_consumed: contract.free_consumed,
            completed: contract.completed,
            completed_at: contract.completed_at,
        }
    }
}

//=========================================================================================
// Students
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CefrLevelRecord {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl From<CefrLevelRecord> for CefrLevel {
    fn from(level: CefrLevelRecord) -> Self {
        match level {
            CefrLevelRecord::A1 => CefrLevel::A1,
            CefrLevelRecord::A2 => CefrLevel::A2,
            CefrLevelRecord::B1 => CefrLevel::B1,
            CefrLevelRecord::B2 => CefrLevel::B2,
            CefrLevelRecord::C1 => CefrLevel::C1,
            CefrLevelRecord::C2 => CefrLevel::C2,
        }
    }
}

impl From<CefrLevel> for CefrLevelRecord {
    fn from(level: CefrLevel) -> Self {
        match level {
            CefrLevel::A1 => CefrLevelRecord::A1,
            CefrLevel::A2 => CefrLevelRecord::A2,
            CefrLevel::B1 => CefrLevelRecord::B1,
            CefrLevel::B2 => CefrLevelRecord::B2,
            CefrLevel::C1 => CefrLevelRecord::C1,
            CefrLevel::C2 => CefrLevelRecord::C2,
        }
    }
}

/// Stored with the French skill names existing data files use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CefrRecord {
    #[serde(default)]
    pub oral: Option<CefrLevelRecord>,
    #[serde(default, rename = "ecrit")]
    pub written: Option<CefrLevelRecord>,
    #[serde(default)]
    pub interaction: Option<CefrLevelRecord>,
    #[serde(default, rename = "grammaire")]
    pub grammar: Option<CefrLevelRecord>,
    #[serde(default, rename = "vocabulaire")]
    pub vocabulary: Option<CefrLevelRecord>,
}

impl CefrRecord {
    pub fn to_domain(self) -> CefrProfile {
        CefrProfile {
            oral: self.oral.map(Into::into),
            written: self.written.map(Into::into),
            interaction: self.interaction.map(Into::into),
            grammar: self.grammar.map(Into::into),
            vocabulary: self.vocabulary.map(Into::into),
        }
    }

    pub fn from_domain(profile: CefrProfile) -> Self {
        Self {
            oral: profile.oral.map(Into::into),
            written: profile.written.map(Into::into),
            interaction: profile.interaction.map(Into::into),
            grammar: profile.grammar.map(Into::into),
            vocabulary: profile.vocabulary.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SheetRecord {
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default = "default_origin")]
    pub origin: String,
    pub sheet: SheetRecord,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub cefr: CefrRecord,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub lessons: Vec<LessonRecord>,
    #[serde(default)]
    pub billing_history: Vec<ContractRecord>,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

impl StudentRecord {
    pub fn to_domain(self) -> Student {
        Student {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            description: self.description,
            email: self.email,
            is_active: self.is_active,
            photo: self.photo,
            origin: self.origin,
            created_at: self.sheet.created_at,
            updated_at: self.updated_at,
            tracking: Tracking {
                goals: self.goals,
                progress: self.progress,
                cefr: self.cefr.to_domain(),
                tags: self.tags,
            },
            lessons: self.lessons.into_iter().map(LessonRecord::to_domain).collect(),
            billing_history: self
                .billing_history
                .into_iter()
                .map(ContractRecord::to_domain)
                .collect(),
        }
    }

    pub fn from_domain(student: Student) -> Self {
        Self {
            id: student.id,
            first_name: student.first_name,
            last_name: student.last_name,
            description: student.description,
            email: student.email,
            is_active: student.is_active,
            photo: student.photo,
            origin: student.origin,
            sheet: SheetRecord {
                created_at: student.created_at,
            },
            updated_at: student.updated_at,
            goals: student.tracking.goals,
            progress: student.tracking.progress,
            cefr: CefrRecord::from_domain(student.tracking.cefr),
            tags: student.tracking.tags,
            lessons: student.lessons.into_iter().map(LessonRecord::from_domain).collect(),
            billing_history: student
                .billing_history
                .into_iter()
                .map(ContractRecord::from_domain)
                .collect(),
        }
    }
}

//=========================================================================================
// Settings
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_duration")]
    pub lesson_duration: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_student_filter")]
    pub default_student_filter: String,
}

fn default_theme() -> String {
    Settings::default().theme
}

fn default_currency() -> String {
    Settings::default().currency
}

fn default_student_filter() -> String {
    Settings::default().default_student_filter
}

impl SettingsRecord {
    pub fn to_domain(self) -> Settings {
        Settings {
            theme: self.theme,
            lesson_duration: self.lesson_duration,
            currency: self.currency,
            default_student_filter: self.default_student_filter,
        }
    }

    pub fn from_domain(settings: Settings) -> Self {
        Self {
            theme: settings.theme,
            lesson_duration: settings.lesson_duration,
            currency: settings.currency,
            default_student_filter: settings.default_student_filter,
        }
    }
}

//=========================================================================================
// Lenient field readers
//=========================================================================================

/// Accepts any JSON value; only a non-negative whole number is kept.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        _ => None,
    };
    Ok(count)
}

/// Like [`lenient_count`], but also reads numeric strings and falls back to zero.
fn lenient_total<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match value {
        Value::String(raw) => raw.trim().parse::<u32>().ok(),
        other => lenient_count(other).unwrap_or(None),
    };
    Ok(count.unwrap_or(0))
}

/// Accepts `YYYY-MM-DD` or a full timestamp; anything else reads as no date.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::String(raw) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())))
}
