//! Input shapes accepted by [`StudentDesk`](super::StudentDesk) operations.
//!
//! Patch structs use `Option` for "leave unchanged"; fields that can be
//! cleared use `Option<Option<_>>`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{CefrProfile, Contract, ContractMode, Lesson, Tracking};

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub email: String,
    pub is_active: bool,
    pub photo: Option<String>,
    pub origin: Option<String>,
    pub tracking: Tracking,
}

impl Default for NewStudent {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            description: String::new(),
            email: String::new(),
            is_active: true,
            photo: None,
            origin: None,
            tracking: Tracking::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub photo: Option<Option<String>>,
    pub origin: Option<String>,
    /// Merged onto the student's current tracking field by field.
    pub tracking: TrackingPatch,
    /// Replaces the whole lesson list. Triggers reconciliation.
    pub lessons: Option<Vec<Lesson>>,
    /// Replaces the whole contract list. Triggers reconciliation.
    pub billing_history: Option<Vec<Contract>>,
}

impl StudentPatch {
    pub fn touches_billing(&self) -> bool {
        self.lessons.is_some() || self.billing_history.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackingPatch {
    pub goals: Option<Option<String>>,
    pub progress: Option<Option<u8>>,
    pub cefr: Option<CefrProfile>,
    pub tags: Option<Vec<String>>,
}

impl TrackingPatch {
    pub fn apply(self, tracking: &mut Tracking) {
        if let Some(goals) = self.goals {
            tracking.goals = goals;
        }
        if let Some(progress) = self.progress {
            tracking.progress = progress;
        }
        if let Some(cefr) = self.cefr {
            tracking.cefr = cefr;
        }
        if let Some(tags) = self.tags {
            tracking.tags = tags;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLesson {
    /// Lesson date; now when absent.
    pub created_at: Option<DateTime<Utc>>,
    pub comment: String,
    pub homework: String,
    pub tags: Vec<String>,
    /// Contract to bill; the latest open contract when absent.
    pub billing_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    pub created_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub homework: Option<String>,
    pub tags: Option<Vec<String>>,
    pub billing_id: Option<Option<Uuid>>,
}

impl LessonPatch {
    /// Moving a lesson in time or to another contract changes slot usage.
    pub fn touches_billing(&self) -> bool {
        self.billing_id.is_some() || self.created_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub display_name: String,
    pub mode: ContractMode,
    pub total_lessons: u32,
    pub free_lessons: u32,
    pub duration_minutes: Option<u32>,
    pub custom_duration: bool,
    pub price_per_lesson: Option<Decimal>,
    pub currency: Option<String>,
    pub paid: bool,
    pub notes: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl NewContract {
    pub fn single() -> Self {
        Self::with_mode(ContractMode::Single, 1, 0)
    }

    pub fn package(total_lessons: u32, free_lessons: u32) -> Self {
        Self::with_mode(ContractMode::Package, total_lessons, free_lessons)
    }

    fn with_mode(mode: ContractMode, total_lessons: u32, free_lessons: u32) -> Self {
        Self {
            display_name: String::new(),
            mode,
            total_lessons,
            free_lessons,
            duration_minutes: None,
            custom_duration: false,
            price_per_lesson: None,
            currency: None,
            paid: false,
            notes: String::new(),
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContractPatch {
    pub display_name: Option<String>,
    pub mode: Option<ContractMode>,
    pub total_lessons: Option<u32>,
    pub free_lessons: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub custom_duration: Option<bool>,
    pub price_per_lesson: Option<Option<Decimal>>,
    pub currency: Option<Option<String>>,
    pub paid: Option<bool>,
    pub notes: Option<String>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<String>,
    pub lesson_duration: Option<u32>,
    pub currency: Option<String>,
    pub default_student_filter: Option<String>,
}
