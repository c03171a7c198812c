//! crates/tutor_desk_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Origin assigned to a student when none is given.
pub const DEFAULT_ORIGIN: &str = "Privé";

/// Default lesson length in minutes.
pub const DEFAULT_LESSON_MINUTES: u32 = 60;

pub const DEFAULT_CURRENCY: &str = "EUR";

/// One tutoring session given to a student.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: Uuid,
    /// The lesson date. Billing consumes contract slots in this order.
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub comment: String,
    pub homework: String,
    pub tags: Vec<String>,
    /// The contract this lesson is billed against, if any.
    pub billing_id: Option<Uuid>,
    /// Set by reconciliation: true when the lesson used a free slot.
    pub is_free: bool,
}

impl Lesson {
    pub fn new(created_at: DateTime<Utc>, billing_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            updated_at: None,
            comment: String::new(),
            homework: String::new(),
            tags: Vec::new(),
            billing_id,
            is_free: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractMode {
    /// Exactly one paid lesson.
    Single,
    /// `total_lessons` paid lessons plus `free_lessons` bonus lessons.
    Package,
}

/// A billing agreement covering one or more lessons.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub display_name: String,
    pub mode: ContractMode,
    pub total_lessons: u32,
    /// `None` when the stored value was missing or unusable.
    pub free_lessons: Option<u32>,
    pub duration_minutes: u32,
    pub custom_duration: bool,
    pub price_per_lesson: Option<Decimal>,
    pub currency: Option<String>,
    pub paid: bool,
    pub notes: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    // Maintained by reconciliation only.
    pub consumed_lessons: u32,
    pub paid_consumed: u32,
    pub free_consumed: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// Creates an empty contract with no consumption recorded yet.
    pub fn new(mode: ContractMode, total_lessons: u32, free_lessons: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: None,
            display_name: String::new(),
            mode,
            total_lessons,
            free_lessons: Some(free_lessons),
            duration_minutes: DEFAULT_LESSON_MINUTES,
            custom_duration: false,
            price_per_lesson: None,
            currency: None,
            paid: false,
            notes: String::new(),
            start_date: None,
            end_date: None,
            consumed_lessons: 0,
            paid_consumed: 0,
            free_consumed: 0,
            completed: false,
            completed_at: None,
        }
    }

    /// Paid slots the contract actually grants. A single lesson is always one slot.
    pub fn effective_paid_slots(&self) -> u32 {
        match self.mode {
            ContractMode::Single => 1,
            ContractMode::Package => self.total_lessons,
        }
    }

    /// Free slots the contract actually grants. Single lessons have none.
    pub fn effective_free_slots(&self) -> u32 {
        match self.mode {
            ContractMode::Single => 0,
            ContractMode::Package => self.free_lessons.unwrap_or(0),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.effective_paid_slots()
            .saturating_add(self.effective_free_slots())
    }

    /// Price of every paid lesson consumed so far, when a price is set.
    pub fn billed_amount(&self) -> Option<Decimal> {
        self.price_per_lesson
            .map(|price| price * Decimal::from(self.paid_consumed))
    }
}

/// CEFR proficiency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CefrProfile {
    pub oral: Option<CefrLevel>,
    pub written: Option<CefrLevel>,
    pub interaction: Option<CefrLevel>,
    pub grammar: Option<CefrLevel>,
    pub vocabulary: Option<CefrLevel>,
}

/// Optional follow-up information kept on a student.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tracking {
    pub goals: Option<String>,
    /// Percentage, 0 to 100.
    pub progress: Option<u8>,
    pub cefr: CefrProfile,
    pub tags: Vec<String>,
}

/// The student aggregate: the unit of persistence and of reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub email: String,
    pub is_active: bool,
    pub photo: Option<String>,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tracking: Tracking,
    pub lessons: Vec<Lesson>,
    pub billing_history: Vec<Contract>,
}

impl Student {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            description: String::new(),
            email: String::new(),
            is_active: true,
            photo: None,
            origin: DEFAULT_ORIGIN.to_string(),
            created_at: Utc::now(),
            updated_at: None,
            tracking: Tracking::default(),
            lessons: Vec::new(),
            billing_history: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn contract(&self, id: Uuid) -> Option<&Contract> {
        self.billing_history.iter().find(|c| c.id == id)
    }

    pub fn lesson(&self, id: Uuid) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    /// Lessons sorted newest first, the order lists are displayed in.
    pub fn sort_lessons_newest_first(&mut self) {
        self.lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

/// Desk-wide preferences. Lesson length and currency seed new contracts.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub theme: String,
    pub lesson_duration: u32,
    pub currency: String,
    pub default_student_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            lesson_duration: DEFAULT_LESSON_MINUTES,
            currency: DEFAULT_CURRENCY.to_string(),
            default_student_filter: "all".to_string(),
        }
    }
}
