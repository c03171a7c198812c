//! Dashboard figures derived from the student list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::billing::active_contract_count;
use crate::domain::{ContractMode, Student};

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRef {
    pub id: Uuid,
    pub full_name: String,
}

impl From<&Student> for StudentRef {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastLesson {
    pub student: StudentRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub lessons: usize,
    /// Most recently created student.
    pub last_student: Option<StudentRef>,
    pub last_lesson: Option<LastLesson>,
    /// Student with the most lessons; the first one listed wins a tie.
    pub top_student: Option<StudentRef>,
}

pub fn compute_stats(students: &[Student]) -> Stats {
    let total = students.len();
    let active = students.iter().filter(|s| s.is_active).count();

    let mut lessons = 0;
    let mut last_lesson: Option<LastLesson> = None;
    let mut top: Option<&Student> = None;

    for student in students {
        lessons += student.lessons.len();

        if let Some(recent) = student.lessons.iter().map(|l| l.created_at).max() {
            if last_lesson.as_ref().map_or(true, |last| recent > last.created_at) {
                last_lesson = Some(LastLesson {
                    student: student.into(),
                    created_at: recent,
                });
            }
        }
        if top.map_or(true, |t| student.lessons.len() > t.lessons.len()) {
            top = Some(student);
        }
    }

    let last_student = students
        .iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at))
        .map(StudentRef::from);

    Stats {
        total,
        active,
        inactive: total - active,
        lessons,
        last_student,
        last_lesson,
        top_student: top.map(StudentRef::from),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    StudentCreate,
    StudentUpdate,
    LessonAdd,
    LessonUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityItem {
    pub id: String,
    pub kind: ActivityKind,
    pub label: String,
    pub when: DateTime<Utc>,
    pub student_id: Uuid,
}

/// Activity feed, newest first. Events at or before `cleared_at` are dropped.
pub fn compute_events(
    students: &[Student],
    cleared_at: Option<DateTime<Utc>>,
) -> Vec<ActivityItem> {
    let mut events = Vec::new();

    for student in students {
        let name = student.full_name();
        events.push(ActivityItem {
            id: format!("stu-{}-created", student.id),
            kind: ActivityKind::StudentCreate,
            label: format!("{name} added"),
            when: student.created_at,
            student_id: student.id,
        });
        if let Some(updated_at) = student.updated_at {
            events.push(ActivityItem {
                id: format!("stu-{}-updated", student.id),
                kind: ActivityKind::StudentUpdate,
                label: format!("{name} updated"),
                when: updated_at,
                student_id: student.id,
            });
        }

        for lesson in &student.lessons {
            events.push(ActivityItem {
                id: format!("les-{}-{}-created", student.id, lesson.id),
                kind: ActivityKind::LessonAdd,
                label: format!("Lesson for {name}"),
                when: lesson.created_at,
                student_id: student.id,
            });
            if let Some(updated_at) = lesson.updated_at {
                events.push(ActivityItem {
                    id: format!("les-{}-{}-updated", student.id, lesson.id),
                    kind: ActivityKind::LessonUpdate,
                    label: format!("Lesson updated for {name}"),
                    when: updated_at,
                    student_id: student.id,
                });
            }
        }
    }

    if let Some(cutoff) = cleared_at {
        events.retain(|e| e.when > cutoff);
    }
    events.sort_by(|a, b| b.when.cmp(&a.when));
    events
}

/// One row of a contract card.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractProgress {
    pub contract_id: Uuid,
    pub display_name: String,
    pub mode: ContractMode,
    pub consumed: u32,
    pub capacity: u32,
    pub paid_consumed: u32,
    pub paid_total: u32,
    pub free_consumed: u32,
    pub free_total: u32,
    /// Share of the capacity used, capped at 100.
    pub percent: u8,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub billed_amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingSummary {
    pub student_id: Uuid,
    pub contracts: Vec<ContractProgress>,
    pub active_contracts: usize,
    pub unbilled_lessons: usize,
    /// Lessons pointing at a contract the student no longer has.
    pub orphan_lessons: usize,
}

/// Contract cards for one student, newest contract first.
///
/// Expects a reconciled student; counters are read as stored.
pub fn billing_summary(student: &Student) -> BillingSummary {
    let mut contracts: Vec<ContractProgress> = student
        .billing_history
        .iter()
        .map(|c| {
            let capacity = c.capacity();
            let percent = if capacity == 0 {
                0
            } else {
                (u64::from(c.consumed_lessons) * 100 / u64::from(capacity)).min(100) as u8
            };
            ContractProgress {
                contract_id: c.id,
                display_name: c.display_name.clone(),
                mode: c.mode,
                consumed: c.consumed_lessons,
                capacity,
                paid_consumed: c.paid_consumed,
                paid_total: c.effective_paid_slots(),
                free_consumed: c.free_consumed,
                free_total: c.effective_free_slots(),
                percent,
                completed: c.completed,
                completed_at: c.completed_at,
                billed_amount: c.billed_amount(),
                currency: c.currency.clone(),
            }
        })
        .collect();
    contracts.sort_by_key(|row| {
        std::cmp::Reverse(student.contract(row.contract_id).map(|c| c.created_at))
    });

    let unbilled_lessons = student.lessons.iter().filter(|l| l.billing_id.is_none()).count();
    let orphan_lessons = student
        .lessons
        .iter()
        .filter_map(|l| l.billing_id)
        .filter(|id| student.contract(*id).is_none())
        .count();

    BillingSummary {
        student_id: student.id,
        contracts,
        active_contracts: active_contract_count(student),
        unbilled_lessons,
        orphan_lessons,
    }
}
