//! Service tests against an in-memory repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::*;
use crate::domain::{ContractMode, Settings, Student};
use crate::insights::compute_events;
use crate::ports::{PortError, PortResult, PreferenceStore, StudentRepository};

#[derive(Default)]
struct MemoryRepo {
    students: Mutex<HashMap<Uuid, Student>>,
}

#[async_trait]
impl StudentRepository for MemoryRepo {
    async fn list(&self) -> PortResult<Vec<Student>> {
        Ok(self.students.lock().await.values().cloned().collect())
    }

    async fn load(&self, id: Uuid) -> PortResult<Student> {
        self.students
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Student {id}")))
    }

    async fn insert(&self, student: Student) -> PortResult<()> {
        self.students.lock().await.insert(student.id, student);
        Ok(())
    }

    async fn insert_many(&self, students: Vec<Student>) -> PortResult<()> {
        let mut map = self.students.lock().await;
        for student in students {
            map.insert(student.id, student);
        }
        Ok(())
    }

    async fn save(&self, student: Student) -> PortResult<()> {
        // A real store awaits I/O here; give other writers a chance to run.
        tokio::task::yield_now().await;
        let mut map = self.students.lock().await;
        match map.get_mut(&student.id) {
            Some(slot) => {
                *slot = student;
                Ok(())
            }
            None => Err(PortError::NotFound(format!("Student {}", student.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        self.students
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Student {id}")))
    }
}

#[derive(Default)]
struct MemoryPrefs {
    settings: Mutex<Option<Settings>>,
    cleared_at: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl PreferenceStore for MemoryPrefs {
    async fn settings(&self) -> PortResult<Settings> {
        Ok(self.settings.lock().await.clone().unwrap_or_default())
    }

    async fn save_settings(&self, settings: Settings) -> PortResult<()> {
        *self.settings.lock().await = Some(settings);
        Ok(())
    }

    async fn history_cleared_at(&self) -> PortResult<Option<DateTime<Utc>>> {
        Ok(*self.cleared_at.lock().await)
    }

    async fn set_history_cleared_at(&self, at: DateTime<Utc>) -> PortResult<()> {
        *self.cleared_at.lock().await = Some(at);
        Ok(())
    }
}

fn new_desk() -> StudentDesk {
    StudentDesk::new(
        Arc::new(MemoryRepo::default()),
        Arc::new(MemoryPrefs::default()),
    )
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 17, 0, 0).unwrap() + Duration::days(n)
}

async fn desk_with_student() -> (StudentDesk, Uuid) {
    let desk = new_desk();
    let student = desk
        .create_student(NewStudent {
            first_name: "Marie".into(),
            last_name: "Curie".into(),
            ..NewStudent::default()
        })
        .await
        .unwrap();
    (desk, student.id)
}

async fn lesson_on(desk: &StudentDesk, student_id: Uuid, n: i64) -> Student {
    desk.add_lesson(
        student_id,
        NewLesson {
            created_at: Some(day(n)),
            ..NewLesson::default()
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn create_student_applies_defaults() {
    let (desk, id) = desk_with_student().await;
    let student = desk.get_student(id).await.unwrap();

    assert_eq!(student.origin, DEFAULT_ORIGIN);
    assert!(student.lessons.is_empty());
    assert!(student.billing_history.is_empty());
    assert!(student.updated_at.is_none());
}

#[tokio::test]
async fn lesson_goes_to_latest_open_contract() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(4, 1)).await.unwrap();
    let contract_id = student.billing_history[0].id;

    let student = lesson_on(&desk, id, 0).await;

    assert_eq!(student.lessons[0].billing_id, Some(contract_id));
    assert_eq!(student.contract(contract_id).unwrap().consumed_lessons, 1);
}

#[tokio::test]
async fn lesson_without_open_contract_is_unbilled() {
    let (desk, id) = desk_with_student().await;
    let student = lesson_on(&desk, id, 0).await;
    assert_eq!(student.lessons[0].billing_id, None);
}

#[tokio::test]
async fn explicit_billing_id_wins() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::single()).await.unwrap();
    let older = student.billing_history[0].id;
    desk.add_contract(id, NewContract::package(10, 0)).await.unwrap();

    let student = desk
        .add_lesson(
            id,
            NewLesson {
                billing_id: Some(older),
                ..NewLesson::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(student.lessons[0].billing_id, Some(older));
    assert!(student.contract(older).unwrap().completed);
}

#[tokio::test]
async fn pack_fills_then_next_lesson_moves_on() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(4, 1)).await.unwrap();
    let contract_id = student.billing_history[0].id;

    for n in 0..5 {
        lesson_on(&desk, id, n).await;
    }
    let student = desk.get_student(id).await.unwrap();
    let contract = student.contract(contract_id).unwrap();
    assert!(contract.completed);
    assert!(contract.completed_at.is_some());
    assert_eq!(contract.free_consumed, 1);
    // Newest first: the fifth lesson is the free one.
    assert!(student.lessons[0].is_free);
    assert!(student.lessons[1..].iter().all(|l| !l.is_free));

    // No open contract left: the sixth lesson is unbilled.
    let student = lesson_on(&desk, id, 10).await;
    assert_eq!(student.lessons[0].billing_id, None);
}

#[tokio::test]
async fn deleting_a_lesson_reopens_the_pack() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(4, 1)).await.unwrap();
    let contract_id = student.billing_history[0].id;
    for n in 0..5 {
        lesson_on(&desk, id, n).await;
    }
    let student = desk.get_student(id).await.unwrap();
    let last = student.lessons[0].id;

    assert_eq!(desk.delete_lesson(id, last).await.unwrap(), last);

    let student = desk.get_student(id).await.unwrap();
    let contract = student.contract(contract_id).unwrap();
    assert!(!contract.completed);
    assert!(contract.completed_at.is_none());
    assert_eq!(contract.consumed_lessons, 4);
}

#[tokio::test]
async fn moving_a_lesson_between_contracts_recounts_both() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(2, 0)).await.unwrap();
    let first = student.billing_history[0].id;
    let student = lesson_on(&desk, id, 0).await;
    let lesson_id = student.lessons[0].id;
    let student = desk.add_contract(id, NewContract::single()).await.unwrap();
    let second = student.billing_history[1].id;

    let lesson = desk
        .update_lesson(
            id,
            lesson_id,
            LessonPatch {
                billing_id: Some(Some(second)),
                ..LessonPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(lesson.billing_id, Some(second));
    assert!(lesson.updated_at.is_some());

    let student = desk.get_student(id).await.unwrap();
    assert_eq!(student.contract(first).unwrap().consumed_lessons, 0);
    assert!(student.contract(second).unwrap().completed);
}

#[tokio::test]
async fn deleting_a_contract_orphans_its_lessons() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(2, 0)).await.unwrap();
    let contract_id = student.billing_history[0].id;
    lesson_on(&desk, id, 0).await;

    let student = desk.delete_contract(id, contract_id).await.unwrap();

    assert!(student.billing_history.is_empty());
    assert_eq!(student.lessons.len(), 1);
    assert_eq!(student.lessons[0].billing_id, Some(contract_id));
}

#[tokio::test]
async fn single_contract_is_normalized() {
    let (desk, id) = desk_with_student().await;
    let mut input = NewContract::single();
    input.total_lessons = 8;
    input.free_lessons = 2;

    let student = desk.add_contract(id, input).await.unwrap();

    let contract = &student.billing_history[0];
    assert_eq!(contract.mode, ContractMode::Single);
    assert_eq!(contract.total_lessons, 1);
    assert_eq!(contract.free_lessons, Some(0));
}

#[tokio::test]
async fn empty_pack_is_rejected() {
    let (desk, id) = desk_with_student().await;
    let err = desk.add_contract(id, NewContract::package(0, 2)).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidInput(_)));
}

#[tokio::test]
async fn contract_ending_before_start_is_rejected() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(3, 0)).await.unwrap();
    let contract_id = student.billing_history[0].id;

    let err = desk
        .update_contract(
            id,
            contract_id,
            ContractPatch {
                start_date: Some(Some(day(10).date_naive())),
                end_date: Some(Some(day(0).date_naive())),
                ..ContractPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::InvalidInput(_)));
}

#[tokio::test]
async fn growing_a_pack_reopens_it() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(1, 0)).await.unwrap();
    let contract_id = student.billing_history[0].id;
    let student = lesson_on(&desk, id, 0).await;
    assert!(student.contract(contract_id).unwrap().completed);

    let student = desk
        .update_contract(
            id,
            contract_id,
            ContractPatch {
                total_lessons: Some(3),
                ..ContractPatch::default()
            },
        )
        .await
        .unwrap();

    let contract = student.contract(contract_id).unwrap();
    assert!(!contract.completed);
    assert!(contract.completed_at.is_none());
}

#[tokio::test]
async fn student_patch_with_contracts_reconciles() {
    let (desk, id) = desk_with_student().await;
    lesson_on(&desk, id, 0).await;
    let student = desk.get_student(id).await.unwrap();
    let mut contract = crate::domain::Contract::new(ContractMode::Single, 1, 0);
    let mut lessons = student.lessons.clone();
    lessons[0].billing_id = Some(contract.id);
    contract.display_name = "Trial".into();

    let student = desk
        .update_student(
            id,
            StudentPatch {
                lessons: Some(lessons),
                billing_history: Some(vec![contract]),
                ..StudentPatch::default()
            },
        )
        .await
        .unwrap();

    assert!(student.updated_at.is_some());
    assert!(student.billing_history[0].completed);
    assert_eq!(student.billing_history[0].consumed_lessons, 1);
}

#[tokio::test]
async fn list_sorts_by_name_and_counts_active_contracts() {
    let desk = new_desk();
    for (first, last) in [("Zoe", "Adams"), ("Al", "Zed"), ("Bea", "Adams")] {
        desk.create_student(NewStudent {
            first_name: first.into(),
            last_name: last.into(),
            ..NewStudent::default()
        })
        .await
        .unwrap();
    }
    let listed = desk.list_students().await.unwrap();
    let names: Vec<String> = listed.iter().map(|o| o.student.full_name()).collect();
    assert_eq!(names, ["Bea Adams", "Zoe Adams", "Al Zed"]);

    let id = listed[0].student.id;
    desk.add_contract(id, NewContract::single()).await.unwrap();
    lesson_on(&desk, id, 0).await;
    desk.add_contract(id, NewContract::package(2, 0)).await.unwrap();

    let listed = desk.list_students().await.unwrap();
    // The single was used up by the lesson; only the pack is running.
    assert_eq!(listed[0].active_contracts, 1);
    assert_eq!(listed[1].active_contracts, 0);
}

#[tokio::test]
async fn import_skips_nameless_rows() {
    let desk = new_desk();
    let rows = vec![
        NewStudent {
            first_name: "  Ada ".into(),
            ..NewStudent::default()
        },
        NewStudent::default(),
        NewStudent {
            last_name: "Hopper".into(),
            ..NewStudent::default()
        },
    ];

    assert_eq!(desk.import_students(rows).await.unwrap(), 2);
    let names: Vec<String> = desk
        .list_students()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.student.first_name)
        .collect();
    assert!(names.contains(&"Ada".to_string()));
}

#[tokio::test]
async fn clear_history_drops_update_stamps() {
    let (desk, id) = desk_with_student().await;
    let student = lesson_on(&desk, id, 0).await;
    let lesson_id = student.lessons[0].id;
    desk.update_lesson(
        id,
        lesson_id,
        LessonPatch {
            comment: Some("present perfect".into()),
            ..LessonPatch::default()
        },
    )
    .await
    .unwrap();
    desk.update_student(
        id,
        StudentPatch {
            email: Some("marie@example.org".into()),
            ..StudentPatch::default()
        },
    )
    .await
    .unwrap();

    desk.clear_history().await.unwrap();

    let student = desk.get_student(id).await.unwrap();
    assert!(student.updated_at.is_none());
    assert!(student.lessons[0].updated_at.is_none());
    assert_eq!(student.lessons[0].comment, "present perfect");
}

#[tokio::test]
async fn missing_records_map_to_not_found() {
    let (desk, id) = desk_with_student().await;
    let ghost = Uuid::new_v4();

    assert!(matches!(
        desk.get_student(ghost).await,
        Err(DeskError::StudentNotFound(g)) if g == ghost
    ));
    assert!(matches!(
        desk.delete_student(ghost).await,
        Err(DeskError::StudentNotFound(_))
    ));
    assert!(matches!(
        desk.delete_lesson(id, ghost).await,
        Err(DeskError::LessonNotFound(_))
    ));
    assert!(matches!(
        desk.update_lesson(id, ghost, LessonPatch::default()).await,
        Err(DeskError::LessonNotFound(_))
    ));
    assert!(matches!(
        desk.delete_contract(id, ghost).await,
        Err(DeskError::ContractNotFound(_))
    ));
}

#[tokio::test]
async fn moving_a_lesson_in_time_swaps_free_slot() {
    let (desk, id) = desk_with_student().await;
    desk.add_contract(id, NewContract::package(1, 1)).await.unwrap();
    let student = lesson_on(&desk, id, 0).await;
    let early = student.lessons[0].id;
    let student = lesson_on(&desk, id, 1).await;
    let late = student.lessons[0].id;
    assert!(!student.lesson(early).unwrap().is_free);
    assert!(student.lesson(late).unwrap().is_free);

    desk.update_lesson(
        id,
        early,
        LessonPatch {
            created_at: Some(day(2)),
            ..LessonPatch::default()
        },
    )
    .await
    .unwrap();

    let student = desk.get_student(id).await.unwrap();
    assert!(student.lesson(early).unwrap().is_free);
    assert!(!student.lesson(late).unwrap().is_free);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lessons_are_all_kept() {
    let (desk, id) = desk_with_student().await;
    let desk = Arc::new(desk);

    let handles: Vec<_> = (0..10)
        .map(|n| {
            let desk = desk.clone();
            tokio::spawn(async move {
                desk.add_lesson(
                    id,
                    NewLesson {
                        created_at: Some(day(n)),
                        ..NewLesson::default()
                    },
                )
                .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(desk.get_student(id).await.unwrap().lessons.len(), 10);
}

#[tokio::test]
async fn clear_history_empties_the_feed() {
    let (desk, id) = desk_with_student().await;
    lesson_on(&desk, id, -30).await;
    assert!(desk.history_cleared_at().await.unwrap().is_none());

    let cleared_at = desk.clear_history().await.unwrap();

    assert_eq!(desk.history_cleared_at().await.unwrap(), Some(cleared_at));
    let students: Vec<Student> = desk
        .list_students()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.student)
        .collect();
    assert!(compute_events(&students, Some(cleared_at)).is_empty());
}

#[tokio::test]
async fn new_contracts_take_settings_defaults() {
    let (desk, id) = desk_with_student().await;
    let student = desk.add_contract(id, NewContract::package(5, 0)).await.unwrap();
    assert_eq!(student.billing_history[0].duration_minutes, 60);
    assert_eq!(student.billing_history[0].currency.as_deref(), Some("EUR"));

    let settings = desk
        .update_settings(SettingsPatch {
            lesson_duration: Some(45),
            currency: Some(" CHF ".into()),
            ..SettingsPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.currency, "CHF");
    assert_eq!(settings.theme, "dark");

    let student = desk.add_contract(id, NewContract::single()).await.unwrap();
    assert_eq!(student.billing_history[1].duration_minutes, 45);
    assert_eq!(student.billing_history[1].currency.as_deref(), Some("CHF"));

    let mut explicit = NewContract::single();
    explicit.duration_minutes = Some(90);
    explicit.currency = Some("USD".into());
    let student = desk.add_contract(id, explicit).await.unwrap();
    assert_eq!(student.billing_history[2].duration_minutes, 90);
    assert_eq!(student.billing_history[2].currency.as_deref(), Some("USD"));
}

#[tokio::test]
async fn settings_reject_unusable_values() {
    let desk = new_desk();
    let zero = SettingsPatch {
        lesson_duration: Some(0),
        ..SettingsPatch::default()
    };
    assert!(matches!(
        desk.update_settings(zero).await,
        Err(DeskError::InvalidInput(_))
    ));
    let blank = SettingsPatch {
        currency: Some("  ".into()),
        ..SettingsPatch::default()
    };
    assert!(matches!(
        desk.update_settings(blank).await,
        Err(DeskError::InvalidInput(_))
    ));
    assert_eq!(desk.settings().await.unwrap(), Settings::default());
}
