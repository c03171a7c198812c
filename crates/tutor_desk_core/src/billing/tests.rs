//! Tests for the billing reconciliation engine and contract lookups.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rstest::rstest;
use uuid::Uuid;

use super::*;
use crate::domain::{Contract, ContractMode, Lesson, Student};

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn package(total: u32, free: u32) -> Contract {
    let mut contract = Contract::new(ContractMode::Package, total, free);
    contract.created_at = at(-60);
    contract
}

fn single() -> Contract {
    let mut contract = Contract::new(ContractMode::Single, 1, 0);
    contract.created_at = at(-60);
    contract
}

fn student_with(contracts: Vec<Contract>) -> Student {
    let mut student = Student::new("Ada", "Lovelace");
    student.billing_history = contracts;
    student
}

/// Adds `count` lessons for `contract_id`, one day apart, starting at day `first_day`.
fn add_lessons(student: &mut Student, contract_id: Uuid, first_day: i64, count: i64) -> Vec<Uuid> {
    (0..count)
        .map(|i| {
            let lesson = Lesson::new(at((first_day + i) * 24 * 60), Some(contract_id));
            let id = lesson.id;
            student.lessons.push(lesson);
            id
        })
        .collect()
}

fn is_free(student: &Student, lesson_id: Uuid) -> bool {
    student.lesson(lesson_id).unwrap().is_free
}

#[test]
fn package_consumes_paid_slots_then_free_slot() {
    let contract = package(4, 1);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 5);

    let student = reconcile_at(student, at(10_000));

    for id in &ids[..4] {
        assert!(!is_free(&student, *id));
    }
    assert!(is_free(&student, ids[4]));

    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.consumed_lessons, 5);
    assert_eq!(contract.paid_consumed, 4);
    assert_eq!(contract.free_consumed, 1);
    assert!(contract.completed);
    assert_eq!(contract.completed_at, Some(at(10_000)));
}

#[test]
fn partially_used_package_stays_open() {
    let contract = package(4, 1);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 3);

    let student = reconcile_at(student, at(10_000));

    assert!(ids.iter().all(|id| !is_free(&student, *id)));
    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.consumed_lessons, 3);
    assert!(!contract.completed);
    assert_eq!(contract.completed_at, None);
}

#[test]
fn single_contract_overflows_as_paid() {
    let contract = single();
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 2);

    let student = reconcile_at(student, at(10_000));

    assert!(!is_free(&student, ids[0]));
    assert!(!is_free(&student, ids[1]));
    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.consumed_lessons, 2);
    assert_eq!(contract.paid_consumed, 2);
    assert_eq!(contract.free_consumed, 0);
    assert!(contract.completed);
}

#[test]
fn single_contract_ignores_stored_pack_sizes() {
    let mut contract = single();
    contract.total_lessons = 10;
    contract.free_lessons = Some(3);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 4);

    let student = reconcile_at(student, at(10_000));

    assert!(ids.iter().all(|id| !is_free(&student, *id)));
    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.free_lessons, Some(0));
    assert_eq!(contract.capacity(), 1);
    assert!(contract.completed);
}

#[test]
fn deleting_a_lesson_reopens_a_completed_contract() {
    let contract = package(4, 1);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 5);
    let mut student = reconcile_at(student, at(10_000));
    assert!(student.contract(contract_id).unwrap().completed);

    student.lessons.retain(|l| l.id != ids[4]);
    let student = reconcile_at(student, at(20_000));

    let contract = student.contract(contract_id).unwrap();
    assert!(!contract.completed);
    assert_eq!(contract.completed_at, None);
    assert_eq!(contract.consumed_lessons, 4);
    assert_eq!(contract.updated_at, Some(at(20_000)));
}

#[test]
fn reaching_capacity_stamps_completion() {
    let contract = package(2, 0);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    add_lessons(&mut student, contract_id, 0, 1);
    let mut student = reconcile_at(student, at(10_000));
    assert!(!student.contract(contract_id).unwrap().completed);

    add_lessons(&mut student, contract_id, 5, 1);
    let student = reconcile_at(student, at(20_000));

    let contract = student.contract(contract_id).unwrap();
    assert!(contract.completed);
    assert_eq!(contract.completed_at, Some(at(20_000)));
}

#[test]
fn rerun_only_moves_updated_at() {
    let contract = package(2, 1);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    add_lessons(&mut student, contract_id, 0, 3);

    let first = reconcile_at(student, at(10_000));
    let second = reconcile_at(first.clone(), at(20_000));

    let before = first.contract(contract_id).unwrap();
    let after = second.contract(contract_id).unwrap();
    assert_eq!(before.completed, after.completed);
    assert_eq!(before.completed_at, Some(at(10_000)));
    assert_eq!(after.completed_at, Some(at(10_000)));
    assert_eq!(before.paid_consumed, after.paid_consumed);
    assert_eq!(before.free_consumed, after.free_consumed);
    assert_eq!(before.consumed_lessons, after.consumed_lessons);
    assert_eq!(after.updated_at, Some(at(20_000)));
    assert_eq!(first.lessons, second.lessons);
}

#[test]
fn free_slot_follows_lesson_dates_not_insertion_order() {
    let contract = package(1, 1);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let later = Lesson::new(at(2_000), Some(contract_id));
    let earlier = Lesson::new(at(1_000), Some(contract_id));
    let (later_id, earlier_id) = (later.id, earlier.id);
    student.lessons = vec![later, earlier];

    let student = reconcile_at(student, at(10_000));

    assert!(!is_free(&student, earlier_id));
    assert!(is_free(&student, later_id));
    assert_eq!(student.lessons[0].id, earlier_id);
}

#[test]
fn orphan_lesson_keeps_its_flag() {
    let contract = package(3, 0);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let mut orphan = Lesson::new(at(0), Some(Uuid::new_v4()));
    orphan.is_free = true;
    let orphan_id = orphan.id;
    student.lessons.push(orphan);

    let student = reconcile_at(student, at(10_000));

    assert!(is_free(&student, orphan_id));
    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.consumed_lessons, 0);
    assert!(!contract.completed);
}

#[test]
fn unbilled_lessons_are_not_touched() {
    let contract = package(1, 0);
    let mut student = student_with(vec![contract]);
    let mut unbilled = Lesson::new(at(0), None);
    unbilled.is_free = true;
    let unbilled_id = unbilled.id;
    student.lessons.push(unbilled);

    let student = reconcile_at(student, at(10_000));

    assert!(is_free(&student, unbilled_id));
}

#[test]
fn missing_free_lessons_defaults_to_zero() {
    let mut contract = package(2, 0);
    contract.free_lessons = None;
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    let ids = add_lessons(&mut student, contract_id, 0, 3);

    let student = reconcile_at(student, at(10_000));

    let contract = student.contract(contract_id).unwrap();
    assert_eq!(contract.free_lessons, Some(0));
    assert_eq!(contract.paid_consumed, 3);
    assert!(!is_free(&student, ids[2]));
}

#[rstest]
#[case(0)]
#[case(3)]
fn zero_capacity_package_never_completes(#[case] lessons: i64) {
    let contract = package(0, 0);
    let contract_id = contract.id;
    let mut student = student_with(vec![contract]);
    add_lessons(&mut student, contract_id, 0, lessons);

    let student = reconcile_at(student, at(10_000));

    let contract = student.contract(contract_id).unwrap();
    assert!(!contract.completed);
    assert_eq!(contract.completed_at, None);
    assert_eq!(contract.consumed_lessons as i64, lessons);
}

#[test]
fn contracts_are_counted_independently() {
    let first = package(1, 1);
    let second = single();
    let (first_id, second_id) = (first.id, second.id);
    let mut student = student_with(vec![first, second]);
    let a = add_lessons(&mut student, first_id, 0, 2);
    let b = add_lessons(&mut student, second_id, 1, 1);

    let student = reconcile_at(student, at(10_000));

    assert!(!is_free(&student, a[0]));
    assert!(is_free(&student, a[1]));
    assert!(!is_free(&student, b[0]));
    assert!(student.contract(first_id).unwrap().completed);
    assert!(student.contract(second_id).unwrap().completed);
}

#[test]
fn latest_open_contract_skips_completed() {
    let mut old = package(2, 0);
    old.created_at = at(0);
    let mut newest = package(2, 0);
    newest.created_at = at(100);
    newest.completed = true;
    let old_id = old.id;
    let student = student_with(vec![old, newest]);

    assert_eq!(latest_open_contract(&student).map(|c| c.id), Some(old_id));
}

#[test]
fn latest_open_contract_picks_newest() {
    let mut old = package(2, 0);
    old.created_at = at(0);
    let mut newer = package(2, 0);
    newer.created_at = at(100);
    let newer_id = newer.id;
    let student = student_with(vec![newer, old]);

    assert_eq!(latest_open_contract(&student).map(|c| c.id), Some(newer_id));
}

#[test]
fn latest_open_contract_breaks_ties_by_id() {
    let mut a = package(2, 0);
    let mut b = package(2, 0);
    a.created_at = at(0);
    b.created_at = at(0);
    let expected = a.id.max(b.id);

    let student = student_with(vec![a.clone(), b.clone()]);
    assert_eq!(latest_open_contract(&student).map(|c| c.id), Some(expected));

    let student = student_with(vec![b, a]);
    assert_eq!(latest_open_contract(&student).map(|c| c.id), Some(expected));
}

#[test]
fn latest_open_contract_none_when_all_done() {
    let mut done = single();
    done.completed = true;
    assert!(latest_open_contract(&student_with(vec![done])).is_none());
    assert!(latest_open_contract(&student_with(vec![])).is_none());
}

#[rstest]
#[case::open(false, 2, 4, 0, 1)]
#[case::flagged(true, 2, 4, 0, 0)]
#[case::stale_flag(false, 5, 4, 1, 0)]
#[case::zero_capacity(false, 0, 0, 0, 1)]
fn active_count_uses_flag_or_counters(
    #[case] completed: bool,
    #[case] consumed: u32,
    #[case] total: u32,
    #[case] free: u32,
    #[case] expected: usize,
) {
    let mut contract = package(total, free);
    contract.completed = completed;
    contract.consumed_lessons = consumed;

    assert_eq!(active_contract_count(&student_with(vec![contract])), expected);
}

proptest! {
    /// The earliest `total` linked lessons are paid, the next `free` are free,
    /// and anything past capacity is paid again.
    #[test]
    fn package_slots_follow_chronology(
        total in 1u32..6,
        free in 0u32..4,
        extra in 0u32..4,
        seed in 0u64..1_000,
    ) {
        let contract = package(total, free);
        let contract_id = contract.id;
        let mut student = student_with(vec![contract]);
        let count = (total + free + extra) as i64;
        // Insert out of order so the engine has to sort.
        let mut offsets: Vec<i64> = (0..count).collect();
        offsets.rotate_left((seed % count as u64) as usize);
        offsets.reverse();
        for offset in offsets {
            student.lessons.push(Lesson::new(at(offset * 60), Some(contract_id)));
        }

        let student = reconcile_at(student, at(100_000));

        for (index, lesson) in student.lessons.iter().enumerate() {
            let index = index as u32;
            let expect_free = index >= total && index < total + free;
            prop_assert_eq!(lesson.is_free, expect_free);
        }
        let contract = student.contract(contract_id).unwrap();
        prop_assert_eq!(contract.free_consumed, free);
        prop_assert_eq!(contract.paid_consumed, total + extra);
        prop_assert_eq!(contract.paid_consumed + contract.free_consumed, contract.consumed_lessons);
        prop_assert!(contract.completed);
    }

    /// A single contract has capacity one whatever pack sizes it carries.
    #[test]
    fn single_contract_is_always_one_slot(
        stored_total in 0u32..20,
        stored_free in proptest::option::of(0u32..20),
        lessons in 1i64..6,
    ) {
        let mut contract = single();
        contract.total_lessons = stored_total;
        contract.free_lessons = stored_free;
        let contract_id = contract.id;
        let mut student = student_with(vec![contract]);
        add_lessons(&mut student, contract_id, 0, lessons);

        let student = reconcile_at(student, at(100_000));

        prop_assert!(student.lessons.iter().all(|l| !l.is_free));
        let contract = student.contract(contract_id).unwrap();
        prop_assert_eq!(contract.capacity(), 1);
        prop_assert_eq!(contract.paid_consumed as i64, lessons);
        prop_assert!(contract.completed);
    }
}
