//! crates/tutor_desk_core/src/service/mod.rs
//!
//! The student desk: every create/update/delete on students, lessons and
//! contracts goes through here. Each mutation loads the student aggregate,
//! applies the change, reconciles billing and writes the aggregate back.
//! Writers are serialized by the desk so no load/save cycle interleaves
//! with another.

mod error;
mod inputs;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::{active_contract_count, latest_open_contract, reconcile};
use crate::domain::{Contract, ContractMode, Lesson, Settings, Student, DEFAULT_ORIGIN};
use crate::ports::{PortError, PreferenceStore, StudentRepository};

pub use error::{DeskError, DeskResult};
pub use inputs::{
    ContractPatch, LessonPatch, NewContract, NewLesson, NewStudent, SettingsPatch, StudentPatch,
    TrackingPatch,
};

/// A student together with the number of contracts still running.
#[derive(Debug, Clone)]
pub struct StudentOverview {
    pub student: Student,
    pub active_contracts: usize,
}

pub struct StudentDesk {
    repo: Arc<dyn StudentRepository>,
    prefs: Arc<dyn PreferenceStore>,
    /// Held for the whole load, mutate, save cycle of every write.
    write_lock: Mutex<()>,
}

impl StudentDesk {
    pub fn new(repo: Arc<dyn StudentRepository>, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            repo,
            prefs,
            write_lock: Mutex::new(()),
        }
    }

    //=====================================================================================
    // Students
    //=====================================================================================

    /// All students with their active contract count, sorted by last then first name.
    pub async fn list_students(&self) -> DeskResult<Vec<StudentOverview>> {
        let mut overviews: Vec<StudentOverview> = self
            .repo
            .list()
            .await?
            .into_iter()
            .map(|student| StudentOverview {
                active_contracts: active_contract_count(&student),
                student,
            })
            .collect();

        overviews.sort_by(|a, b| {
            let (a, b) = (&a.student, &b.student);
            a.last_name
                .to_lowercase()
                .cmp(&b.last_name.to_lowercase())
                .then_with(|| a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()))
        });
        Ok(overviews)
    }

    /// Reconciled view of one student, lessons newest first. Nothing is written.
    pub async fn get_student(&self, id: Uuid) -> DeskResult<Student> {
        let mut student = reconcile(self.load_student(id).await?);
        student.sort_lessons_newest_first();
        Ok(student)
    }

    pub async fn create_student(&self, input: NewStudent) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let student = build_student(input);
        self.repo.insert(student.clone()).await?;
        info!(student_id = %student.id, "student created");
        Ok(student)
    }

    pub async fn update_student(&self, id: Uuid, patch: StudentPatch) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(id).await?;
        let reconcile_after = patch.touches_billing();

        if let Some(first_name) = patch.first_name {
            student.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            student.last_name = last_name;
        }
        if let Some(description) = patch.description {
            student.description = description;
        }
        if let Some(email) = patch.email {
            student.email = email;
        }
        if let Some(is_active) = patch.is_active {
            student.is_active = is_active;
        }
        if let Some(photo) = patch.photo {
            student.photo = photo;
        }
        if let Some(origin) = patch.origin {
            student.origin = origin;
        }
        patch.tracking.apply(&mut student.tracking);
        if let Some(lessons) = patch.lessons {
            student.lessons = lessons;
        }
        if let Some(contracts) = patch.billing_history {
            student.billing_history = contracts;
        }
        student.updated_at = Some(Utc::now());

        if reconcile_after {
            student = reconcile(student);
        }
        self.save_student(student.clone()).await?;
        info!(student_id = %id, "student updated");
        Ok(student)
    }

    /// Hard delete. The student's lessons and contracts go with it.
    pub async fn delete_student(&self, id: Uuid) -> DeskResult<Uuid> {
        let _guard = self.write_lock.lock().await;
        self.repo.delete(id).await.map_err(|e| not_found_as(e, DeskError::StudentNotFound(id)))?;
        info!(student_id = %id, "student deleted");
        Ok(id)
    }

    /// Creates one student per row, skipping rows without any name.
    pub async fn import_students(&self, rows: Vec<NewStudent>) -> DeskResult<usize> {
        let _guard = self.write_lock.lock().await;
        let students: Vec<Student> = rows
            .into_iter()
            .filter(|row| !(row.first_name.trim().is_empty() && row.last_name.trim().is_empty()))
            .map(|row| {
                build_student(NewStudent {
                    first_name: row.first_name.trim().to_string(),
                    last_name: row.last_name.trim().to_string(),
                    description: row.description.trim().to_string(),
                    email: row.email.trim().to_string(),
                    ..row
                })
            })
            .collect();

        let count = students.len();
        self.repo.insert_many(students).await?;
        info!(count, "students imported");
        Ok(count)
    }

    /// Empties the activity feed: forgets every `updated_at` stamp and
    /// records a cutoff hiding older events.
    pub async fn clear_history(&self) -> DeskResult<DateTime<Utc>> {
        let _guard = self.write_lock.lock().await;
        let cleared_at = Utc::now();
        for mut student in self.repo.list().await? {
            student.updated_at = None;
            for lesson in &mut student.lessons {
                lesson.updated_at = None;
            }
            self.repo.save(student).await?;
        }
        self.prefs.set_history_cleared_at(cleared_at).await?;
        info!(%cleared_at, "activity history cleared");
        Ok(cleared_at)
    }

    pub async fn history_cleared_at(&self) -> DeskResult<Option<DateTime<Utc>>> {
        Ok(self.prefs.history_cleared_at().await?)
    }

    //=====================================================================================
    // Settings
    //=====================================================================================

    pub async fn settings(&self) -> DeskResult<Settings> {
        Ok(self.prefs.settings().await?)
    }

    /// Merges the given fields into the stored settings.
    pub async fn update_settings(&self, patch: SettingsPatch) -> DeskResult<Settings> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.prefs.settings().await?;

        if let Some(theme) = patch.theme {
            settings.theme = theme;
        }
        if let Some(lesson_duration) = patch.lesson_duration {
            if lesson_duration == 0 {
                return Err(DeskError::InvalidInput(
                    "lesson duration must be at least one minute".to_string(),
                ));
            }
            settings.lesson_duration = lesson_duration;
        }
        if let Some(currency) = patch.currency {
            let currency = currency.trim();
            if currency.is_empty() {
                return Err(DeskError::InvalidInput("currency cannot be blank".to_string()));
            }
            settings.currency = currency.to_string();
        }
        if let Some(filter) = patch.default_student_filter {
            settings.default_student_filter = filter;
        }

        self.prefs.save_settings(settings.clone()).await?;
        info!("settings saved");
        Ok(settings)
    }

    //=====================================================================================
    // Lessons
    //=====================================================================================

    /// Adds a lesson. Without an explicit contract it is billed to the most
    /// recently created contract that is still open, if any.
    pub async fn add_lesson(&self, student_id: Uuid, input: NewLesson) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;

        let billing_id = input
            .billing_id
            .or_else(|| latest_open_contract(&student).map(|c| c.id));
        if let Some(contract_id) = billing_id {
            if student.contract(contract_id).is_none() {
                warn!(%student_id, %contract_id, "lesson billed to an unknown contract");
            }
        }

        let mut lesson = Lesson::new(input.created_at.unwrap_or_else(Utc::now), billing_id);
        lesson.comment = input.comment;
        lesson.homework = input.homework;
        lesson.tags = input.tags;
        let lesson_id = lesson.id;
        student.lessons.push(lesson);

        let mut student = reconcile(student);
        self.save_student(student.clone()).await?;
        info!(%student_id, %lesson_id, "lesson added");

        student.sort_lessons_newest_first();
        Ok(student)
    }

    pub async fn update_lesson(
        &self,
        student_id: Uuid,
        lesson_id: Uuid,
        patch: LessonPatch,
    ) -> DeskResult<Lesson> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;
        let reconcile_after = patch.touches_billing();

        let lesson = student
            .lessons
            .iter_mut()
            .find(|l| l.id == lesson_id)
            .ok_or(DeskError::LessonNotFound(lesson_id))?;
        if let Some(created_at) = patch.created_at {
            lesson.created_at = created_at;
        }
        if let Some(comment) = patch.comment {
            lesson.comment = comment;
        }
        if let Some(homework) = patch.homework {
            lesson.homework = homework;
        }
        if let Some(tags) = patch.tags {
            lesson.tags = tags;
        }
        if let Some(billing_id) = patch.billing_id {
            lesson.billing_id = billing_id;
        }
        lesson.updated_at = Some(Utc::now());

        if reconcile_after {
            student = reconcile(student);
        }
        let updated = student
            .lesson(lesson_id)
            .cloned()
            .ok_or(DeskError::LessonNotFound(lesson_id))?;
        self.save_student(student).await?;
        info!(%student_id, %lesson_id, "lesson updated");
        Ok(updated)
    }

    /// Hard delete, then recount the contracts the lesson was using.
    pub async fn delete_lesson(&self, student_id: Uuid, lesson_id: Uuid) -> DeskResult<Uuid> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;
        let before = student.lessons.len();
        student.lessons.retain(|l| l.id != lesson_id);
        if student.lessons.len() == before {
            return Err(DeskError::LessonNotFound(lesson_id));
        }

        self.save_student(reconcile(student)).await?;
        info!(%student_id, %lesson_id, "lesson deleted");
        Ok(lesson_id)
    }

    //=====================================================================================
    // Contracts
    //=====================================================================================

    pub async fn add_contract(&self, student_id: Uuid, input: NewContract) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;
        let contract = build_contract(input, &self.prefs.settings().await?);
        validate_contract(&contract)?;
        let contract_id = contract.id;
        student.billing_history.push(contract);

        let student = reconcile(student);
        self.save_student(student.clone()).await?;
        info!(%student_id, %contract_id, "contract added");
        Ok(student)
    }

    pub async fn update_contract(
        &self,
        student_id: Uuid,
        contract_id: Uuid,
        patch: ContractPatch,
    ) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;
        let contract = student
            .billing_history
            .iter_mut()
            .find(|c| c.id == contract_id)
            .ok_or(DeskError::ContractNotFound(contract_id))?;
        apply_contract_patch(contract, patch);
        validate_contract(contract)?;

        let student = reconcile(student);
        self.save_student(student.clone()).await?;
        info!(%student_id, %contract_id, "contract updated");
        Ok(student)
    }

    /// Removes the contract only. Lessons billed to it keep their now
    /// dangling `billing_id`.
    pub async fn delete_contract(&self, student_id: Uuid, contract_id: Uuid) -> DeskResult<Student> {
        let _guard = self.write_lock.lock().await;
        let mut student = self.load_student(student_id).await?;
        let before = student.billing_history.len();
        student.billing_history.retain(|c| c.id != contract_id);
        if student.billing_history.len() == before {
            return Err(DeskError::ContractNotFound(contract_id));
        }

        let student = reconcile(student);
        self.save_student(student.clone()).await?;
        info!(%student_id, %contract_id, "contract deleted");
        Ok(student)
    }

    //=====================================================================================
    // Repository helpers
    //=====================================================================================

    async fn load_student(&self, id: Uuid) -> DeskResult<Student> {
        self.repo
            .load(id)
            .await
            .map_err(|e| not_found_as(e, DeskError::StudentNotFound(id)))
    }

    async fn save_student(&self, student: Student) -> DeskResult<()> {
        let id = student.id;
        self.repo
            .save(student)
            .await
            .map_err(|e| not_found_as(e, DeskError::StudentNotFound(id)))
    }
}

fn not_found_as(err: PortError, not_found: DeskError) -> DeskError {
    match err {
        PortError::NotFound(_) => not_found,
        other => DeskError::Port(other),
    }
}

fn build_student(input: NewStudent) -> Student {
    let origin = input
        .origin
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());

    let mut student = Student::new(input.first_name, input.last_name);
    student.description = input.description;
    student.email = input.email;
    student.is_active = input.is_active;
    student.photo = input.photo;
    student.origin = origin;
    student.tracking = input.tracking;
    student
}

/// Lesson length and currency fall back to the desk settings.
fn build_contract(input: NewContract, settings: &Settings) -> Contract {
    let mut contract = Contract::new(input.mode, input.total_lessons, input.free_lessons);
    contract.display_name = input.display_name;
    contract.duration_minutes = input.duration_minutes.unwrap_or(settings.lesson_duration);
    contract.custom_duration = input.custom_duration;
    contract.price_per_lesson = input.price_per_lesson;
    contract.currency = input.currency.or_else(|| Some(settings.currency.clone()));
    contract.paid = input.paid;
    contract.notes = input.notes;
    contract.start_date = input.start_date;
    contract.end_date = input.end_date;
    force_single_shape(&mut contract);
    contract
}

fn apply_contract_patch(contract: &mut Contract, patch: ContractPatch) {
    if let Some(display_name) = patch.display_name {
        contract.display_name = display_name;
    }
    if let Some(mode) = patch.mode {
        contract.mode = mode;
    }
    if let Some(total_lessons) = patch.total_lessons {
        contract.total_lessons = total_lessons;
    }
    if let Some(free_lessons) = patch.free_lessons {
        contract.free_lessons = Some(free_lessons);
    }
    if let Some(duration_minutes) = patch.duration_minutes {
        contract.duration_minutes = duration_minutes;
    }
    if let Some(custom_duration) = patch.custom_duration {
        contract.custom_duration = custom_duration;
    }
    if let Some(price) = patch.price_per_lesson {
        contract.price_per_lesson = price;
    }
    if let Some(currency) = patch.currency {
        contract.currency = currency;
    }
    if let Some(paid) = patch.paid {
        contract.paid = paid;
    }
    if let Some(notes) = patch.notes {
        contract.notes = notes;
    }
    if let Some(start_date) = patch.start_date {
        contract.start_date = start_date;
    }
    if let Some(end_date) = patch.end_date {
        contract.end_date = end_date;
    }
    force_single_shape(contract);
}

/// A single lesson is stored as a one-lesson pack with no bonus.
fn force_single_shape(contract: &mut Contract) {
    if contract.mode == ContractMode::Single {
        contract.total_lessons = 1;
        contract.free_lessons = Some(0);
    }
}

fn validate_contract(contract: &Contract) -> DeskResult<()> {
    if contract.mode == ContractMode::Package && contract.total_lessons == 0 {
        return Err(DeskError::InvalidInput(
            "a lesson pack needs at least one paid lesson".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (contract.start_date, contract.end_date) {
        if end < start {
            return Err(DeskError::InvalidInput(format!(
                "contract ends ({end}) before it starts ({start})"
            )));
        }
    }
    Ok(())
}
