//! services/api/src/adapters/json_store.rs
//!
//! The storage adapter: concrete implementation of the `StudentRepository`,
//! `OriginCatalog` and `PreferenceStore` ports from the core crate, backed by a
//! single JSON document on disk.
//!
//! The whole document is kept in memory behind a mutex. Every write builds the
//! next version of the document, persists it (temp file + rename) and only then
//! replaces the in-memory copy, so a failed write leaves both untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use tutor_desk_core::domain::{Settings, Student};
use tutor_desk_core::ports::{
    OriginCatalog, PortError, PortResult, PreferenceStore, StudentRepository,
};
use uuid::Uuid;

use crate::records::{SettingsRecord, StudentRecord};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Store document {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for PortError {
    fn from(err: StoreError) -> Self {
        PortError::Unexpected(err.to_string())
    }
}

//=========================================================================================
// The Persisted Document
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    students: Vec<StudentRecord>,
    #[serde(default)]
    origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history_cleared_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Opens the document at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store file yet, starting empty");
                StoreDocument::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the document and persists it.
    async fn write<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> PortResult<T>,
    ) -> PortResult<T> {
        let mut current = self.document.lock().await;
        let mut next = current.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *current = next;
        Ok(out)
    }

    async fn persist(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store saved");
        Ok(())
    }
}

fn student_not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Student {} not found", id))
}

//=========================================================================================
// `StudentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudentRepository for JsonFileStore {
    async fn list(&self) -> PortResult<Vec<Student>> {
        let document = self.document.lock().await;
        Ok(document
            .students
            .iter()
            .cloned()
            .map(StudentRecord::to_domain)
            .collect())
    }

    async fn load(&self, id: Uuid) -> PortResult<Student> {
        let document = self.document.lock().await;
        document
            .students
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .map(StudentRecord::to_domain)
            .ok_or_else(|| student_not_found(id))
    }

    async fn insert(&self, student: Student) -> PortResult<()> {
        self.insert_many(vec![student]).await
    }

    async fn insert_many(&self, students: Vec<Student>) -> PortResult<()> {
        self.write(|doc| {
            for student in students {
                if doc.students.iter().any(|s| s.id == student.id) {
                    return Err(PortError::Unexpected(format!(
                        "Student {} already exists",
                        student.id
                    )));
                }
                doc.students.push(StudentRecord::from_domain(student));
            }
            Ok(())
        })
        .await
    }

    async fn save(&self, student: Student) -> PortResult<()> {
        let id = student.id;
        self.write(|doc| {
            let slot = doc
                .students
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| student_not_found(id))?;
            *slot = StudentRecord::from_domain(student);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        self.write(|doc| {
            let before = doc.students.len();
            doc.students.retain(|s| s.id != id);
            if doc.students.len() == before {
                return Err(student_not_found(id));
            }
            Ok(())
        })
        .await
    }
}

//=========================================================================================
// `OriginCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl OriginCatalog for JsonFileStore {
    async fn list_origins(&self) -> PortResult<Vec<String>> {
        Ok(self.document.lock().await.origins.clone())
    }

    async fn add_origin(&self, name: &str) -> PortResult<Vec<String>> {
        let name = name.trim();
        {
            let document = self.document.lock().await;
            if name.is_empty() || document.origins.iter().any(|o| o == name) {
                return Ok(document.origins.clone());
            }
        }
        self.write(|doc| {
            if !doc.origins.iter().any(|o| o == name) {
                doc.origins.push(name.to_string());
            }
            Ok(doc.origins.clone())
        })
        .await
    }
}

//=========================================================================================
// `PreferenceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PreferenceStore for JsonFileStore {
    async fn settings(&self) -> PortResult<Settings> {
        let document = self.document.lock().await;
        Ok(document
            .settings
            .clone()
            .map(SettingsRecord::to_domain)
            .unwrap_or_default())
    }

    async fn save_settings(&self, settings: Settings) -> PortResult<()> {
        self.write(|doc| {
            doc.settings = Some(SettingsRecord::from_domain(settings));
            Ok(())
        })
        .await
    }

    async fn history_cleared_at(&self) -> PortResult<Option<DateTime<Utc>>> {
        Ok(self.document.lock().await.history_cleared_at)
    }

    async fn set_history_cleared_at(&self, at: DateTime<Utc>) -> PortResult<()> {
        self.write(|doc| {
            doc.history_cleared_at = Some(at);
            Ok(())
        })
        .await
    }
}
