//! Persistence contract.
//!
//! The tutor only ever loads a profile at session start and writes it back at
//! session end. [`ProfileStore`] captures that boundary; the storage engine
//! behind it is interchangeable. [`MemoryStore`] is the in-process
//! implementation used by tests and by callers that do not need durability.

use crate::path::{AdaptiveLearningPath, PathError};
use crate::student::{ModelError, StudentModel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed profile for `{student_id}`: {source}")]
    MalformedProfile {
        student_id: String,
        #[source]
        source: ModelError,
    },
    #[error("malformed learning path for `{student_id}`: {source}")]
    MalformedPath {
        student_id: String,
        #[source]
        source: PathError,
    },
    #[error("malformed record for `{student_id}`: {reason}")]
    MalformedRecord { student_id: String, reason: String },
    #[error("storage backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// One finished session, kept for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub student_id: String,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: f64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub knowledge_level: f64,
    pub engagement_level: f64,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Returns `Ok(None)` when no profile exists for `student_id`.
    async fn load(&self, student_id: &str) -> Result<Option<StudentModel>, StoreError>;

    /// Overwrites the stored profile.
    async fn save(&self, student: &StudentModel) -> Result<(), StoreError>;

    async fn load_path(&self, student_id: &str)
    -> Result<Option<AdaptiveLearningPath>, StoreError>;

    async fn save_path(
        &self,
        student_id: &str,
        path: &AdaptiveLearningPath,
    ) -> Result<(), StoreError>;

    async fn record_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Most recent sessions first.
    async fn recent_sessions(
        &self,
        student_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError>;
}

/// Loads the profile for `student_id`, or creates a fresh one if none exists.
pub async fn load_or_create(
    store: &dyn ProfileStore,
    student_id: &str,
) -> Result<StudentModel, StoreError> {
    match store.load(student_id).await? {
        Some(student) => {
            info!(student_id, sessions = student.session_count, "Loaded existing profile");
            Ok(student)
        }
        None => {
            info!(student_id, "Creating new profile");
            Ok(StudentModel::new(student_id))
        }
    }
}

/// Checks a profile read back from a store.
pub fn check_profile(student: StudentModel) -> Result<StudentModel, StoreError> {
    student
        .validate()
        .map_err(|source| StoreError::MalformedProfile {
            student_id: student.student_id.clone(),
            source,
        })?;
    Ok(student)
}

/// Checks a path read back from a store.
pub fn check_path(
    student_id: &str,
    path: AdaptiveLearningPath,
) -> Result<AdaptiveLearningPath, StoreError> {
    path.validate().map_err(|source| StoreError::MalformedPath {
        student_id: student_id.to_string(),
        source,
    })?;
    Ok(path)
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<String, StudentModel>>,
    paths: Mutex<HashMap<String, AdaptiveLearningPath>>,
    sessions: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self, student_id: &str) -> Result<Option<StudentModel>, StoreError> {
        let profiles = self.profiles.lock().await;
        profiles.get(student_id).cloned().map(check_profile).transpose()
    }

    async fn save(&self, student: &StudentModel) -> Result<(), StoreError> {
        self.profiles
            .lock()
            .await
            .insert(student.student_id.clone(), student.clone());
        Ok(())
    }

    async fn load_path(
        &self,
        student_id: &str,
    ) -> Result<Option<AdaptiveLearningPath>, StoreError> {
        let paths = self.paths.lock().await;
        paths
            .get(student_id)
            .cloned()
            .map(|path| check_path(student_id, path))
            .transpose()
    }

    async fn save_path(
        &self,
        student_id: &str,
        path: &AdaptiveLearningPath,
    ) -> Result<(), StoreError> {
        self.paths
            .lock()
            .await
            .insert(student_id.to_string(), path.clone());
        Ok(())
    }

    async fn record_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.sessions.lock().await.push(record.clone());
        Ok(())
    }

    async fn recent_sessions(
        &self,
        student_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.sessions.lock().await;
        let mut records: Vec<SessionRecord> = sessions
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.session_date.cmp(&a.session_date));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(student_id: &str, days_ago: i64) -> SessionRecord {
        SessionRecord {
            student_id: student_id.into(),
            session_date: Utc::now() - Duration::days(days_ago),
            duration_minutes: 20.0,
            questions_answered: 5,
            correct_answers: 4,
            knowledge_level: 0.6,
            engagement_level: 0.7,
        }
    }

    #[tokio::test]
    async fn test_load_or_create_new_profile() {
        let store = MemoryStore::new();
        let student = load_or_create(&store, "newcomer").await.unwrap();
        assert_eq!(student, StudentModel::new("newcomer"));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let store = MemoryStore::new();
        let mut student = StudentModel::new("alice");
        student.record_answer(true, "System Calls");
        student.learning_goals.push("Pass Operating Systems Exam".into());
        store.save(&student).await.unwrap();

        let loaded = load_or_create(&store, "alice").await.unwrap();
        assert_eq!(loaded, student);
    }

    #[tokio::test]
    async fn test_malformed_profile_is_rejected() {
        let store = MemoryStore::new();
        let mut student = StudentModel::new("broken");
        student.cognitive.knowledge_level = 1.5;
        store.save(&student).await.unwrap();

        let err = store.load("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedProfile { .. }));
    }

    #[tokio::test]
    async fn test_recent_sessions_newest_first() {
        let store = MemoryStore::new();
        store.record_session(&record("alice", 3)).await.unwrap();
        store.record_session(&record("alice", 1)).await.unwrap();
        store.record_session(&record("bob", 0)).await.unwrap();
        store.record_session(&record("alice", 2)).await.unwrap();

        let recent = store.recent_sessions("alice", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].session_date > recent[1].session_date);
        assert!(recent.iter().all(|r| r.student_id == "alice"));
    }

    #[tokio::test]
    async fn test_path_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load_path("alice").await.unwrap().is_none());
        let path = AdaptiveLearningPath::from_flashcards(&[crate::material::Flashcard::new("q", "a")]);
        store.save_path("alice", &path).await.unwrap();
        assert_eq!(store.load_path("alice").await.unwrap(), Some(path));
    }
}
