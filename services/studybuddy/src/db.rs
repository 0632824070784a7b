//! Data Access Layer
//!
//! SQLite persistence for student profiles, learning paths and session
//! history. Set-valued fields are stored as JSON text and timestamps as
//! RFC 3339 text; every record is validated on the way out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use studybuddy_core::path::AdaptiveLearningPath;
use studybuddy_core::store::{ProfileStore, SessionRecord, StoreError, check_path, check_profile};
use studybuddy_core::student::{
    AffectiveModel, CognitiveModel, LearningStyleModel, StudentModel,
};
use tracing::debug;

/// A wrapper around the `SqlitePool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL '{}'", url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn malformed(student_id: &str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::MalformedRecord {
        student_id: student_id.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(student_id: &str, text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| malformed(student_id, format!("bad timestamp '{}': {}", text, e)))
}

fn json_field<T: DeserializeOwned>(row: &SqliteRow, student_id: &str, column: &str) -> Result<T, StoreError> {
    let text: String = row.try_get(column).context("Failed to read column")?;
    serde_json::from_str(&text).map_err(|e| malformed(student_id, format!("{}: {}", column, e)))
}

fn count_field(row: &SqliteRow, student_id: &str, column: &str) -> Result<u32, StoreError> {
    let value: i64 = row.try_get(column).context("Failed to read column")?;
    u32::try_from(value).map_err(|_| malformed(student_id, format!("{} = {}", column, value)))
}

fn real_field(row: &SqliteRow, column: &str) -> Result<f64, StoreError> {
    Ok(row.try_get(column).context("Failed to read column")?)
}

fn parse_profile(row: &SqliteRow) -> Result<StudentModel, StoreError> {
    let student_id: String = row.try_get("student_id").context("Failed to read column")?;
    let id = student_id.as_str();

    let last_session = row
        .try_get::<Option<String>, _>("last_session")
        .context("Failed to read column")?
        .map(|text| parse_timestamp(id, &text))
        .transpose()?;

    Ok(StudentModel {
        cognitive: CognitiveModel {
            knowledge_level: real_field(row, "knowledge_level")?,
            metacognition_score: real_field(row, "metacognition_score")?,
            attention_span: real_field(row, "attention_span")?,
            correct_answers: count_field(row, id, "correct_answers")?,
            total_answers: count_field(row, id, "total_answers")?,
            mastered_topics: json_field(row, id, "mastered_topics")?,
            struggling_topics: json_field(row, id, "struggling_topics")?,
            topic_stats: json_field(row, id, "topic_stats")?,
        },
        affective: AffectiveModel {
            motivation_level: real_field(row, "motivation_level")?,
            self_efficacy: real_field(row, "self_efficacy")?,
            engagement_level: real_field(row, "engagement_level")?,
            frustration_level: real_field(row, "frustration_level")?,
            response_count: count_field(row, id, "response_count")?,
        },
        learning_style: LearningStyleModel {
            active_reflective: real_field(row, "active_reflective")?,
            sensing_intuitive: real_field(row, "sensing_intuitive")?,
            visual_verbal: real_field(row, "visual_verbal")?,
            sequential_global: real_field(row, "sequential_global")?,
        },
        session_count: count_field(row, id, "session_count")?,
        total_study_time: real_field(row, "total_study_time")?,
        last_session,
        learning_goals: json_field(row, id, "learning_goals")?,
        student_id,
    })
}

fn parse_session(row: &SqliteRow) -> Result<SessionRecord, StoreError> {
    let student_id: String = row.try_get("student_id").context("Failed to read column")?;
    let session_date: String = row.try_get("session_date").context("Failed to read column")?;
    Ok(SessionRecord {
        session_date: parse_timestamp(&student_id, &session_date)?,
        duration_minutes: real_field(row, "duration_minutes")?,
        questions_answered: count_field(row, &student_id, "questions_answered")?,
        correct_answers: count_field(row, &student_id, "correct_answers")?,
        knowledge_level: real_field(row, "knowledge_level")?,
        engagement_level: real_field(row, "engagement_level")?,
        student_id,
    })
}

#[async_trait]
impl ProfileStore for Db {
    async fn load(&self, student_id: &str) -> Result<Option<StudentModel>, StoreError> {
        let row = sqlx::query("SELECT * FROM student_profiles WHERE student_id = ?")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load student profile")?;

        let Some(row) = row else { return Ok(None) };
        check_profile(parse_profile(&row)?).map(Some)
    }

    async fn save(&self, student: &StudentModel) -> Result<(), StoreError> {
        let cognitive = &student.cognitive;
        let affective = &student.affective;
        let style = &student.learning_style;

        sqlx::query(
            r#"
            INSERT INTO student_profiles (
                student_id, knowledge_level, metacognition_score, attention_span,
                correct_answers, total_answers, mastered_topics, struggling_topics, topic_stats,
                motivation_level, self_efficacy, engagement_level, frustration_level, response_count,
                active_reflective, sensing_intuitive, visual_verbal, sequential_global,
                session_count, total_study_time, last_session, learning_goals
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(student_id) DO UPDATE SET
                knowledge_level = excluded.knowledge_level,
                metacognition_score = excluded.metacognition_score,
                attention_span = excluded.attention_span,
                correct_answers = excluded.correct_answers,
                total_answers = excluded.total_answers,
                mastered_topics = excluded.mastered_topics,
                struggling_topics = excluded.struggling_topics,
                topic_stats = excluded.topic_stats,
                motivation_level = excluded.motivation_level,
                self_efficacy = excluded.self_efficacy,
                engagement_level = excluded.engagement_level,
                frustration_level = excluded.frustration_level,
                response_count = excluded.response_count,
                active_reflective = excluded.active_reflective,
                sensing_intuitive = excluded.sensing_intuitive,
                visual_verbal = excluded.visual_verbal,
                sequential_global = excluded.sequential_global,
                session_count = excluded.session_count,
                total_study_time = excluded.total_study_time,
                last_session = excluded.last_session,
                learning_goals = excluded.learning_goals,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&student.student_id)
        .bind(cognitive.knowledge_level)
        .bind(cognitive.metacognition_score)
        .bind(cognitive.attention_span)
        .bind(i64::from(cognitive.correct_answers))
        .bind(i64::from(cognitive.total_answers))
        .bind(serde_json::to_string(&cognitive.mastered_topics).context("Failed to encode topics")?)
        .bind(serde_json::to_string(&cognitive.struggling_topics).context("Failed to encode topics")?)
        .bind(serde_json::to_string(&cognitive.topic_stats).context("Failed to encode topic stats")?)
        .bind(affective.motivation_level)
        .bind(affective.self_efficacy)
        .bind(affective.engagement_level)
        .bind(affective.frustration_level)
        .bind(i64::from(affective.response_count))
        .bind(style.active_reflective)
        .bind(style.sensing_intuitive)
        .bind(style.visual_verbal)
        .bind(style.sequential_global)
        .bind(i64::from(student.session_count))
        .bind(student.total_study_time)
        .bind(student.last_session.as_ref().map(timestamp))
        .bind(serde_json::to_string(&student.learning_goals).context("Failed to encode goals")?)
        .execute(&self.pool)
        .await
        .context("Failed to save student profile")?;

        debug!(student_id = %student.student_id, "Profile saved");
        Ok(())
    }

    async fn load_path(
        &self,
        student_id: &str,
    ) -> Result<Option<AdaptiveLearningPath>, StoreError> {
        let row = sqlx::query("SELECT state_json FROM learning_paths WHERE student_id = ?")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load learning path")?;

        let Some(row) = row else { return Ok(None) };
        let path: AdaptiveLearningPath = json_field(&row, student_id, "state_json")?;
        check_path(student_id, path).map(Some)
    }

    async fn save_path(
        &self,
        student_id: &str,
        path: &AdaptiveLearningPath,
    ) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(path).context("Failed to encode learning path")?;
        sqlx::query(
            r#"
            INSERT INTO learning_paths (student_id, state_json) VALUES (?, ?)
            ON CONFLICT(student_id) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(student_id)
        .bind(state_json)
        .execute(&self.pool)
        .await
        .context("Failed to save learning path")?;
        Ok(())
    }

    async fn record_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_history (
                student_id, session_date, duration_minutes, questions_answered,
                correct_answers, knowledge_level, engagement_level
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.student_id)
        .bind(timestamp(&record.session_date))
        .bind(record.duration_minutes)
        .bind(i64::from(record.questions_answered))
        .bind(i64::from(record.correct_answers))
        .bind(record.knowledge_level)
        .bind(record.engagement_level)
        .execute(&self.pool)
        .await
        .context("Failed to record session")?;
        Ok(())
    }

    async fn recent_sessions(
        &self,
        student_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT * FROM session_history
            WHERE student_id = ?
            ORDER BY session_date DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load session history")?;

        rows.iter().map(parse_session).collect()
    }
}
