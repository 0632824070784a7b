//! StudyBuddy Agent Service
//!
//! Exposes a live [`TutorSession`] as Model Context Protocol tools, so an
//! external assistant can read the student model and feed graded answers back
//! into it. Tools return JSON or a short status line; failures come back as
//! tool errors rather than protocol errors.

use crate::analyzer::{Interaction, ResponseAnalyzer, TurnSignals, Verdict};
use crate::session::TutorSession;
use crate::store::ProfileStore;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

// --- Tool Arguments ---

#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecordAnswerArgs {
    #[schemars(description = "Whether the student's answer was correct")]
    pub was_correct: bool,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct UpdateLearningMetricsArgs {
    #[schemars(description = "The student's response, verbatim")]
    pub response_text: String,
    #[schemars(description = "Seconds the student took to respond")]
    pub response_time_secs: f64,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct EvaluateAnswerArgs {
    #[schemars(description = "The question the student was asked")]
    pub question: String,
    #[schemars(description = "The student's answer")]
    pub answer: String,
    #[schemars(description = "The tutor's feedback on the answer")]
    pub tutor_reply: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SessionHistoryArgs {
    #[schemars(description = "Maximum number of sessions to return (default: 10)")]
    pub limit: Option<usize>,
}

const DEFAULT_HISTORY_LIMIT: usize = 10;

// --- Tool Results ---

#[derive(Serialize, Debug)]
struct LearningMetrics<'a> {
    knowledge_level: f64,
    accuracy: Option<f64>,
    session_answers: u32,
    session_correct: u32,
    motivation_level: f64,
    self_efficacy: f64,
    engagement_level: f64,
    frustration_level: f64,
    dominant_styles: Vec<&'static str>,
    current_topic: &'a str,
    current_node_index: usize,
    path_length: usize,
}

#[derive(Serialize, Debug)]
struct SkillProgress<'a> {
    name: &'a str,
    mastery_level: f64,
    unlocked: bool,
}

#[derive(Serialize, Debug)]
struct GoalProgress<'a> {
    goal_name: &'a str,
    progress: f64,
    skills: Vec<SkillProgress<'a>>,
    available: Vec<&'a str>,
}

// --- Service and Handler Implementation ---

/// MCP service over one student's session.
pub struct StudyBuddyService {
    /// Shared session state; the owner persists it once the transport closes.
    pub session: Arc<Mutex<TutorSession>>,
    store: Arc<dyn ProfileStore>,
    analyzer: ResponseAnalyzer,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for StudyBuddyService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Adaptive tutoring state. Call get_directives before answering the student, \
                 update_learning_metrics after each student message, and record_answer once \
                 their answer has been graded. evaluate_answer can do the grading."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Failed to serialize result: {}", e))
}

#[tool_router]
impl StudyBuddyService {
    pub fn new(
        session: Arc<Mutex<TutorSession>>,
        store: Arc<dyn ProfileStore>,
        analyzer: ResponseAnalyzer,
    ) -> Self {
        Self {
            session,
            store,
            analyzer,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the full student profile: cognitive, affective and learning-style models.")]
    pub async fn get_student_profile(&self) -> Result<String, String> {
        info!("Executing tool 'get_student_profile'");
        let session = self.session.lock().await;
        to_json(session.student())
    }

    #[tool(description = "Get a compact view of the student's current learning metrics and position on the learning path.")]
    pub async fn get_learning_metrics(&self) -> Result<String, String> {
        info!("Executing tool 'get_learning_metrics'");
        let session = self.session.lock().await;
        let student = session.student();
        to_json(&LearningMetrics {
            knowledge_level: student.cognitive.knowledge_level,
            accuracy: student.cognitive.accuracy(),
            session_answers: session.answers_given(),
            session_correct: session.correct_answers(),
            motivation_level: student.affective.motivation_level,
            self_efficacy: student.affective.self_efficacy,
            engagement_level: student.affective.engagement_level,
            frustration_level: student.affective.frustration_level,
            dominant_styles: student.learning_style.dominant_styles(),
            current_topic: session.current_topic(),
            current_node_index: session.path().current_node_index(),
            path_length: session.path().len(),
        })
    }

    #[tool(description = "Record whether the student's last answer was correct. Updates knowledge, motivation, skills and the learning path.")]
    pub async fn record_answer(&self, args: Parameters<RecordAnswerArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'record_answer'");
        let mut session = self.session.lock().await;
        let verdict = if args.0.was_correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        };
        let update = session.apply_verdict(verdict).map_err(|e| e.to_string())?;
        let knowledge = session.student().cognitive.knowledge_level;

        Ok(match update {
            Some(update) if update.remediated_to.is_some() => format!(
                "OK. Knowledge level {:.2}. Stepping back to '{}' for review.",
                knowledge,
                session.current_topic()
            ),
            Some(update) if update.completed_node.is_some() => format!(
                "OK. Knowledge level {:.2}. Topic complete; now on '{}'.",
                knowledge,
                session.current_topic()
            ),
            _ => format!("OK. Knowledge level {:.2}.", knowledge),
        })
    }

    #[tool(description = "Judge whether a student's answer was correct without updating their profile. Returns correct, incorrect or unclear.")]
    pub async fn evaluate_answer(&self, args: Parameters<EvaluateAnswerArgs>) -> Result<String, String> {
        info!("Executing tool 'evaluate_answer'");
        let EvaluateAnswerArgs {
            question,
            answer,
            tutor_reply,
        } = args.0;
        let verdict = self
            .analyzer
            .judge(&Interaction {
                question,
                student_text: answer,
                tutor_reply,
                elapsed: Duration::ZERO,
            })
            .await;
        Ok(match verdict {
            Verdict::Correct => "correct",
            Verdict::Incorrect => "incorrect",
            Verdict::Unclear => "unclear",
        }
        .to_string())
    }

    #[tool(description = "Update engagement, frustration and learning-style estimates from the student's latest response.")]
    pub async fn update_learning_metrics(
        &self,
        args: Parameters<UpdateLearningMetricsArgs>,
    ) -> Result<String, String> {
        info!(
            response_length = args.0.response_text.len(),
            response_time_secs = args.0.response_time_secs,
            "Executing tool 'update_learning_metrics'"
        );
        let elapsed = Duration::try_from_secs_f64(args.0.response_time_secs).map_err(|_| {
            format!(
                "Invalid response_time_secs: {}",
                args.0.response_time_secs
            )
        })?;
        let turn = TurnSignals::from_utterance(&args.0.response_text, elapsed);
        let mut session = self.session.lock().await;
        session.apply_turn(&turn);
        let affective = &session.student().affective;
        Ok(format!(
            "OK. Engagement {:.2}, frustration {:.2}, {} style cue(s).",
            affective.engagement_level,
            affective.frustration_level,
            turn.style.len()
        ))
    }

    #[tool(description = "Get the next question on the student's learning path.")]
    pub async fn get_next_question(&self) -> Result<String, String> {
        info!("Executing tool 'get_next_question'");
        let session = self.session.lock().await;
        match session.path().next_question() {
            Some(card) => to_json(card),
            None if session.path().is_empty() => Ok("No study material loaded.".to_string()),
            None => Ok("Learning path complete. No questions left.".to_string()),
        }
    }

    #[tool(description = "Get the teaching directives derived from the current student model.")]
    pub async fn get_directives(&self) -> Result<String, String> {
        info!("Executing tool 'get_directives'");
        let session = self.session.lock().await;
        let directives = session.directives();
        Ok(format!(
            "{}\n{}",
            directives.progress.render(),
            directives.render_instructions()
        ))
    }

    #[tool(description = "Get the student's most recent finished sessions, newest first.")]
    pub async fn get_session_history(
        &self,
        args: Parameters<SessionHistoryArgs>,
    ) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'get_session_history'");
        let limit = args.0.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let student_id = self.session.lock().await.student().student_id.clone();
        let records = self
            .store
            .recent_sessions(&student_id, limit)
            .await
            .map_err(|e| format!("Failed to load session history: {}", e))?;
        to_json(&records)
    }

    #[tool(description = "Get progress towards the student's learning goal, per skill.")]
    pub async fn get_goal_progress(&self) -> Result<String, String> {
        info!("Executing tool 'get_goal_progress'");
        let session = self.session.lock().await;
        let goal = session.goal();
        to_json(&GoalProgress {
            goal_name: &goal.goal_name,
            progress: goal.progress(),
            skills: goal
                .required_skills
                .iter()
                .map(|skill| SkillProgress {
                    name: &skill.name,
                    mastery_level: skill.mastery_level,
                    unlocked: skill.is_unlocked(&goal.required_skills),
                })
                .collect(),
            available: goal
                .available_skills()
                .into_iter()
                .map(|skill| skill.name.as_str())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MockAnswerEvaluator;
    use crate::material::Flashcard;
    use crate::path::AdaptiveLearningPath;
    use crate::store::{MemoryStore, SessionRecord};
    use crate::student::StudentModel;
    use chrono::{Duration as ChronoDuration, Utc};

    fn service() -> StudyBuddyService {
        service_with(Arc::new(MemoryStore::new()), ResponseAnalyzer::default())
    }

    fn service_with(store: Arc<dyn ProfileStore>, analyzer: ResponseAnalyzer) -> StudyBuddyService {
        let path = AdaptiveLearningPath::from_flashcards(&[
            Flashcard::new("What is a system call?", "A request to the kernel")
                .with_topic("System Calls")
                .with_difficulty(0.2),
            Flashcard::new("What does fork() return in the child?", "0")
                .with_topic("Process Management")
                .with_difficulty(0.4),
        ]);
        let session = TutorSession::start(StudentModel::new("mcp-student"), path, Utc::now());
        StudyBuddyService::new(Arc::new(Mutex::new(session)), store, analyzer)
    }

    #[tokio::test]
    async fn test_get_student_profile() {
        let service = service();
        let json = service.get_student_profile().await.unwrap();
        let profile: StudentModel = serde_json::from_str(&json).unwrap();
        assert_eq!(profile.student_id, "mcp-student");
        assert_eq!(profile.session_count, 1);
    }

    #[tokio::test]
    async fn test_record_answer_advances_path() {
        let service = service();
        let reply = service
            .record_answer(Parameters(RecordAnswerArgs { was_correct: true }))
            .await
            .unwrap();
        assert!(reply.contains("now on 'Process Management'"), "{reply}");

        let session = service.session.lock().await;
        assert_eq!(session.answers_given(), 1);
        assert!(session.student().cognitive.mastered_topics.contains("System Calls"));
    }

    #[tokio::test]
    async fn test_update_learning_metrics() {
        let service = service();
        let reply = service
            .update_learning_metrics(Parameters(UpdateLearningMetricsArgs {
                response_text: "ok".into(),
                response_time_secs: 40.0,
            }))
            .await
            .unwrap();
        assert!(reply.starts_with("OK."));

        let session = service.session.lock().await;
        let affective = &session.student().affective;
        assert!(affective.engagement_level < 0.7);
        assert!(affective.frustration_level > 0.3);
    }

    #[tokio::test]
    async fn test_update_learning_metrics_rejects_negative_time() {
        let service = service();
        let err = service
            .update_learning_metrics(Parameters(UpdateLearningMetricsArgs {
                response_text: "a long enough answer".into(),
                response_time_secs: -1.0,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("response_time_secs"));
    }

    #[tokio::test]
    async fn test_get_next_question() {
        let service = service();
        let json = service.get_next_question().await.unwrap();
        let card: Flashcard = serde_json::from_str(&json).unwrap();
        assert_eq!(card.question, "What is a system call?");
    }

    #[tokio::test]
    async fn test_get_learning_metrics() {
        let service = service();
        let json = service.get_learning_metrics().await.unwrap();
        let metrics: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(metrics["current_topic"], "System Calls");
        assert_eq!(metrics["path_length"], 2);
        assert_eq!(metrics["dominant_styles"][0], "balanced");
    }

    #[tokio::test]
    async fn test_get_directives() {
        let service = service();
        let text = service.get_directives().await.unwrap();
        assert!(text.contains("## Student Progress Summary"));
        assert!(text.contains("**Knowledge Level**: INTERMEDIATE"));
    }

    #[tokio::test]
    async fn test_get_goal_progress() {
        let service = service();
        let json = service.get_goal_progress().await.unwrap();
        let progress: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(progress["goal_name"], "Pass Operating Systems Exam");
        assert_eq!(progress["skills"].as_array().unwrap().len(), 7);
        let available: Vec<&str> = progress["available"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(available.contains(&"System Calls"));
        assert!(!available.contains(&"Shell Operations"));
    }

    fn evaluate_args(tutor_reply: &str) -> Parameters<EvaluateAnswerArgs> {
        Parameters(EvaluateAnswerArgs {
            question: "What does fork() return in the child?".into(),
            answer: "Zero".into(),
            tutor_reply: tutor_reply.into(),
        })
    }

    #[tokio::test]
    async fn test_evaluate_answer_leaves_profile_untouched() {
        let service = service();
        let reply = service
            .evaluate_answer(evaluate_args("Exactly right!"))
            .await
            .unwrap();
        assert_eq!(reply, "correct");

        let reply = service
            .evaluate_answer(evaluate_args("Not quite, it returns the child's PID to the parent."))
            .await
            .unwrap();
        assert_eq!(reply, "incorrect");

        let session = service.session.lock().await;
        assert_eq!(session.answers_given(), 0);
        assert_eq!(session.student().cognitive.total_answers, 0);
    }

    #[tokio::test]
    async fn test_evaluate_answer_asks_the_evaluator_first() {
        let mut evaluator = MockAnswerEvaluator::new();
        evaluator
            .expect_evaluate()
            .withf(|question, answer, _| question.contains("fork()") && answer.starts_with("Zero"))
            .times(1)
            .returning(|_, _, _| Ok(Verdict::Incorrect));
        let service = service_with(
            Arc::new(MemoryStore::new()),
            ResponseAnalyzer::new(Some(Arc::new(evaluator))),
        );
        let reply = service.evaluate_answer(evaluate_args("Great!")).await.unwrap();
        assert_eq!(reply, "incorrect");
    }

    #[tokio::test]
    async fn test_get_session_history() {
        let store = Arc::new(MemoryStore::new());
        for days_ago in [3, 1, 2] {
            store
                .record_session(&SessionRecord {
                    student_id: "mcp-student".into(),
                    session_date: Utc::now() - ChronoDuration::days(days_ago),
                    duration_minutes: 10.0,
                    questions_answered: 4,
                    correct_answers: 2,
                    knowledge_level: 0.5,
                    engagement_level: 0.7,
                })
                .await
                .unwrap();
        }
        let service = service_with(store, ResponseAnalyzer::default());

        let json = service
            .get_session_history(Parameters(SessionHistoryArgs { limit: Some(2) }))
            .await
            .unwrap();
        let records: Vec<SessionRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].session_date > records[1].session_date);

        let json = service
            .get_session_history(Parameters(SessionHistoryArgs { limit: None }))
            .await
            .unwrap();
        let records: Vec<SessionRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 3);
    }
}
