//! Per-session orchestration.
//!
//! A [`TutorSession`] owns the one student aggregate and learning path being
//! adapted, plus the counters that exist only for the current sitting. Each
//! interaction is applied in two halves: [`TutorSession::apply_turn`] with what
//! the utterance itself reveals, then [`TutorSession::apply_verdict`] once the
//! tutor's reply has been graded.

use crate::analyzer::{Interaction, TurnSignals, Verdict};
use crate::directives::{DirectiveSet, generate_directives};
use crate::llm_client::{ChatMessage, ChatRole};
use crate::path::{AdaptiveLearningPath, PathError, ProgressUpdate};
use crate::skills::{DEFAULT_GOAL, LearningGoal, update_skill_mastery};
use crate::store::SessionRecord;
use crate::student::StudentModel;
use crate::style;
use crate::summary::SessionSnapshot;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

/// Topic answers are recorded under when there is no path to follow.
pub const DEFAULT_TOPIC: &str = "general";

/// Picks the stored path when it still matches the study material, so progress
/// carries over; otherwise starts over on the fresh one.
pub fn resume_path(
    stored: Option<AdaptiveLearningPath>,
    fresh: AdaptiveLearningPath,
) -> AdaptiveLearningPath {
    match stored {
        Some(stored) if stored.same_layout(&fresh) => {
            info!(
                current_node = stored.current_node_index(),
                "Resuming stored learning path"
            );
            stored
        }
        Some(_) => {
            info!("Study material changed; starting a new learning path");
            fresh
        }
        None => fresh,
    }
}

#[derive(Debug, Clone)]
pub struct TutorSession {
    student: StudentModel,
    goal: LearningGoal,
    path: AdaptiveLearningPath,
    history: Vec<ChatMessage>,
    started_at: DateTime<Utc>,
    answers_given: u32,
    correct_answers: u32,
}

impl TutorSession {
    /// Opens a session: bumps the session count, falls back to the default
    /// goal and maps it to skills.
    pub fn start(mut student: StudentModel, path: AdaptiveLearningPath, now: DateTime<Utc>) -> Self {
        student.begin_session(now);
        if student.learning_goals.is_empty() {
            student.learning_goals.push(DEFAULT_GOAL.to_string());
        }
        let goal_name = student
            .learning_goals
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_GOAL);
        let mut goal = LearningGoal::from_catalogue(goal_name);
        update_skill_mastery(&mut goal.required_skills, &student.cognitive);

        info!(
            student_id = %student.student_id,
            session = student.session_count,
            goal = %goal.goal_name,
            skills = goal.required_skills.len(),
            path_nodes = path.len(),
            "Session started"
        );

        Self {
            student,
            goal,
            path,
            history: Vec::new(),
            started_at: now,
            answers_given: 0,
            correct_answers: 0,
        }
    }

    pub fn student(&self) -> &StudentModel {
        &self.student
    }

    pub fn goal(&self) -> &LearningGoal {
        &self.goal
    }

    pub fn path(&self) -> &AdaptiveLearningPath {
        &self.path
    }

    pub fn answers_given(&self) -> u32 {
        self.answers_given
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn current_topic(&self) -> &str {
        self.path
            .current_node()
            .map(|node| node.topic.as_str())
            .unwrap_or(DEFAULT_TOPIC)
    }

    /// Applies what the utterance reveals on its own: engagement, frustration
    /// from slow answers and style cues.
    pub fn apply_turn(&mut self, turn: &TurnSignals) {
        self.student
            .affective
            .update_engagement(turn.response_length, turn.response_time);
        style::apply(&mut self.student.learning_style, &turn.style);
        debug!(
            engagement = self.student.affective.engagement_level,
            frustration = self.student.affective.frustration_level,
            style_signals = turn.style.len(),
            "Turn applied"
        );
    }

    /// Applies a graded answer to the model, the skills and the path.
    ///
    /// An unclear verdict changes nothing and returns `Ok(None)`, as does any
    /// verdict when there is no path.
    pub fn apply_verdict(&mut self, verdict: Verdict) -> Result<Option<ProgressUpdate>, PathError> {
        let Some(was_correct) = verdict.as_bool() else {
            debug!("No verdict for this turn; model unchanged");
            return Ok(None);
        };

        let topic = self.current_topic().to_string();
        self.student.record_answer(was_correct, &topic);
        self.answers_given += 1;
        if was_correct {
            self.correct_answers += 1;
        }
        update_skill_mastery(&mut self.goal.required_skills, &self.student.cognitive);
        info!(
            topic = %topic,
            was_correct,
            knowledge_level = self.student.cognitive.knowledge_level,
            "Answer recorded"
        );

        if self.path.is_empty() {
            return Ok(None);
        }
        let index = self.path.current_node_index();
        self.path
            .update_progress(index, was_correct, &self.student)
            .map(Some)
    }

    pub fn directives(&self) -> DirectiveSet {
        generate_directives(&self.student)
    }

    /// Conversation so far, headed by `system_prompt` and ending with the
    /// student's latest utterance.
    pub fn messages_for(&self, system_prompt: &str, student_text: &str) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(system_prompt))
            .chain(self.history.iter().cloned())
            .chain(std::iter::once(ChatMessage::user(student_text)))
            .collect()
    }

    /// Prompt for the tutor's opening turn, before the student has said anything.
    pub fn opening_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(system_prompt))
            .chain(self.history.iter().cloned())
            .collect()
    }

    /// Records a tutor turn that answers nothing, such as the greeting.
    pub fn record_tutor_turn(&mut self, tutor_text: &str) {
        self.history.push(ChatMessage::assistant(tutor_text));
    }

    /// The tutor's most recent message, which the student was answering.
    pub fn last_tutor_message(&self) -> &str {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Appends one exchange to the history and returns it for grading.
    pub fn record_exchange(
        &mut self,
        student_text: &str,
        tutor_reply: &str,
        elapsed: Duration,
    ) -> Interaction {
        let interaction = Interaction {
            question: self.last_tutor_message().to_string(),
            student_text: student_text.to_string(),
            tutor_reply: tutor_reply.to_string(),
            elapsed,
        };
        self.history.push(ChatMessage::user(student_text));
        self.history.push(ChatMessage::assistant(tutor_reply));
        interaction
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or_default()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let cognitive = &self.student.cognitive;
        let affective = &self.student.affective;
        SessionSnapshot {
            answers_given: self.answers_given,
            correct_answers: self.correct_answers,
            elapsed: self.elapsed(now),
            knowledge_level: cognitive.knowledge_level,
            mastered_topics: cognitive.mastered_topics.iter().cloned().collect(),
            struggling_topics: cognitive.struggling_topics.iter().cloned().collect(),
            motivation_level: affective.motivation_level,
            engagement_level: affective.engagement_level,
            frustration_level: affective.frustration_level,
        }
    }

    /// Closes the session: adds its length to the study time and returns the
    /// history record. The caller persists both.
    pub fn finish(&mut self, now: DateTime<Utc>) -> SessionRecord {
        let minutes = self.elapsed(now).as_secs_f64() / 60.0;
        self.student.add_study_time(minutes);
        info!(
            student_id = %self.student.student_id,
            minutes,
            answers = self.answers_given,
            correct = self.correct_answers,
            "Session finished"
        );
        SessionRecord {
            student_id: self.student.student_id.clone(),
            session_date: self.started_at,
            duration_minutes: minutes,
            questions_answered: self.answers_given,
            correct_answers: self.correct_answers,
            knowledge_level: self.student.cognitive.knowledge_level,
            engagement_level: self.student.affective.engagement_level,
        }
    }
}
