//! Student Model
//!
//! This module holds the per-learner aggregate: a cognitive, an affective and a
//! learning-style sub-model plus the session bookkeeping that is persisted
//! between sessions. All update rules live here as plain methods on owned
//! state; nothing in this module performs I/O.

use crate::style::{self, StyleAxis, StylePole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

/// Accuracy at or above which a topic counts as mastered.
pub const MASTERY_THRESHOLD: f64 = 0.75;

/// Weight kept by the previous knowledge level on each blend.
const KNOWLEDGE_RETENTION: f64 = 0.7;

const ENGAGEMENT_STEP: f64 = 0.05;
const SHORT_RESPONSE_CHARS: usize = 10;
const SLOW_RESPONSE: Duration = Duration::from_secs(30);
const SLOW_RESPONSE_FRUSTRATION: f64 = 0.10;

const EFFICACY_STEP: f64 = 0.05;
const MOTIVATION_STEP: f64 = 0.03;
const FRUSTRATION_STEP: f64 = 0.10;
const DEMOTIVATING_FRUSTRATION: f64 = 0.7;

/// Clamps a scalar into the closed unit interval.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Validation failure for a student model, typically one read back from storage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("field `{field}` is outside [0, 1]: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("correct_answers ({correct}) exceeds total_answers ({total})")]
    AnswerCount { correct: u32, total: u32 },
    #[error("topic `{0}` is both mastered and struggling")]
    OverlappingTopic(String),
    #[error("total_study_time must be a non-negative number of minutes, got {0}")]
    StudyTime(f64),
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ModelError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::OutOfRange { field, value })
    }
}

/// Running answer counts for a single topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub correct: u32,
    pub total: u32,
}

impl TopicStats {
    fn record(&mut self, was_correct: bool) {
        self.total += 1;
        if was_correct {
            self.correct += 1;
        }
    }

    /// Fraction of correct answers, or `None` before the first observation.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.correct) / f64::from(self.total))
    }
}

/// Cognitive dimensions: competency estimate and per-topic mastery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveModel {
    pub knowledge_level: f64,
    pub metacognition_score: f64,
    pub attention_span: f64,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub mastered_topics: BTreeSet<String>,
    pub struggling_topics: BTreeSet<String>,
    #[serde(default)]
    pub topic_stats: BTreeMap<String, TopicStats>,
}

impl Default for CognitiveModel {
    fn default() -> Self {
        Self {
            knowledge_level: 0.5,
            metacognition_score: 0.5,
            attention_span: 0.7,
            correct_answers: 0,
            total_answers: 0,
            mastered_topics: BTreeSet::new(),
            struggling_topics: BTreeSet::new(),
            topic_stats: BTreeMap::new(),
        }
    }
}

impl CognitiveModel {
    /// Lifetime accuracy, or `None` when no answer has been recorded.
    pub fn accuracy(&self) -> Option<f64> {
        (self.total_answers > 0)
            .then(|| f64::from(self.correct_answers) / f64::from(self.total_answers))
    }

    /// Accuracy observed for a single topic.
    pub fn topic_accuracy(&self, topic: &str) -> Option<f64> {
        self.topic_stats.get(topic).and_then(TopicStats::accuracy)
    }

    /// Records one graded answer on `topic`.
    ///
    /// The knowledge level is an exponential moving average of lifetime
    /// accuracy. The topic is then promoted to mastered once its own accuracy
    /// reaches [`MASTERY_THRESHOLD`], or marked as struggling otherwise. A
    /// mastered topic is never demoted by this rule.
    pub fn update_knowledge(&mut self, was_correct: bool, topic: &str) {
        self.total_answers += 1;
        if was_correct {
            self.correct_answers += 1;
        }
        self.blend_knowledge();

        let stats = self.topic_stats.entry(topic.to_string()).or_default();
        stats.record(was_correct);
        if let Some(accuracy) = stats.accuracy() {
            self.classify_topic(topic, accuracy);
        }

        debug!(
            topic,
            was_correct,
            knowledge_level = self.knowledge_level,
            "Cognitive model updated"
        );
    }

    fn blend_knowledge(&mut self) {
        // Nothing to blend against before the first answer.
        let Some(accuracy) = self.accuracy() else {
            return;
        };
        self.knowledge_level = clamp_unit(
            KNOWLEDGE_RETENTION * self.knowledge_level + (1.0 - KNOWLEDGE_RETENTION) * accuracy,
        );
    }

    fn classify_topic(&mut self, topic: &str, accuracy: f64) {
        if accuracy >= MASTERY_THRESHOLD {
            self.struggling_topics.remove(topic);
            self.mastered_topics.insert(topic.to_string());
        } else if !self.mastered_topics.contains(topic) {
            self.struggling_topics.insert(topic.to_string());
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_unit("knowledge_level", self.knowledge_level)?;
        check_unit("metacognition_score", self.metacognition_score)?;
        check_unit("attention_span", self.attention_span)?;
        if self.correct_answers > self.total_answers {
            return Err(ModelError::AnswerCount {
                correct: self.correct_answers,
                total: self.total_answers,
            });
        }
        if let Some(topic) = self.mastered_topics.intersection(&self.struggling_topics).next() {
            return Err(ModelError::OverlappingTopic(topic.clone()));
        }
        Ok(())
    }
}

/// Affective dimensions: how the student feels about the work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectiveModel {
    pub motivation_level: f64,
    pub self_efficacy: f64,
    pub engagement_level: f64,
    pub frustration_level: f64,
    pub response_count: u32,
}

impl Default for AffectiveModel {
    fn default() -> Self {
        Self {
            motivation_level: 0.7,
            self_efficacy: 0.6,
            engagement_level: 0.7,
            frustration_level: 0.3,
            response_count: 0,
        }
    }
}

impl AffectiveModel {
    /// Adjusts engagement and frustration from the shape of one response.
    ///
    /// Responses shorter than ten characters lower engagement, anything longer
    /// raises it. Responses slower than thirty seconds add frustration.
    pub fn update_engagement(&mut self, response_length: usize, response_time: Duration) {
        self.response_count += 1;

        let step = if response_length < SHORT_RESPONSE_CHARS {
            -ENGAGEMENT_STEP
        } else {
            ENGAGEMENT_STEP
        };
        self.engagement_level = clamp_unit(self.engagement_level + step);

        if response_time > SLOW_RESPONSE {
            self.frustration_level = clamp_unit(self.frustration_level + SLOW_RESPONSE_FRUSTRATION);
        }

        debug!(
            response_length,
            response_secs = response_time.as_secs_f64(),
            engagement = self.engagement_level,
            frustration = self.frustration_level,
            "Engagement updated"
        );
    }

    pub fn update_after_correct(&mut self) {
        self.self_efficacy = clamp_unit(self.self_efficacy + EFFICACY_STEP);
        self.motivation_level = clamp_unit(self.motivation_level + MOTIVATION_STEP);
        self.frustration_level = clamp_unit(self.frustration_level - FRUSTRATION_STEP);
    }

    /// Mirror of [`update_after_correct`](Self::update_after_correct). Motivation
    /// only drops once frustration has climbed past 0.7.
    pub fn update_after_incorrect(&mut self) {
        self.self_efficacy = clamp_unit(self.self_efficacy - EFFICACY_STEP);
        self.frustration_level = clamp_unit(self.frustration_level + FRUSTRATION_STEP);
        if self.frustration_level > DEMOTIVATING_FRUSTRATION {
            self.motivation_level = clamp_unit(self.motivation_level - MOTIVATION_STEP);
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_unit("motivation_level", self.motivation_level)?;
        check_unit("self_efficacy", self.self_efficacy)?;
        check_unit("engagement_level", self.engagement_level)?;
        check_unit("frustration_level", self.frustration_level)
    }
}

/// Felder–Silverman preferences. Each axis runs from its first pole at 0.0 to
/// its second pole at 1.0; 0.5 is style-neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStyleModel {
    pub active_reflective: f64,
    pub sensing_intuitive: f64,
    pub visual_verbal: f64,
    pub sequential_global: f64,
}

impl Default for LearningStyleModel {
    fn default() -> Self {
        Self {
            active_reflective: 0.5,
            sensing_intuitive: 0.5,
            visual_verbal: 0.5,
            sequential_global: 0.5,
        }
    }
}

impl LearningStyleModel {
    pub fn axis(&self, axis: StyleAxis) -> f64 {
        match axis {
            StyleAxis::ActiveReflective => self.active_reflective,
            StyleAxis::SensingIntuitive => self.sensing_intuitive,
            StyleAxis::VisualVerbal => self.visual_verbal,
            StyleAxis::SequentialGlobal => self.sequential_global,
        }
    }

    /// Moves one axis by `delta`, clamped to [0, 1].
    pub fn nudge(&mut self, axis: StyleAxis, delta: f64) {
        let slot = match axis {
            StyleAxis::ActiveReflective => &mut self.active_reflective,
            StyleAxis::SensingIntuitive => &mut self.sensing_intuitive,
            StyleAxis::VisualVerbal => &mut self.visual_verbal,
            StyleAxis::SequentialGlobal => &mut self.sequential_global,
        };
        *slot = clamp_unit(*slot + delta);
    }

    /// The pole each axis leans towards, skipping axes inside the neutral band.
    pub fn leanings(&self) -> Vec<StylePole> {
        StyleAxis::ALL
            .into_iter()
            .filter_map(|axis| axis.pole_for(self.axis(axis)))
            .collect()
    }

    /// Human-readable dominant styles, `["balanced"]` when nothing stands out.
    pub fn dominant_styles(&self) -> Vec<&'static str> {
        let leanings = self.leanings();
        if leanings.is_empty() {
            vec!["balanced"]
        } else {
            leanings.into_iter().map(StylePole::name).collect()
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_unit("active_reflective", self.active_reflective)?;
        check_unit("sensing_intuitive", self.sensing_intuitive)?;
        check_unit("visual_verbal", self.visual_verbal)?;
        check_unit("sequential_global", self.sequential_global)
    }
}

/// Root aggregate, one per learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentModel {
    pub student_id: String,
    pub cognitive: CognitiveModel,
    pub affective: AffectiveModel,
    pub learning_style: LearningStyleModel,
    pub session_count: u32,
    /// Accumulated study time in minutes.
    pub total_study_time: f64,
    pub last_session: Option<DateTime<Utc>>,
    pub learning_goals: Vec<String>,
}

impl StudentModel {
    /// Creates a fresh profile with default sub-models.
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            cognitive: CognitiveModel::default(),
            affective: AffectiveModel::default(),
            learning_style: LearningStyleModel::default(),
            session_count: 0,
            total_study_time: 0.0,
            last_session: None,
            learning_goals: Vec::new(),
        }
    }

    /// Marks the beginning of a new study session.
    pub fn begin_session(&mut self, now: DateTime<Utc>) {
        self.session_count += 1;
        self.last_session = Some(now);
    }

    /// Adds a finished session's length to the running total.
    pub fn add_study_time(&mut self, minutes: f64) {
        if minutes.is_finite() && minutes > 0.0 {
            self.total_study_time += minutes;
        }
    }

    /// Applies a graded answer to both the cognitive and affective models.
    pub fn record_answer(&mut self, was_correct: bool, topic: &str) {
        self.cognitive.update_knowledge(was_correct, topic);
        if was_correct {
            self.affective.update_after_correct();
        } else {
            self.affective.update_after_incorrect();
        }
    }

    /// Infers style preferences from what the student said.
    pub fn update_learning_style_from_interaction(&mut self, student_text: &str) {
        let signals = style::classify(student_text);
        style::apply(&mut self.learning_style, &signals);
    }

    /// Checks every invariant a persisted record must satisfy.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.cognitive.validate()?;
        self.affective.validate()?;
        self.learning_style.validate()?;
        if !self.total_study_time.is_finite() || self.total_study_time < 0.0 {
            return Err(ModelError::StudyTime(self.total_study_time));
        }
        Ok(())
    }
}
