//! Response Analyzer
//!
//! Reads one interaction (how long the student took, what they said, what the
//! tutor replied) and produces the signals the student model and the learning
//! path consume. Correctness is judged by an [`AnswerEvaluator`] when one is
//! configured, falling back to a keyword heuristic over the tutor's reply.

use crate::llm_client::{ChatMessage, LLMClient};
use crate::style::{self, StyleSignal};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const POSITIVE_INDICATORS: &[&str] = &[
    "correct",
    "great",
    "excellent",
    "right",
    "exactly",
    "perfect",
    "well done",
];

const NEGATIVE_INDICATORS: &[&str] = &[
    "incorrect",
    "not correct",
    "isn't correct",
    "not right",
    "isn't right",
    "not quite",
    "actually",
    "mistake",
    "wrong",
    "let me clarify",
];

const EVALUATOR_SYSTEM_PROMPT: &str = "You are an educational assessment expert. Respond with only one word: CORRECT, INCORRECT, or UNCLEAR.";

/// Outcome of grading a student's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Not a question/answer exchange, or impossible to tell.
    Unclear,
}

impl Verdict {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Verdict::Correct => Some(true),
            Verdict::Incorrect => Some(false),
            Verdict::Unclear => None,
        }
    }
}

/// One complete exchange: the tutor's previous turn, the student's reply, and
/// the tutor's response to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub question: String,
    pub student_text: String,
    pub tutor_reply: String,
    pub elapsed: Duration,
}

/// Signals available as soon as the student has spoken.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSignals {
    pub response_length: usize,
    pub response_time: Duration,
    pub style: Vec<StyleSignal>,
}

impl TurnSignals {
    pub fn from_utterance(student_text: &str, elapsed: Duration) -> Self {
        Self {
            response_length: student_text.chars().count(),
            response_time: elapsed,
            style: style::classify(student_text),
        }
    }
}

/// Everything the analyzer extracted from one interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub turn: TurnSignals,
    pub verdict: Verdict,
}

/// Grades an answer. Implementations may call out to external services.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    async fn evaluate(&self, question: &str, answer: &str, tutor_reply: &str) -> Result<Verdict>;
}

/// An evaluator that asks a language model for a one-word verdict.
pub struct LLMAnswerEvaluator {
    client: Arc<dyn LLMClient>,
    template: String,
}

impl LLMAnswerEvaluator {
    /// `template` is the `evaluate_answer` prompt, with `{question}`, `{answer}`
    /// and `{tutor_reply}` placeholders.
    pub fn new(client: Arc<dyn LLMClient>, template: String) -> Self {
        Self { client, template }
    }
}

#[async_trait]
impl AnswerEvaluator for LLMAnswerEvaluator {
    async fn evaluate(&self, question: &str, answer: &str, tutor_reply: &str) -> Result<Verdict> {
        let prompt = self
            .template
            .replace("{question}", question)
            .replace("{answer}", answer)
            .replace("{tutor_reply}", tutor_reply);
        let reply = self
            .client
            .complete(vec![
                ChatMessage::system(EVALUATOR_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ])
            .await?;
        Ok(parse_verdict(&reply))
    }
}

/// Reads a CORRECT / INCORRECT / UNCLEAR reply.
pub fn parse_verdict(reply: &str) -> Verdict {
    let upper = reply.trim().to_uppercase();
    if upper.contains("INCORRECT") || upper.contains("NOT CORRECT") {
        Verdict::Incorrect
    } else if upper.contains("CORRECT") {
        Verdict::Correct
    } else {
        Verdict::Unclear
    }
}

/// Guesses correctness from the tutor's feedback. Corrective phrasing wins
/// over praise.
pub fn heuristic_verdict(tutor_reply: &str) -> Verdict {
    let lowered = tutor_reply.to_lowercase();
    if NEGATIVE_INDICATORS.iter().any(|w| lowered.contains(w)) {
        Verdict::Incorrect
    } else if POSITIVE_INDICATORS.iter().any(|w| lowered.contains(w)) {
        Verdict::Correct
    } else {
        Verdict::Unclear
    }
}

#[derive(Clone, Default)]
pub struct ResponseAnalyzer {
    evaluator: Option<Arc<dyn AnswerEvaluator>>,
}

impl ResponseAnalyzer {
    pub fn new(evaluator: Option<Arc<dyn AnswerEvaluator>>) -> Self {
        Self { evaluator }
    }

    /// Grades the interaction. Evaluator failures are logged and fall back to
    /// the heuristic; they never propagate.
    pub async fn judge(&self, interaction: &Interaction) -> Verdict {
        if let Some(evaluator) = &self.evaluator {
            match evaluator
                .evaluate(
                    &interaction.question,
                    &interaction.student_text,
                    &interaction.tutor_reply,
                )
                .await
            {
                Ok(Verdict::Unclear) => debug!("Evaluator could not decide; using heuristic"),
                Ok(verdict) => return verdict,
                Err(e) => warn!(error = %e, "Answer evaluation failed; using heuristic"),
            }
        }
        heuristic_verdict(&interaction.tutor_reply)
    }

    pub async fn analyze(&self, interaction: &Interaction) -> Signals {
        let turn = TurnSignals::from_utterance(&interaction.student_text, interaction.elapsed);
        let verdict = self.judge(interaction).await;
        debug!(?verdict, response_length = turn.response_length, "Interaction analyzed");
        Signals { turn, verdict }
    }
}
