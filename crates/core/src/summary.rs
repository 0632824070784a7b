//! Session summary.
//!
//! A read-and-delegate step: the session's counters are frozen into a
//! [`SessionSnapshot`], rendered into the `session_summary` prompt alongside the
//! current directives, and handed to the text generator. Nothing is mutated.

use crate::directives::{DirectiveSet, list_or, percent};
use crate::llm_client::{ChatMessage, LLMClient};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an educational assessment assistant. Provide concise, actionable feedback.";

/// Counters for the current session only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub answers_given: u32,
    pub correct_answers: u32,
    pub elapsed: Duration,
    pub knowledge_level: f64,
    pub mastered_topics: Vec<String>,
    pub struggling_topics: Vec<String>,
    pub motivation_level: f64,
    pub engagement_level: f64,
    pub frustration_level: f64,
}

impl SessionSnapshot {
    pub fn accuracy(&self) -> Option<f64> {
        (self.answers_given > 0).then(|| f64::from(self.correct_answers) / f64::from(self.answers_given))
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }
}

/// Fills the `session_summary` template.
///
/// Placeholders: `{answers_given}`, `{correct_answers}`, `{elapsed_minutes}`,
/// `{knowledge_level}`, `{mastered}`, `{struggling}`, `{motivation}`,
/// `{engagement}`, `{frustration}`, `{directives}`.
pub fn render_summary_prompt(
    template: &str,
    snapshot: &SessionSnapshot,
    directives: &DirectiveSet,
) -> String {
    template
        .replace("{answers_given}", &snapshot.answers_given.to_string())
        .replace("{correct_answers}", &snapshot.correct_answers.to_string())
        .replace("{elapsed_minutes}", &format!("{:.1}", snapshot.elapsed_minutes()))
        .replace("{knowledge_level}", &percent(snapshot.knowledge_level))
        .replace("{mastered}", &list_or(&snapshot.mastered_topics, "None"))
        .replace("{struggling}", &list_or(&snapshot.struggling_topics, "None"))
        .replace("{motivation}", &percent(snapshot.motivation_level))
        .replace("{engagement}", &percent(snapshot.engagement_level))
        .replace("{frustration}", &percent(snapshot.frustration_level))
        .replace("{directives}", &directives.render_instructions())
}

/// Asks the text generator for a session summary.
///
/// Returns `Ok(None)` without calling out when no answers were given.
pub async fn summarize_session(
    client: &dyn LLMClient,
    template: &str,
    snapshot: &SessionSnapshot,
    directives: &DirectiveSet,
) -> Result<Option<String>> {
    if snapshot.answers_given == 0 {
        info!("No answers this session; skipping summary");
        return Ok(None);
    }
    let prompt = render_summary_prompt(template, snapshot, directives);
    let summary = client
        .complete(vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .await
        .context("Failed to generate session summary")?;
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::generate_directives;
    use crate::llm_client::MockLLMClient;
    use crate::student::StudentModel;

    fn snapshot(answers: u32, correct: u32) -> SessionSnapshot {
        SessionSnapshot {
            answers_given: answers,
            correct_answers: correct,
            elapsed: Duration::from_secs(90),
            knowledge_level: 0.62,
            mastered_topics: vec!["System Calls".into()],
            struggling_topics: vec![],
            motivation_level: 0.7,
            engagement_level: 0.75,
            frustration_level: 0.2,
        }
    }

    #[test]
    fn test_render_summary_prompt() {
        let directives = generate_directives(&StudentModel::new("s"));
        let prompt = render_summary_prompt(
            "{answers_given}/{correct_answers} in {elapsed_minutes}m at {knowledge_level}; mastered {mastered}; struggling {struggling}",
            &snapshot(4, 3),
            &directives,
        );
        assert_eq!(
            prompt,
            "4/3 in 1.5m at 62.0%; mastered System Calls; struggling None"
        );
    }

    #[test]
    fn test_snapshot_accuracy() {
        assert_eq!(snapshot(0, 0).accuracy(), None);
        assert_eq!(snapshot(4, 3).accuracy(), Some(0.75));
    }

    #[tokio::test]
    async fn test_summary_skipped_without_answers() {
        let mut client = MockLLMClient::new();
        client.expect_complete().never();
        let directives = generate_directives(&StudentModel::new("s"));
        let summary = summarize_session(&client, "{answers_given}", &snapshot(0, 0), &directives)
            .await
            .unwrap();
        assert_eq!(summary, None);
    }

    #[tokio::test]
    async fn test_summary_delegates_to_client() {
        let mut client = MockLLMClient::new();
        client
            .expect_complete()
            .times(1)
            .withf(|messages| messages[1].content == "answered 2")
            .returning(|_| Ok("Solid progress.".to_string()));
        let directives = generate_directives(&StudentModel::new("s"));
        let summary = summarize_session(&client, "answered {answers_given}", &snapshot(2, 1), &directives)
            .await
            .unwrap();
        assert_eq!(summary.as_deref(), Some("Solid progress."));
    }
}
