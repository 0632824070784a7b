//! Study material.
//!
//! Flashcards are the only study-material source the tutor reads. They are
//! loaded from a JSON array and rendered into the reference block that opens
//! the tutor's system prompt.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            topic: None,
            difficulty: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

/// Parses a JSON array of flashcards.
pub fn parse_flashcards(json: &str) -> Result<Vec<Flashcard>> {
    serde_json::from_str(json).context("Flashcard file is not a JSON array of cards")
}

/// Reads and parses a flashcard file.
pub fn load_flashcards(path: &Path) -> Result<Vec<Flashcard>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read flashcards from {}", path.display()))?;
    parse_flashcards(&raw)
}

/// Renders the cards as the numbered reference block given to the tutor.
pub fn render_study_material(cards: &[Flashcard]) -> String {
    let mut text = String::from("# Study Material - Flashcards\n\n");
    for (i, card) in cards.iter().enumerate() {
        text.push_str(&format!("{}. Q: {}\n   A: {}\n\n", i + 1, card.question, card.answer));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_and_full_cards() {
        let json = r#"[
            {"question": "What does fork() return in the child?", "answer": "0"},
            {"question": "What is a zombie?", "answer": "An exited child not yet reaped",
             "topic": "Process Management", "difficulty": 0.6}
        ]"#;
        let cards = parse_flashcards(json).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].topic, None);
        assert_eq!(cards[1].topic.as_deref(), Some("Process Management"));
        assert_eq!(cards[1].difficulty, Some(0.6));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_flashcards(r#"{"question": "q"}"#).is_err());
    }

    #[test]
    fn test_render_study_material() {
        let cards = vec![Flashcard::new("What is a pipe?", "A unidirectional byte channel")];
        let text = render_study_material(&cards);
        assert!(text.starts_with("# Study Material"));
        assert!(text.contains("1. Q: What is a pipe?\n   A: A unidirectional byte channel"));
    }
}
