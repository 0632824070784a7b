//! Directive Generator
//!
//! Turns a snapshot of the student model into a [`DirectiveSet`]: structured
//! teaching instructions for the external text generator. Every fragment is
//! derived independently, so a student can be advanced, unmotivated and
//! visual-leaning all at once. Generation is pure: same model, same directives.

use crate::student::StudentModel;
use crate::style::StylePole;
use serde::{Deserialize, Serialize};
use std::fmt;

const BEGINNER_BELOW: f64 = 0.4;
const ADVANCED_ABOVE: f64 = 0.7;
const LOW_MOTIVATION: f64 = 0.5;
const HIGH_FRUSTRATION: f64 = 0.6;
const LOW_ENGAGEMENT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl KnowledgeTier {
    /// `< 0.4` beginner, `[0.4, 0.7]` intermediate, `> 0.7` advanced.
    pub fn from_level(level: f64) -> Self {
        if level < BEGINNER_BELOW {
            KnowledgeTier::Beginner
        } else if level > ADVANCED_ABOVE {
            KnowledgeTier::Advanced
        } else {
            KnowledgeTier::Intermediate
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            KnowledgeTier::Beginner => {
                "Keep explanations simple, define every term, and scaffold each step"
            }
            KnowledgeTier::Intermediate => {
                "Build on the basics they know and introduce moderate depth"
            }
            KnowledgeTier::Advanced => {
                "Increase difficulty and depth; connect concepts and probe edge cases"
            }
        }
    }
}

impl fmt::Display for KnowledgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeTier::Beginner => write!(f, "beginner"),
            KnowledgeTier::Intermediate => write!(f, "intermediate"),
            KnowledgeTier::Advanced => write!(f, "advanced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectiveDirective {
    /// Motivation is low.
    Encourage,
    /// Frustration is high.
    BePatient,
    /// Engagement is low.
    Engage,
}

impl AffectiveDirective {
    fn instruction(self) -> &'static str {
        match self {
            AffectiveDirective::Encourage => {
                "Provide extra encouragement and celebrate small wins to boost motivation"
            }
            AffectiveDirective::BePatient => {
                "Student may be frustrated - be patient, offer hints, and break concepts into smaller steps"
            }
            AffectiveDirective::Engage => {
                "Increase engagement with questions, examples, and interactive explanations"
            }
        }
    }
}

fn style_instruction(pole: StylePole) -> &'static str {
    match pole {
        StylePole::Active => {
            "This student learns by DOING - suggest practice problems and hands-on exercises"
        }
        StylePole::Reflective => {
            "This student learns by THINKING - give them time to reflect and ask probing questions"
        }
        StylePole::Sensing => {
            "This student prefers CONCRETE examples - use real-world applications and practical examples"
        }
        StylePole::Intuitive => {
            "This student prefers ABSTRACT thinking - focus on concepts, theories, and underlying principles"
        }
        StylePole::Visual => {
            "This student prefers VISUAL learning - use diagrams, analogies, and descriptive examples"
        }
        StylePole::Verbal => {
            "This student prefers VERBAL learning - use clear explanations and word-based descriptions"
        }
        StylePole::Sequential => {
            "This student prefers STEP-BY-STEP learning - present concepts in logical order"
        }
        StylePole::Global => {
            "This student prefers BIG-PICTURE learning - start with overview and context before details"
        }
    }
}

/// The model figures quoted back to the text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub knowledge_level: f64,
    pub total_answers: u32,
    pub correct_answers: u32,
    pub mastered_topics: Vec<String>,
    pub struggling_topics: Vec<String>,
    pub session_count: u32,
    pub motivation_level: f64,
    pub engagement_level: f64,
}

impl ProgressSummary {
    pub fn render(&self) -> String {
        format!(
            "## Student Progress Summary\n\
             - Knowledge Level: {}\n\
             - Questions Answered: {} ({} correct)\n\
             - Mastered Topics: {}\n\
             - Struggling With: {}\n\
             - Session Count: {}\n\
             - Motivation: {}\n\
             - Engagement: {}\n",
            percent(self.knowledge_level),
            self.total_answers,
            self.correct_answers,
            list_or(&self.mastered_topics, "None yet"),
            list_or(&self.struggling_topics, "None identified"),
            self.session_count,
            percent(self.motivation_level),
            percent(self.engagement_level),
        )
    }
}

/// Structured teaching instructions for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveSet {
    pub knowledge_tier: KnowledgeTier,
    pub affective: Vec<AffectiveDirective>,
    pub style: Vec<StylePole>,
    pub progress: ProgressSummary,
}

impl DirectiveSet {
    /// One instruction line per directive fragment, tier first.
    pub fn instructions(&self) -> Vec<&'static str> {
        std::iter::once(self.knowledge_tier.instruction())
            .chain(self.affective.iter().map(|d| d.instruction()))
            .chain(self.style.iter().map(|p| style_instruction(*p)))
            .collect()
    }

    pub fn render_instructions(&self) -> String {
        let mut text = format!(
            "**Knowledge Level**: {}\n",
            self.knowledge_tier.to_string().to_uppercase()
        );
        for line in self.instructions() {
            text.push_str("- ");
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Derives the directive set for the model's current state.
pub fn generate_directives(student: &StudentModel) -> DirectiveSet {
    let cognitive = &student.cognitive;
    let affective_model = &student.affective;

    let mut affective = Vec::new();
    if affective_model.motivation_level < LOW_MOTIVATION {
        affective.push(AffectiveDirective::Encourage);
    }
    if affective_model.frustration_level > HIGH_FRUSTRATION {
        affective.push(AffectiveDirective::BePatient);
    }
    if affective_model.engagement_level < LOW_ENGAGEMENT {
        affective.push(AffectiveDirective::Engage);
    }

    DirectiveSet {
        knowledge_tier: KnowledgeTier::from_level(cognitive.knowledge_level),
        affective,
        style: student.learning_style.leanings(),
        progress: ProgressSummary {
            knowledge_level: cognitive.knowledge_level,
            total_answers: cognitive.total_answers,
            correct_answers: cognitive.correct_answers,
            mastered_topics: cognitive.mastered_topics.iter().cloned().collect(),
            struggling_topics: cognitive.struggling_topics.iter().cloned().collect(),
            session_count: student.session_count,
            motivation_level: affective_model.motivation_level,
            engagement_level: affective_model.engagement_level,
        },
    }
}

/// Fills the `system_prompt` template.
///
/// Recognised placeholders: `{study_material}`, `{progress}`,
/// `{knowledge_tier}` and `{directives}`.
pub fn render_system_prompt(template: &str, study_material: &str, directives: &DirectiveSet) -> String {
    template
        .replace("{study_material}", study_material)
        .replace("{progress}", &directives.progress.render())
        .replace("{knowledge_tier}", &directives.knowledge_tier.to_string())
        .replace("{directives}", &directives.render_instructions())
}

pub(crate) fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub(crate) fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}
