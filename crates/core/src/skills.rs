//! Goal-to-skill mapping.
//!
//! Goals are resolved against a fixed catalogue of domain skills. The lookup is
//! deterministic: the same goal name always yields the same skills in the same
//! order, and an unknown goal yields an empty list rather than an error.

use crate::student::{CognitiveModel, MASTERY_THRESHOLD, clamp_unit};
use chrono::NaiveDate;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The goal every new profile starts with.
pub const DEFAULT_GOAL: &str = "Pass Operating Systems Exam";

/// Shortest goal text we are willing to fuzzy-match.
const MIN_FUZZY_LEN: usize = 6;

/// A fuzzy hit may leave at most one in this many characters of the catalogue
/// name unmatched.
const FUZZY_SLACK_RATIO: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub difficulty: f64,
    pub prerequisites: BTreeSet<String>,
    pub mastery_level: f64,
}

impl Skill {
    pub fn new(name: &str, description: &str, difficulty: f64, prerequisites: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            difficulty: clamp_unit(difficulty),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            mastery_level: 0.0,
        }
    }

    /// Raises mastery towards `level`. Mastery never decreases.
    pub fn update_mastery(&mut self, level: f64) {
        self.mastery_level = self.mastery_level.max(clamp_unit(level));
    }

    /// True when every prerequisite in `skills` has reached mastery.
    pub fn is_unlocked(&self, skills: &[Skill]) -> bool {
        self.prerequisites.iter().all(|prereq| {
            skills
                .iter()
                .find(|s| &s.name == prereq)
                .is_some_and(|s| s.mastery_level >= MASTERY_THRESHOLD)
        })
    }
}

/// A named goal and the skills it requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningGoal {
    pub goal_name: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub required_skills: Vec<Skill>,
}

impl LearningGoal {
    /// Builds a goal from the catalogue. Unknown goals carry no skills.
    pub fn from_catalogue(goal_name: &str) -> Self {
        let description = find_goal(goal_name)
            .map(|entry| entry.description.to_string())
            .unwrap_or_default();
        Self {
            goal_name: goal_name.to_string(),
            description,
            target_date: None,
            required_skills: map_goal_to_skills(goal_name),
        }
    }

    /// Mean mastery across the required skills; 0 when there are none.
    pub fn progress(&self) -> f64 {
        if self.required_skills.is_empty() {
            return 0.0;
        }
        let total: f64 = self.required_skills.iter().map(|s| s.mastery_level).sum();
        total / self.required_skills.len() as f64
    }

    /// Skills whose prerequisites are all mastered but which are not mastered yet.
    pub fn available_skills(&self) -> Vec<&Skill> {
        self.required_skills
            .iter()
            .filter(|s| s.mastery_level < MASTERY_THRESHOLD && s.is_unlocked(&self.required_skills))
            .collect()
    }
}

struct GoalEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    skills: fn() -> Vec<Skill>,
}

fn operating_systems_skills() -> Vec<Skill> {
    vec![
        Skill::new(
            "Process Management",
            "Understanding processes, fork(), exec(), and process lifecycle",
            0.6,
            &["System Calls"],
        ),
        Skill::new(
            "System Calls",
            "Knowledge of system calls and user/kernel mode transitions",
            0.5,
            &[],
        ),
        Skill::new(
            "File Systems",
            "File descriptors, I/O operations, and file management",
            0.6,
            &["System Calls"],
        ),
        Skill::new(
            "Signals & Interrupts",
            "Handling asynchronous events and interrupts",
            0.7,
            &["Process Management"],
        ),
        Skill::new(
            "Shell Operations",
            "Understanding shell execution, pipes, and redirection",
            0.6,
            &["Process Management", "File Systems"],
        ),
        Skill::new(
            "Memory Management",
            "Address space, heap, stack management",
            0.7,
            &["Process Management"],
        ),
        Skill::new(
            "Compilation Pipeline",
            "Understanding compilation, linking, and program execution",
            0.5,
            &[],
        ),
    ]
}

const CATALOGUE: &[GoalEntry] = &[GoalEntry {
    name: DEFAULT_GOAL,
    aliases: &["os exam", "operating systems", "pass os exam"],
    description: "Prepare for an operating systems exam covering processes, system calls, files and memory",
    skills: operating_systems_skills,
}];

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_goal(goal_name: &str) -> Option<&'static GoalEntry> {
    let wanted = normalize(goal_name);
    if wanted.is_empty() {
        return None;
    }

    if let Some(entry) = CATALOGUE.iter().find(|entry| {
        normalize(entry.name) == wanted || entry.aliases.iter().any(|a| *a == wanted)
    }) {
        return Some(entry);
    }

    if wanted.chars().count() < MIN_FUZZY_LEN {
        return None;
    }
    let matcher = SkimMatcherV2::default();
    CATALOGUE
        .iter()
        .filter_map(|entry| {
            let name = normalize(entry.name);
            let (score, indices) = matcher.fuzzy_indices(&name, &wanted)?;
            let unmatched = name.chars().count().saturating_sub(indices.len());
            (unmatched <= name.chars().count() / FUZZY_SLACK_RATIO).then_some((score, entry))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, entry)| entry)
}

/// Resolves a goal name to its skills, each starting at zero mastery.
///
/// Returns an empty list for goals the catalogue does not know.
pub fn map_goal_to_skills(goal_name: &str) -> Vec<Skill> {
    match find_goal(goal_name) {
        Some(entry) => {
            let skills = (entry.skills)();
            info!(goal = goal_name, matched = entry.name, skills = skills.len(), "Mapped goal to skills");
            skills
        }
        None => {
            info!(goal = goal_name, "No skills known for goal");
            Vec::new()
        }
    }
}

/// Lifts each skill's mastery from observed performance.
///
/// A skill whose name has been answered on as a topic uses that topic's
/// accuracy; any other skill follows the global knowledge level.
pub fn update_skill_mastery(skills: &mut [Skill], cognitive: &CognitiveModel) {
    for skill in skills.iter_mut() {
        let target = cognitive
            .topic_accuracy(&skill.name)
            .unwrap_or(cognitive.knowledge_level);
        skill.update_mastery(target);
        debug!(skill = %skill.name, mastery = skill.mastery_level, "Skill mastery updated");
    }
}
