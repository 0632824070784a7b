//! Learning-style inference.
//!
//! Classification and application are separate: [`classify`] maps
//! free text onto a list of [`StyleSignal`]s using a fixed keyword lexicon, and
//! [`apply`] folds those signals into a [`LearningStyleModel`]. The lexicon can
//! grow without touching the update math.

use crate::student::LearningStyleModel;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Size of a single style nudge.
pub const STYLE_STEP: f64 = 0.05;

/// Below this an axis leans to its first pole.
pub const FIRST_POLE_BAND: f64 = 0.4;
/// Above this an axis leans to its second pole.
pub const SECOND_POLE_BAND: f64 = 0.6;

/// One of the four Felder–Silverman dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleAxis {
    ActiveReflective,
    SensingIntuitive,
    VisualVerbal,
    SequentialGlobal,
}

impl StyleAxis {
    pub const ALL: [StyleAxis; 4] = [
        StyleAxis::ActiveReflective,
        StyleAxis::SensingIntuitive,
        StyleAxis::VisualVerbal,
        StyleAxis::SequentialGlobal,
    ];

    /// The pole a value leans towards, if it sits outside the neutral band.
    pub fn pole_for(self, value: f64) -> Option<StylePole> {
        let (first, second) = self.poles();
        if value < FIRST_POLE_BAND {
            Some(first)
        } else if value > SECOND_POLE_BAND {
            Some(second)
        } else {
            None
        }
    }

    pub fn poles(self) -> (StylePole, StylePole) {
        match self {
            StyleAxis::ActiveReflective => (StylePole::Active, StylePole::Reflective),
            StyleAxis::SensingIntuitive => (StylePole::Sensing, StylePole::Intuitive),
            StyleAxis::VisualVerbal => (StylePole::Visual, StylePole::Verbal),
            StyleAxis::SequentialGlobal => (StylePole::Sequential, StylePole::Global),
        }
    }
}

/// The eight ends of the four style axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePole {
    Active,
    Reflective,
    Sensing,
    Intuitive,
    Visual,
    Verbal,
    Sequential,
    Global,
}

impl StylePole {
    pub fn name(self) -> &'static str {
        match self {
            StylePole::Active => "active",
            StylePole::Reflective => "reflective",
            StylePole::Sensing => "sensing",
            StylePole::Intuitive => "intuitive",
            StylePole::Visual => "visual",
            StylePole::Verbal => "verbal",
            StylePole::Sequential => "sequential",
            StylePole::Global => "global",
        }
    }
}

/// Which way a signal pushes its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Towards 0.0.
    FirstPole,
    /// Towards 1.0.
    SecondPole,
}

impl Direction {
    fn delta(self) -> f64 {
        match self {
            Direction::FirstPole => -STYLE_STEP,
            Direction::SecondPole => STYLE_STEP,
        }
    }
}

/// A single keyword hit: the matched keyword and the nudge it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSignal {
    pub keyword: &'static str,
    pub axis: StyleAxis,
    pub direction: Direction,
}

const LEXICON: &[(&str, StyleAxis, Direction)] = &[
    ("example", StyleAxis::SensingIntuitive, Direction::FirstPole),
    ("practical", StyleAxis::SensingIntuitive, Direction::FirstPole),
    ("theory", StyleAxis::SensingIntuitive, Direction::SecondPole),
    ("concept", StyleAxis::SensingIntuitive, Direction::SecondPole),
    ("step by step", StyleAxis::SequentialGlobal, Direction::FirstPole),
    ("overview", StyleAxis::SequentialGlobal, Direction::SecondPole),
    ("big picture", StyleAxis::SequentialGlobal, Direction::SecondPole),
    ("diagram", StyleAxis::VisualVerbal, Direction::FirstPole),
    ("visual", StyleAxis::VisualVerbal, Direction::FirstPole),
    ("in words", StyleAxis::VisualVerbal, Direction::SecondPole),
    ("describe", StyleAxis::VisualVerbal, Direction::SecondPole),
    ("verbal", StyleAxis::VisualVerbal, Direction::SecondPole),
    ("hands-on", StyleAxis::ActiveReflective, Direction::FirstPole),
    ("try it", StyleAxis::ActiveReflective, Direction::FirstPole),
    ("practice", StyleAxis::ActiveReflective, Direction::FirstPole),
    ("reflect", StyleAxis::ActiveReflective, Direction::SecondPole),
    ("think about", StyleAxis::ActiveReflective, Direction::SecondPole),
];

/// Scans `text` case-insensitively and returns one signal per matched keyword.
pub fn classify(text: &str) -> Vec<StyleSignal> {
    let lowered = text.to_lowercase();
    LEXICON
        .iter()
        .filter(|(keyword, _, _)| lowered.contains(keyword))
        .map(|&(keyword, axis, direction)| StyleSignal {
            keyword,
            axis,
            direction,
        })
        .collect()
}

/// Applies each signal in turn, clamping after every step.
pub fn apply(model: &mut LearningStyleModel, signals: &[StyleSignal]) {
    for signal in signals {
        model.nudge(signal.axis, signal.direction.delta());
        debug!(keyword = signal.keyword, axis = ?signal.axis, "Learning style nudged");
    }
}
