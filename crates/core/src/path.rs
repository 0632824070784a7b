//! Adaptive Learning Path
//!
//! An ordered sequence of topic nodes with a cursor. After every graded answer
//! the cursor may move: first backwards when the student's overall knowledge
//! has dropped too low ([`remediation_target`]), then forwards when the node it
//! points at has been answered well enough ([`should_advance`]). The two checks
//! are separate functions applied in that fixed order by
//! [`AdaptiveLearningPath::update_progress`].

use crate::material::Flashcard;
use crate::student::{StudentModel, clamp_unit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Knowledge level below which the path steps back.
pub const REMEDIATION_THRESHOLD: f64 = 0.4;
/// How many nodes a remediation step moves back.
pub const REMEDIATION_STEP: usize = 2;
/// Success rate a node must exceed before the path moves past it.
pub const ADVANCE_THRESHOLD: f64 = 0.7;

const DEFAULT_DIFFICULTY: f64 = 0.5;
const MINUTES_PER_QUESTION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("node index {index} is out of range for a path of {len} nodes")]
    OutOfRange { index: usize, len: usize },
    #[error("stored path is inconsistent: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathNode {
    pub topic: String,
    pub difficulty: f64,
    /// Expected time in minutes.
    pub estimated_time: u32,
    pub questions: Vec<Flashcard>,
    pub completed: bool,
    pub attempts: u32,
    pub success_rate: f64,
}

impl LearningPathNode {
    pub fn new(topic: impl Into<String>, difficulty: f64, questions: Vec<Flashcard>) -> Self {
        let estimated_time = MINUTES_PER_QUESTION * questions.len().max(1) as u32;
        Self {
            topic: topic.into(),
            difficulty: clamp_unit(difficulty),
            estimated_time,
            questions,
            completed: false,
            attempts: 0,
            success_rate: 0.0,
        }
    }

    /// Folds one outcome into the success rate, a full-history running mean.
    pub fn record_attempt(&mut self, was_correct: bool) {
        let outcome = if was_correct { 1.0 } else { 0.0 };
        self.attempts += 1;
        let attempts = f64::from(self.attempts);
        self.success_rate = clamp_unit((self.success_rate * (attempts - 1.0) + outcome) / attempts);
    }
}

/// Where the cursor lands when remediation fires, or `None` when it does not.
///
/// Fires only when `knowledge_level` is below [`REMEDIATION_THRESHOLD`] and the
/// cursor is past the first node.
pub fn remediation_target(current: usize, knowledge_level: f64) -> Option<usize> {
    (knowledge_level < REMEDIATION_THRESHOLD && current > 0)
        .then(|| current.saturating_sub(REMEDIATION_STEP))
}

pub fn should_advance(node: &LearningPathNode) -> bool {
    node.success_rate > ADVANCE_THRESHOLD
}

/// Cursor movement produced by a single [`AdaptiveLearningPath::update_progress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub node_index: usize,
    pub remediated_to: Option<usize>,
    /// The node that was marked completed, if any.
    pub completed_node: Option<usize>,
    pub current_node_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveLearningPath {
    nodes: Vec<LearningPathNode>,
    current_node_index: usize,
}

impl AdaptiveLearningPath {
    pub fn new(nodes: Vec<LearningPathNode>) -> Self {
        Self {
            nodes,
            current_node_index: 0,
        }
    }

    /// Builds a path from flashcards.
    ///
    /// Cards sharing a topic become one node; cards without a topic each get a
    /// node of their own. Nodes are ordered from easiest to hardest, keeping
    /// the material's order among equals.
    pub fn from_flashcards(cards: &[Flashcard]) -> Self {
        let mut groups: Vec<(String, Vec<Flashcard>)> = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            match &card.topic {
                Some(topic) => match groups.iter_mut().find(|(t, _)| t == topic) {
                    Some((_, questions)) => questions.push(card.clone()),
                    None => groups.push((topic.clone(), vec![card.clone()])),
                },
                None => groups.push((format!("Topic {}", i + 1), vec![card.clone()])),
            }
        }

        let mut nodes: Vec<LearningPathNode> = groups
            .into_iter()
            .map(|(topic, questions)| {
                let difficulty = mean_difficulty(&questions);
                LearningPathNode::new(topic, difficulty, questions)
            })
            .collect();
        nodes.sort_by(|a, b| a.difficulty.total_cmp(&b.difficulty));

        info!(nodes = nodes.len(), cards = cards.len(), "Learning path initialized");
        Self::new(nodes)
    }

    pub fn nodes(&self) -> &[LearningPathNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn current_node_index(&self) -> usize {
        self.current_node_index
    }

    pub fn current_node(&self) -> Option<&LearningPathNode> {
        self.nodes.get(self.current_node_index)
    }

    /// True once the final node has been completed.
    pub fn is_finished(&self) -> bool {
        self.nodes
            .last()
            .is_some_and(|last| last.completed && self.current_node_index + 1 == self.nodes.len())
    }

    /// First question of the current node, or `None` when nothing is left.
    pub fn next_question(&self) -> Option<&Flashcard> {
        if self.is_finished() {
            return None;
        }
        self.current_node().and_then(|node| node.questions.first())
    }

    /// True when both paths have the same topics in the same order.
    pub fn same_layout(&self, other: &AdaptiveLearningPath) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.topic == b.topic)
    }

    /// Records an outcome on `node_index`, then re-evaluates the cursor.
    ///
    /// Remediation is checked first against `student`'s knowledge level;
    /// advancement is then checked against whichever node the cursor points at
    /// after remediation. Nothing is mutated when `node_index` is out of range.
    pub fn update_progress(
        &mut self,
        node_index: usize,
        was_correct: bool,
        student: &StudentModel,
    ) -> Result<ProgressUpdate, PathError> {
        let len = self.nodes.len();
        let node = self
            .nodes
            .get_mut(node_index)
            .ok_or(PathError::OutOfRange { index: node_index, len })?;
        node.record_attempt(was_correct);
        debug!(
            node_index,
            topic = %node.topic,
            attempts = node.attempts,
            success_rate = node.success_rate,
            "Path node updated"
        );

        let remediated_to = self.apply_remediation(student.cognitive.knowledge_level);
        let completed_node = self.apply_advancement();

        Ok(ProgressUpdate {
            node_index,
            remediated_to,
            completed_node,
            current_node_index: self.current_node_index,
        })
    }

    fn apply_remediation(&mut self, knowledge_level: f64) -> Option<usize> {
        let target = remediation_target(self.current_node_index, knowledge_level)?;
        info!(
            from = self.current_node_index,
            to = target,
            knowledge_level,
            "Remediation: stepping back along the path"
        );
        self.current_node_index = target;
        Some(target)
    }

    fn apply_advancement(&mut self) -> Option<usize> {
        let index = self.current_node_index;
        let node = self.nodes.get_mut(index)?;
        if !should_advance(node) {
            return None;
        }
        node.completed = true;
        self.current_node_index = (index + 1).min(self.nodes.len() - 1);
        info!(completed = index, now_at = self.current_node_index, "Path node completed");
        Some(index)
    }

    /// Checks a path read back from storage.
    pub fn validate(&self) -> Result<(), PathError> {
        if !self.nodes.is_empty() && self.current_node_index >= self.nodes.len() {
            return Err(PathError::Malformed(format!(
                "cursor {} beyond {} nodes",
                self.current_node_index,
                self.nodes.len()
            )));
        }
        if let Some(node) = self
            .nodes
            .iter()
            .find(|n| !(0.0..=1.0).contains(&n.success_rate) || !(0.0..=1.0).contains(&n.difficulty))
        {
            return Err(PathError::Malformed(format!(
                "node `{}` has a scalar outside [0, 1]",
                node.topic
            )));
        }
        Ok(())
    }
}

fn mean_difficulty(cards: &[Flashcard]) -> f64 {
    let rated: Vec<f64> = cards.iter().filter_map(|c| c.difficulty).collect();
    if rated.is_empty() {
        DEFAULT_DIFFICULTY
    } else {
        rated.iter().sum::<f64>() / rated.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn path_of(len: usize) -> AdaptiveLearningPath {
        let cards: Vec<Flashcard> = (0..len)
            .map(|i| Flashcard::new(format!("Q{i}"), format!("A{i}")))
            .collect();
        AdaptiveLearningPath::from_flashcards(&cards)
    }

    fn student_with_knowledge(level: f64) -> StudentModel {
        let mut student = StudentModel::new("path-test");
        student.cognitive.knowledge_level = level;
        student
    }

    #[test]
    fn test_from_flashcards_groups_and_orders() {
        let cards = vec![
            Flashcard::new("q1", "a1").with_topic("Memory").with_difficulty(0.8),
            Flashcard::new("q2", "a2"),
            Flashcard::new("q3", "a3").with_topic("Memory").with_difficulty(0.6),
            Flashcard::new("q4", "a4").with_topic("Syscalls").with_difficulty(0.3),
        ];
        let path = AdaptiveLearningPath::from_flashcards(&cards);
        let topics: Vec<_> = path.nodes().iter().map(|n| n.topic.as_str()).collect();
        assert_eq!(topics, vec!["Syscalls", "Topic 2", "Memory"]);

        let memory = &path.nodes()[2];
        assert_eq!(memory.questions.len(), 2);
        assert_relative_eq!(memory.difficulty, 0.7, epsilon = 1e-12);
        assert_eq!(memory.estimated_time, 10);
        assert_eq!(path.current_node_index(), 0);
    }

    #[test]
    fn test_success_rate_base_case() {
        let mut node = LearningPathNode::new("t", 0.5, vec![]);
        for _ in 0..7 {
            node.record_attempt(true);
        }
        assert_eq!(node.success_rate, 1.0);

        let mut node = LearningPathNode::new("t", 0.5, vec![]);
        for _ in 0..7 {
            node.record_attempt(false);
        }
        assert_eq!(node.success_rate, 0.0);
    }

    #[test]
    fn test_success_rate_keeps_full_history() {
        let mut node = LearningPathNode::new("t", 0.5, vec![]);
        node.record_attempt(true);
        node.record_attempt(false);
        node.record_attempt(true);
        assert_eq!(node.attempts, 3);
        assert_relative_eq!(node.success_rate, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_does_not_mutate() {
        let mut path = path_of(3);
        let before = path.clone();
        let err = path
            .update_progress(3, true, &student_with_knowledge(0.5))
            .unwrap_err();
        assert_eq!(err, PathError::OutOfRange { index: 3, len: 3 });
        assert_eq!(path, before);

        let mut empty = AdaptiveLearningPath::default();
        assert!(empty.update_progress(0, true, &student_with_knowledge(0.5)).is_err());
    }

    #[test]
    fn test_remediation_target() {
        assert_eq!(remediation_target(0, 0.1), None);
        assert_eq!(remediation_target(1, 0.1), Some(0));
        assert_eq!(remediation_target(5, 0.39), Some(3));
        assert_eq!(remediation_target(5, 0.4), None);
    }

    #[test]
    fn test_correct_answer_advances() {
        let mut path = path_of(3);
        let update = path
            .update_progress(0, true, &student_with_knowledge(0.6))
            .unwrap();
        assert_eq!(update.completed_node, Some(0));
        assert_eq!(update.remediated_to, None);
        assert_eq!(path.current_node_index(), 1);
        assert!(path.nodes()[0].completed);
    }

    #[test]
    fn test_advancement_clamps_at_last_node() {
        let mut path = path_of(2);
        let student = student_with_knowledge(0.8);
        path.update_progress(0, true, &student).unwrap();
        path.update_progress(1, true, &student).unwrap();
        assert_eq!(path.current_node_index(), 1);
        assert!(path.is_finished());
        assert_eq!(path.next_question(), None);
    }

    #[test]
    fn test_remediation_steps_back_two_nodes() {
        let mut path = path_of(5);
        let strong = student_with_knowledge(0.8);
        for i in 0..3 {
            path.update_progress(i, true, &strong).unwrap();
        }
        assert_eq!(path.current_node_index(), 3);

        let update = path
            .update_progress(3, false, &student_with_knowledge(0.3))
            .unwrap();
        assert_eq!(update.remediated_to, Some(1));
        // Node 1 was already completed, so advancement re-fires against it.
        assert_eq!(update.completed_node, Some(1));
        assert_eq!(path.current_node_index(), 2);
    }

    #[test]
    fn test_remediation_readvances_past_completed_node() {
        let mut path = path_of(4);
        let strong = student_with_knowledge(0.8);
        path.update_progress(0, true, &strong).unwrap();
        path.update_progress(1, false, &strong).unwrap();
        for _ in 0..3 {
            path.update_progress(1, true, &strong).unwrap();
        }
        assert_relative_eq!(path.nodes()[1].success_rate, 0.75, epsilon = 1e-12);
        assert_eq!(path.current_node_index(), 2);

        // Remediation lands on node 0, which was passed with a perfect record.
        let update = path
            .update_progress(2, false, &student_with_knowledge(0.2))
            .unwrap();
        assert_eq!(update.remediated_to, Some(0));
        assert_eq!(update.completed_node, Some(0));
        assert_eq!(path.current_node_index(), 1);
    }

    #[test]
    fn test_remediation_holds_on_weak_node() {
        let mut path = path_of(4);
        let strong = student_with_knowledge(0.8);
        path.update_progress(0, true, &strong).unwrap();
        path.update_progress(1, true, &strong).unwrap();
        for _ in 0..3 {
            path.update_progress(0, false, &strong).unwrap();
        }
        assert_relative_eq!(path.nodes()[0].success_rate, 0.25, epsilon = 1e-12);
        assert_eq!(path.current_node_index(), 2);

        let update = path
            .update_progress(2, false, &student_with_knowledge(0.2))
            .unwrap();
        assert_eq!(update.remediated_to, Some(0));
        assert_eq!(update.completed_node, None);
        assert_eq!(path.current_node_index(), 0);
    }

    #[test]
    fn test_remediation_never_fires_at_start() {
        let mut path = path_of(3);
        let update = path
            .update_progress(0, false, &student_with_knowledge(0.1))
            .unwrap();
        assert_eq!(update.remediated_to, None);
        assert_eq!(path.current_node_index(), 0);
    }

    #[test]
    fn test_next_question_and_layout() {
        let path = path_of(2);
        assert_eq!(path.next_question().map(|c| c.question.as_str()), Some("Q0"));
        assert!(path.same_layout(&path_of(2)));
        assert!(!path.same_layout(&path_of(3)));
        assert_eq!(AdaptiveLearningPath::default().next_question(), None);
    }

    #[test]
    fn test_validate() {
        let path = path_of(2);
        assert!(path.validate().is_ok());
        let mut json = serde_json::to_value(&path).unwrap();
        json["current_node_index"] = serde_json::json!(9);
        let broken: AdaptiveLearningPath = serde_json::from_value(json).unwrap();
        assert!(matches!(broken.validate(), Err(PathError::Malformed(_))));
    }
}
