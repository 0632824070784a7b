//! Terminal rendering for the tutor's non-dialogue output.

use std::fmt::Write;
use studybuddy_core::skills::LearningGoal;
use studybuddy_core::store::SessionRecord;
use studybuddy_core::student::StudentModel;

const MAX_LISTED_TOPICS: usize = 3;

pub fn profile(student: &StudentModel) -> String {
    let cognitive = &student.cognitive;
    let mut text = String::from("Student Profile:\n");
    let _ = writeln!(text, "   Student: {}", student.student_id);
    let _ = writeln!(text, "   Knowledge Level: {:.1}%", cognitive.knowledge_level * 100.0);
    let _ = writeln!(text, "   Sessions: {}", student.session_count);
    let _ = writeln!(text, "   Total Questions: {}", cognitive.total_answers);
    let _ = writeln!(text, "   Study Time: {:.1} minutes", student.total_study_time);
    if !cognitive.mastered_topics.is_empty() {
        let mastered: Vec<&str> = cognitive
            .mastered_topics
            .iter()
            .take(MAX_LISTED_TOPICS)
            .map(String::as_str)
            .collect();
        let _ = writeln!(text, "   Mastered: {}", mastered.join(", "));
    }
    let _ = writeln!(
        text,
        "   Learning Style: {}",
        student.learning_style.dominant_styles().join(", ")
    );
    text
}

pub fn goal(goal: &LearningGoal) -> String {
    let mut text = format!(
        "Goal: {} ({:.0}% complete)\n",
        goal.goal_name,
        goal.progress() * 100.0
    );
    for skill in &goal.required_skills {
        let marker = if skill.is_unlocked(&goal.required_skills) { " " } else { "x" };
        let _ = writeln!(text, "   [{}] {:<24} {:>5.1}%", marker, skill.name, skill.mastery_level * 100.0);
    }
    text
}

/// One-line knowledge and engagement readout shown after graded turns.
pub fn metrics(student: &StudentModel) -> String {
    format!(
        "Learning Metrics: Knowledge: {:.0}% | Engagement: {:.0}%",
        student.cognitive.knowledge_level * 100.0,
        student.affective.engagement_level * 100.0
    )
}

pub fn session_stats(record: &SessionRecord, student: &StudentModel) -> String {
    let mut text = String::from("Session Statistics\n");
    let _ = writeln!(text, "Duration: {:.1} minutes", record.duration_minutes);
    let _ = writeln!(text, "Questions Answered: {}", record.questions_answered);
    let _ = writeln!(text, "Correct Answers: {}", record.correct_answers);
    if record.questions_answered > 0 {
        let accuracy = f64::from(record.correct_answers) / f64::from(record.questions_answered);
        let _ = writeln!(text, "Session Accuracy: {:.1}%", accuracy * 100.0);
    }
    let _ = writeln!(text, "Overall Knowledge: {:.1}%", record.knowledge_level * 100.0);
    let _ = writeln!(text, "Total Study Time: {:.1} minutes", student.total_study_time);
    text
}

pub fn history(records: &[SessionRecord]) -> String {
    if records.is_empty() {
        return "No sessions recorded yet.\n".to_string();
    }
    let mut text = String::new();
    for record in records {
        let _ = writeln!(
            text,
            "{}  {:>6.1} min  {:>3}/{:<3} correct  knowledge {:>5.1}%  engagement {:>5.1}%",
            record.session_date.format("%Y-%m-%d %H:%M"),
            record.duration_minutes,
            record.correct_answers,
            record.questions_answered,
            record.knowledge_level * 100.0,
            record.engagement_level * 100.0,
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> SessionRecord {
        SessionRecord {
            student_id: "alice".into(),
            session_date: Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap(),
            duration_minutes: 12.5,
            questions_answered: 4,
            correct_answers: 3,
            knowledge_level: 0.61,
            engagement_level: 0.75,
        }
    }

    #[test]
    fn test_profile_lists_at_most_three_topics() {
        let mut student = StudentModel::new("alice");
        for topic in ["A", "B", "C", "D"] {
            student.cognitive.mastered_topics.insert(topic.into());
        }
        let text = profile(&student);
        assert!(text.contains("Mastered: A, B, C\n"));
        assert!(text.contains("Learning Style: balanced"));
    }

    #[test]
    fn test_metrics_line() {
        let student = StudentModel::new("alice");
        assert_eq!(metrics(&student), "Learning Metrics: Knowledge: 50% | Engagement: 70%");
    }

    #[test]
    fn test_session_stats() {
        let text = session_stats(&record(), &StudentModel::new("alice"));
        assert!(text.contains("Duration: 12.5 minutes"));
        assert!(text.contains("Session Accuracy: 75.0%"));
    }

    #[test]
    fn test_history() {
        assert_eq!(history(&[]), "No sessions recorded yet.\n");
        let text = history(&[record()]);
        assert!(text.starts_with("2025-03-01 09:05"));
        assert!(text.contains("3/4"));
    }

    #[test]
    fn test_goal_marks_locked_skills() {
        let os_goal = LearningGoal::from_catalogue("Pass Operating Systems Exam");
        let text = goal(&os_goal);
        assert!(text.starts_with("Goal: Pass Operating Systems Exam (0% complete)"));
        assert!(text.contains("[ ] System Calls"));
        assert!(text.contains("[x] Shell Operations"));
    }
}
