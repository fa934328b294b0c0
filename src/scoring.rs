// src/scoring.rs

use std::collections::HashMap;

use crate::models::question::Question;

/// Counts exact string matches between stored answers and the answer key.
///
/// Unanswered questions simply count as incorrect. No case folding and no
/// whitespace normalisation: `"a"` does not match `"A"`.
pub fn score(questions: &[Question], answers: &HashMap<i64, String>) -> i32 {
    questions
        .iter()
        .filter(|q| is_correct(q, answers.get(&q.id).map(String::as_str)))
        .count() as i32
}

pub fn is_correct(question: &Question, answer: Option<&str>) -> bool {
    answer == Some(question.correct_answer.as_str())
}

/// Percentage score, 0 when there are no questions.
pub fn percentage(score: i32, total_questions: i32) -> f64 {
    if total_questions <= 0 {
        return 0.0;
    }
    (score as f64 / total_questions as f64) * 100.0
}

/// Renders a duration as `H:MM:SS` (or `M:SS` under an hour).
///
/// A missing or zero duration renders as `N/A`.
pub fn format_duration(seconds: Option<i32>) -> String {
    let seconds = match seconds {
        Some(s) if s > 0 => s,
        _ => return "N/A".to_string(),
    };

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
