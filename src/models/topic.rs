// src/models/topic.rs

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
}

/// DTO for creating a new topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 3, max = 50, message = "Topic name must be between 3 and 50 characters"))]
    pub name: String,
}

/// A topic counts as completed only when it has at least one quiz and every
/// quiz has been attempted by the user (subset check over quiz ids).
pub fn is_topic_completed(quiz_ids: &[i64], attempted_quiz_ids: &HashSet<i64>) -> bool {
    if quiz_ids.is_empty() {
        return false;
    }
    quiz_ids.iter().all(|id| attempted_quiz_ids.contains(id))
}

/// Two-level average: mean over quizzes of the per-quiz mean attempt ratio.
///
/// A quiz the user never attempted contributes 0 to the outer mean. This is a
/// deliberate business rule: it is NOT the same as averaging all attempts of
/// the topic in one flat pass, and must not be "simplified" into one.
pub fn topic_average_score(quiz_ids: &[i64], per_quiz_avg: &HashMap<i64, f64>) -> f64 {
    if quiz_ids.is_empty() {
        return 0.0;
    }
    let sum: f64 = quiz_ids
        .iter()
        .map(|id| per_quiz_avg.get(id).copied().unwrap_or(0.0))
        .sum();
    sum / quiz_ids.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_with_no_quizzes_is_never_completed() {
        assert!(!is_topic_completed(&[], &HashSet::from([1, 2])));
    }

    #[test]
    fn completion_requires_every_quiz_attempted() {
        let quizzes = [1, 2, 3];
        assert!(!is_topic_completed(&quizzes, &HashSet::from([1, 3])));
        assert!(is_topic_completed(&quizzes, &HashSet::from([1, 2, 3])));
        // Attempts at quizzes outside the topic do not matter
        assert!(is_topic_completed(&quizzes, &HashSet::from([1, 2, 3, 99])));
    }

    #[test]
    fn average_is_mean_of_per_quiz_means() {
        // Quiz 1 averages 0.75 across its attempts, quiz 2 has one attempt at 0.5
        let per_quiz = HashMap::from([(1, 0.75), (2, 0.5)]);
        let avg = topic_average_score(&[1, 2], &per_quiz);
        assert!((avg - 0.625).abs() < f64::EPSILON);
    }

    #[test]
    fn unattempted_quizzes_count_as_zero() {
        let per_quiz = HashMap::from([(1, 1.0)]);
        let avg = topic_average_score(&[1, 2], &per_quiz);
        assert!((avg - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn average_of_empty_topic_is_zero() {
        assert_eq!(topic_average_score(&[], &HashMap::new()), 0.0);
    }
}
