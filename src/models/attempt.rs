// src/models/attempt.rs

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::quiz::{KeyedAnswer, QuizTree};

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}

/// One recorded answer within an attempt. `is_correct` is a snapshot taken at
/// submission time and is never re-derived from quiz content.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptAnswerRow {
    pub question_id: i64,
    pub answer_id: i64,
    pub is_correct: bool,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    pub quiz_id: i64,
    pub answers: Vec<AnswerPick>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPick {
    pub question_id: i64,
    pub answer_id: i64,
}

/// A submitted pair after grading against the answer key.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub answer_id: i64,
    pub is_correct: bool,
}

/// Summary row for listing a user's attempts at a quiz.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub total_questions: i64,
    pub correct_count: i64,
}

/// Full review of one attempt: the authoritative quiz merged with the
/// learner's recorded picks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetail {
    pub attempt_id: i64,
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub quiz: QuizRef,
    pub questions: Vec<ReviewQuestion>,
}

#[derive(Debug, Serialize)]
pub struct QuizRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuestion {
    pub id: i64,
    pub text: String,
    pub position: i32,
    pub answers: Vec<ReviewAnswer>,
    pub user_answer_id: Option<i64>,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAnswer {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    pub selected: bool,
}

/// Validates the submitted pairs against the authoritative quiz and grades
/// them. Strict fail-fast: the first violation aborts the whole submission.
///
/// The submitted question-id set must equal the quiz's question-id set, and
/// every picked answer must belong to its claimed question.
pub fn grade_submission(
    quiz: &QuizTree<KeyedAnswer>,
    picks: &[AnswerPick],
) -> Result<Vec<GradedAnswer>, AppError> {
    let quiz_question_ids: HashSet<i64> = quiz.questions.iter().map(|q| q.id).collect();
    let picked_question_ids: HashSet<i64> = picks.iter().map(|p| p.question_id).collect();

    if picked_question_ids.len() != quiz_question_ids.len() {
        return Err(AppError::BadRequest(
            "Submitted answers must cover every question of the quiz exactly once".to_string(),
        ));
    }

    let mut answer_ids: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut correct_ids: HashMap<i64, HashSet<i64>> = HashMap::new();
    for question in &quiz.questions {
        answer_ids.insert(question.id, question.answers.iter().map(|a| a.id).collect());
        correct_ids.insert(
            question.id,
            question
                .answers
                .iter()
                .filter(|a| a.is_correct)
                .map(|a| a.id)
                .collect(),
        );
    }

    let mut graded = Vec::with_capacity(picks.len());
    for pick in picks {
        let Some(valid) = answer_ids.get(&pick.question_id) else {
            return Err(AppError::BadRequest(format!(
                "questionId {} does not exist in this quiz",
                pick.question_id
            )));
        };
        if !valid.contains(&pick.answer_id) {
            return Err(AppError::BadRequest(format!(
                "answerId {} is not a valid answer for questionId {}",
                pick.answer_id, pick.question_id
            )));
        }
        graded.push(GradedAnswer {
            question_id: pick.question_id,
            answer_id: pick.answer_id,
            is_correct: correct_ids[&pick.question_id].contains(&pick.answer_id),
        });
    }

    Ok(graded)
}

/// Persists an attempt and its graded answers in one transaction. An attempt
/// row must never be observable without its answers, so both inserts commit
/// together or not at all.
pub async fn persist_attempt(
    pool: &PgPool,
    user_id: i64,
    quiz_id: i64,
    graded: &[GradedAnswer],
) -> Result<Attempt, AppError> {
    let mut tx = pool.begin().await?;

    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        INSERT INTO quiz_attempts (user_id, quiz_id)
        VALUES ($1, $2)
        RETURNING id, user_id, quiz_id, taken_at
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO quiz_attempt_answers (attempt_id, question_id, answer_id, is_correct) ",
    );
    builder.push_values(graded, |mut b, answer| {
        b.push_bind(attempt.id)
            .push_bind(answer.question_id)
            .push_bind(answer.answer_id)
            .push_bind(answer.is_correct);
    });
    builder.build().execute(&mut *tx).await?;

    tx.commit().await?;

    Ok(attempt)
}

/// Lists a user's attempts at a quiz, most recent first.
pub async fn attempts_summary(
    pool: &PgPool,
    user_id: i64,
    quiz_id: i64,
) -> Result<Vec<AttemptSummary>, AppError> {
    let summaries = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT qa.id       AS attempt_id,
               qa.taken_at AS taken_at,
               COUNT(aa.id) AS total_questions,
               COUNT(aa.id) FILTER (WHERE aa.is_correct) AS correct_count
        FROM quiz_attempts qa
                 JOIN quiz_attempt_answers aa ON aa.attempt_id = qa.id
        WHERE qa.user_id = $1
          AND qa.quiz_id = $2
        GROUP BY qa.id, qa.taken_at
        ORDER BY qa.taken_at DESC
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(summaries)
}

pub async fn attempt_by_id(pool: &PgPool, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT id, user_id, quiz_id, taken_at FROM quiz_attempts WHERE id = $1",
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

pub async fn attempt_answers(
    pool: &PgPool,
    attempt_id: i64,
) -> Result<Vec<AttemptAnswerRow>, AppError> {
    let answers = sqlx::query_as::<_, AttemptAnswerRow>(
        r#"
        SELECT question_id, answer_id, is_correct
        FROM quiz_attempt_answers
        WHERE attempt_id = $1
        ORDER BY id
        "#,
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?;

    Ok(answers)
}

/// Quiz ids the user has attempted at least once.
pub async fn attempted_quiz_ids(pool: &PgPool, user_id: i64) -> Result<HashSet<i64>, AppError> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT quiz_id FROM quiz_attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(ids.into_iter().collect())
}

#[derive(Debug, FromRow)]
struct QuizRatioRow {
    quiz_id: i64,
    avg_ratio: f64,
}

/// Per-quiz mean of the user's attempt score ratios (correct / total), for the
/// given quizzes. Quizzes without attempts simply have no entry in the map.
pub async fn per_quiz_average_ratios(
    pool: &PgPool,
    user_id: i64,
    quiz_ids: &[i64],
) -> Result<HashMap<i64, f64>, AppError> {
    if quiz_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, QuizRatioRow>(
        r#"
        SELECT quiz_id, AVG(ratio) AS avg_ratio
        FROM (SELECT qa.quiz_id,
                     qa.id,
                     COUNT(aa.id) FILTER (WHERE aa.is_correct)::float8
                         / COUNT(aa.id) AS ratio
              FROM quiz_attempts qa
                       JOIN quiz_attempt_answers aa ON aa.attempt_id = qa.id
              WHERE qa.user_id = $1
                AND qa.quiz_id = ANY($2)
              GROUP BY qa.quiz_id, qa.id) t
        GROUP BY quiz_id
        "#,
    )
    .bind(user_id)
    .bind(quiz_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| (r.quiz_id, r.avg_ratio)).collect())
}

/// Merges the authoritative quiz with the attempt's recorded picks: every
/// answer is shown with its correctness flag, the learner's pick is marked
/// `selected`, and each question carries the frozen per-question result.
pub fn merge_attempt_review(
    attempt: &Attempt,
    quiz: &QuizTree<KeyedAnswer>,
    picks: &[AttemptAnswerRow],
) -> AttemptDetail {
    let pick_by_question: HashMap<i64, &AttemptAnswerRow> =
        picks.iter().map(|p| (p.question_id, p)).collect();

    let questions = quiz
        .questions
        .iter()
        .map(|question| {
            let picked = pick_by_question.get(&question.id);
            ReviewQuestion {
                id: question.id,
                text: question.text.clone(),
                position: question.position,
                answers: question
                    .answers
                    .iter()
                    .map(|answer| ReviewAnswer {
                        id: answer.id,
                        text: answer.text.clone(),
                        is_correct: answer.is_correct,
                        selected: picked.is_some_and(|p| p.answer_id == answer.id),
                    })
                    .collect(),
                user_answer_id: picked.map(|p| p.answer_id),
                is_correct: picked.is_some_and(|p| p.is_correct),
            }
        })
        .collect();

    AttemptDetail {
        attempt_id: attempt.id,
        taken_at: attempt.taken_at,
        quiz: QuizRef {
            id: quiz.quiz_id,
            name: quiz.quiz_name.clone(),
        },
        questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuestionNode;

    fn algebra_quiz() -> QuizTree<KeyedAnswer> {
        // Q1: answers A1 (100), A2 (101) - A2 correct
        // Q2: answers B1 (102), B2 (103) - B1 correct
        QuizTree {
            quiz_id: 1,
            quiz_name: "Algebra".into(),
            questions: vec![
                QuestionNode {
                    id: 10,
                    text: "Solve x + 1 = 3".into(),
                    position: 1,
                    answers: vec![
                        KeyedAnswer {
                            id: 100,
                            text: "x = 1".into(),
                            is_correct: false,
                        },
                        KeyedAnswer {
                            id: 101,
                            text: "x = 2".into(),
                            is_correct: true,
                        },
                    ],
                },
                QuestionNode {
                    id: 11,
                    text: "Solve 2x = 4".into(),
                    position: 2,
                    answers: vec![
                        KeyedAnswer {
                            id: 102,
                            text: "x = 2".into(),
                            is_correct: true,
                        },
                        KeyedAnswer {
                            id: 103,
                            text: "x = 4".into(),
                            is_correct: false,
                        },
                    ],
                },
            ],
        }
    }

    fn pick(question_id: i64, answer_id: i64) -> AnswerPick {
        AnswerPick {
            question_id,
            answer_id,
        }
    }

    #[test]
    fn all_correct_picks_grade_fully() {
        let graded = grade_submission(&algebra_quiz(), &[pick(10, 101), pick(11, 102)]).unwrap();
        assert_eq!(graded.iter().filter(|g| g.is_correct).count(), 2);
    }

    #[test]
    fn wrong_pick_counts_as_incorrect() {
        let graded = grade_submission(&algebra_quiz(), &[pick(10, 100), pick(11, 102)]).unwrap();
        assert_eq!(graded.iter().filter(|g| g.is_correct).count(), 1);
        assert!(!graded[0].is_correct);
        assert!(graded[1].is_correct);
    }

    #[test]
    fn rejects_answer_from_another_question() {
        // 102 belongs to question 11, not 10
        let err = grade_submission(&algebra_quiz(), &[pick(10, 102), pick(11, 102)]).unwrap_err();
        assert!(err.to_string().contains("answerId 102"));
    }

    #[test]
    fn rejects_missing_question() {
        let err = grade_submission(&algebra_quiz(), &[pick(10, 101)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_unknown_question_id() {
        let err = grade_submission(&algebra_quiz(), &[pick(10, 101), pick(99, 102)]).unwrap_err();
        assert!(err.to_string().contains("questionId 99"));
    }

    #[test]
    fn rejects_duplicate_picks_for_one_question() {
        // Two picks for question 10 leave question 11 uncovered
        let err = grade_submission(&algebra_quiz(), &[pick(10, 100), pick(10, 101)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn review_marks_selection_and_result() {
        let quiz = algebra_quiz();
        let attempt = Attempt {
            id: 7,
            user_id: 3,
            quiz_id: 1,
            taken_at: chrono::Utc::now(),
        };
        let picks = vec![
            AttemptAnswerRow {
                question_id: 10,
                answer_id: 100,
                is_correct: false,
            },
            AttemptAnswerRow {
                question_id: 11,
                answer_id: 102,
                is_correct: true,
            },
        ];

        let detail = merge_attempt_review(&attempt, &quiz, &picks);

        assert_eq!(detail.attempt_id, 7);
        assert_eq!(detail.quiz.name, "Algebra");
        assert_eq!(detail.questions.len(), 2);

        let q1 = &detail.questions[0];
        assert_eq!(q1.user_answer_id, Some(100));
        assert!(!q1.is_correct);
        assert!(q1.answers[0].selected);
        assert!(!q1.answers[0].is_correct);
        // The correct answer stays visible even when not selected
        assert!(q1.answers[1].is_correct);
        assert!(!q1.answers[1].selected);

        let q2 = &detail.questions[1];
        assert_eq!(q2.user_answer_id, Some(102));
        assert!(q2.is_correct);
    }

    #[test]
    fn review_handles_unanswered_question() {
        // Snapshot rows can be missing a question if content changed later;
        // the review must not invent a selection for it.
        let quiz = algebra_quiz();
        let attempt = Attempt {
            id: 8,
            user_id: 3,
            quiz_id: 1,
            taken_at: chrono::Utc::now(),
        };
        let picks = vec![AttemptAnswerRow {
            question_id: 10,
            answer_id: 101,
            is_correct: true,
        }];

        let detail = merge_attempt_review(&attempt, &quiz, &picks);
        let q2 = &detail.questions[1];
        assert_eq!(q2.user_answer_id, None);
        assert!(!q2.is_correct);
        assert!(q2.answers.iter().all(|a| !a.selected));
    }
}
