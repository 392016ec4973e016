// src/models/quiz.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

/// One row of the flattened quiz x question x answer join, learner mode.
#[derive(Debug, Clone, FromRow)]
pub struct ContentRow {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub question_id: i64,
    pub question_text: String,
    pub question_pos: i32,
    pub answer_id: i64,
    pub answer_text: String,
}

/// Same join including the correctness flag, authoritative mode.
#[derive(Debug, Clone, FromRow)]
pub struct KeyedContentRow {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub question_id: i64,
    pub question_text: String,
    pub question_pos: i32,
    pub answer_id: i64,
    pub answer_text: String,
    pub is_correct: bool,
}

/// Candidate answer as shown to learners. The type has no correctness field,
/// so the answer key cannot leak through this view.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOption {
    pub id: i64,
    pub text: String,
}

/// Candidate answer in the authoritative view, used as the answer key for
/// grading and for admin/review display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedAnswer {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct QuestionNode<A> {
    pub id: i64,
    pub text: String,
    pub position: i32,
    pub answers: Vec<A>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizTree<A> {
    pub quiz_id: i64,
    pub quiz_name: String,
    pub questions: Vec<QuestionNode<A>>,
}

/// Incremental builder turning the ordered row stream into nested quiz trees.
///
/// Quizzes keep first-seen order; lookups go through id maps instead of
/// scanning the growing lists, so grouping stays linear in the row count.
struct TreeBuilder<A> {
    quizzes: Vec<QuizTree<A>>,
    quiz_index: HashMap<i64, usize>,
    question_index: HashMap<(i64, i64), usize>,
}

impl<A> TreeBuilder<A> {
    fn new() -> Self {
        Self {
            quizzes: Vec::new(),
            quiz_index: HashMap::new(),
            question_index: HashMap::new(),
        }
    }

    fn push(
        &mut self,
        quiz_id: i64,
        quiz_name: &str,
        question_id: i64,
        question_text: &str,
        position: i32,
        answer: A,
    ) {
        let qz_idx = match self.quiz_index.get(&quiz_id) {
            Some(&idx) => idx,
            None => {
                self.quizzes.push(QuizTree {
                    quiz_id,
                    quiz_name: quiz_name.to_owned(),
                    questions: Vec::new(),
                });
                let idx = self.quizzes.len() - 1;
                self.quiz_index.insert(quiz_id, idx);
                idx
            }
        };

        let quiz = &mut self.quizzes[qz_idx];
        let qs_idx = match self.question_index.get(&(quiz_id, question_id)) {
            Some(&idx) => idx,
            None => {
                quiz.questions.push(QuestionNode {
                    id: question_id,
                    text: question_text.to_owned(),
                    position,
                    answers: Vec::new(),
                });
                let idx = quiz.questions.len() - 1;
                self.question_index.insert((quiz_id, question_id), idx);
                idx
            }
        };

        quiz.questions[qs_idx].answers.push(answer);
    }

    fn finish(self) -> Vec<QuizTree<A>> {
        self.quizzes
    }
}

/// Groups learner-mode rows into nested quiz trees. Empty input yields an
/// empty list; the caller decides whether that means "not found".
pub fn group_content_rows(rows: &[ContentRow]) -> Vec<QuizTree<AnswerOption>> {
    let mut builder = TreeBuilder::new();
    for r in rows {
        builder.push(
            r.quiz_id,
            &r.quiz_name,
            r.question_id,
            &r.question_text,
            r.question_pos,
            AnswerOption {
                id: r.answer_id,
                text: r.answer_text.clone(),
            },
        );
    }
    builder.finish()
}

/// Groups authoritative-mode rows, carrying each answer's correctness flag.
pub fn group_keyed_rows(rows: &[KeyedContentRow]) -> Vec<QuizTree<KeyedAnswer>> {
    let mut builder = TreeBuilder::new();
    for r in rows {
        builder.push(
            r.quiz_id,
            &r.quiz_name,
            r.question_id,
            &r.question_text,
            r.question_pos,
            KeyedAnswer {
                id: r.answer_id,
                text: r.answer_text.clone(),
                is_correct: r.is_correct,
            },
        );
    }
    builder.finish()
}

const CONTENT_BY_TOPIC_SQL: &str = r#"
    SELECT qz.id       AS quiz_id,
           qz.name     AS quiz_name,
           qs.id       AS question_id,
           qs.text     AS question_text,
           qs.position AS question_pos,
           ans.id      AS answer_id,
           ans.text    AS answer_text
    FROM quizzes qz
             JOIN questions qs ON qs.quiz_id = qz.id
             JOIN answers ans ON ans.question_id = qs.id
    WHERE qz.topic_id = $1
    ORDER BY qz.id, qs.position, ans.id
"#;

const CONTENT_BY_QUIZ_SQL: &str = r#"
    SELECT qz.id       AS quiz_id,
           qz.name     AS quiz_name,
           qs.id       AS question_id,
           qs.text     AS question_text,
           qs.position AS question_pos,
           ans.id      AS answer_id,
           ans.text    AS answer_text
    FROM quizzes qz
             JOIN questions qs ON qs.quiz_id = qz.id
             JOIN answers ans ON ans.question_id = qs.id
    WHERE qz.id = $1
    ORDER BY qs.position, ans.id
"#;

const KEYED_CONTENT_BY_QUIZ_SQL: &str = r#"
    SELECT qz.id          AS quiz_id,
           qz.name        AS quiz_name,
           qs.id          AS question_id,
           qs.text        AS question_text,
           qs.position    AS question_pos,
           ans.id         AS answer_id,
           ans.text       AS answer_text,
           ans.is_correct AS is_correct
    FROM quizzes qz
             JOIN questions qs ON qs.quiz_id = qz.id
             JOIN answers ans ON ans.question_id = qs.id
    WHERE qz.id = $1
    ORDER BY qs.position, ans.id
"#;

/// Fetches all quizzes under a topic in learner mode.
pub async fn fetch_quizzes_by_topic(
    pool: &PgPool,
    topic_id: i64,
) -> Result<Vec<QuizTree<AnswerOption>>, AppError> {
    let rows = sqlx::query_as::<_, ContentRow>(CONTENT_BY_TOPIC_SQL)
        .bind(topic_id)
        .fetch_all(pool)
        .await?;

    Ok(group_content_rows(&rows))
}

/// Fetches a single quiz in learner mode.
pub async fn fetch_quiz(
    pool: &PgPool,
    quiz_id: i64,
) -> Result<Option<QuizTree<AnswerOption>>, AppError> {
    let rows = sqlx::query_as::<_, ContentRow>(CONTENT_BY_QUIZ_SQL)
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;

    Ok(group_content_rows(&rows).into_iter().next())
}

/// Fetches a single quiz in authoritative mode. This is the sole source of
/// truth for grading and attempt review.
pub async fn fetch_quiz_with_key(
    pool: &PgPool,
    quiz_id: i64,
) -> Result<Option<QuizTree<KeyedAnswer>>, AppError> {
    let rows = sqlx::query_as::<_, KeyedContentRow>(KEYED_CONTENT_BY_QUIZ_SQL)
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;

    Ok(group_keyed_rows(&rows).into_iter().next())
}

/// Quiz as returned after creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedQuiz {
    pub id: i64,
    pub topic_id: i64,
    pub name: String,
}

/// DTO for authoring a quiz with its questions and answers in one request.
#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub name: String,
    pub questions: Vec<QuestionSpec>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionSpec {
    pub text: String,
    pub answers: Vec<AnswerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSpec {
    pub text: String,
    pub is_correct: bool,
}

pub const QUIZ_NAME_MIN: usize = 3;
pub const QUIZ_NAME_MAX: usize = 100;
pub const QUESTIONS_MIN: usize = 1;
pub const QUESTIONS_MAX: usize = 50;
pub const QUESTION_TEXT_MIN: usize = 5;
pub const QUESTION_TEXT_MAX: usize = 255;
pub const ANSWERS_MIN: usize = 2;
pub const ANSWERS_MAX: usize = 10;
pub const ANSWER_TEXT_MAX: usize = 100;

impl CreateQuizRequest {
    /// Ordered fail-fast shape check: the first violation aborts the whole
    /// request. Messages carry 1-based question/answer indexes so the client
    /// can pinpoint the offending entry. Runs before any row is written.
    pub fn validate_shape(&self) -> Result<(), AppError> {
        let name_len = self.name.chars().count();
        if name_len < QUIZ_NAME_MIN || name_len > QUIZ_NAME_MAX {
            return Err(AppError::BadRequest(format!(
                "Quiz name must be between {} and {} characters",
                QUIZ_NAME_MIN, QUIZ_NAME_MAX
            )));
        }

        if self.questions.len() < QUESTIONS_MIN || self.questions.len() > QUESTIONS_MAX {
            return Err(AppError::BadRequest(format!(
                "A quiz must have between {} and {} questions",
                QUESTIONS_MIN, QUESTIONS_MAX
            )));
        }

        for (qi, question) in self.questions.iter().enumerate() {
            let text_len = question.text.chars().count();
            if text_len < QUESTION_TEXT_MIN || text_len > QUESTION_TEXT_MAX {
                return Err(AppError::BadRequest(format!(
                    "Question {}: text must be between {} and {} characters",
                    qi + 1,
                    QUESTION_TEXT_MIN,
                    QUESTION_TEXT_MAX
                )));
            }

            if question.answers.len() < ANSWERS_MIN || question.answers.len() > ANSWERS_MAX {
                return Err(AppError::BadRequest(format!(
                    "Question {}: must have between {} and {} answers",
                    qi + 1,
                    ANSWERS_MIN,
                    ANSWERS_MAX
                )));
            }

            for (ai, answer) in question.answers.iter().enumerate() {
                let answer_len = answer.text.chars().count();
                if answer_len == 0 || answer_len > ANSWER_TEXT_MAX {
                    return Err(AppError::BadRequest(format!(
                        "Question {}, answer {}: text must be between 1 and {} characters",
                        qi + 1,
                        ai + 1,
                        ANSWER_TEXT_MAX
                    )));
                }
            }

            let correct_count = question.answers.iter().filter(|a| a.is_correct).count();
            if correct_count != 1 {
                return Err(AppError::BadRequest(format!(
                    "Question {}: exactly one answer must be marked correct (found {})",
                    qi + 1,
                    correct_count
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner_row(
        quiz_id: i64,
        quiz_name: &str,
        question_id: i64,
        position: i32,
        answer_id: i64,
    ) -> ContentRow {
        ContentRow {
            quiz_id,
            quiz_name: quiz_name.to_string(),
            question_id,
            question_text: format!("Question {}", question_id),
            question_pos: position,
            answer_id,
            answer_text: format!("Answer {}", answer_id),
        }
    }

    #[test]
    fn groups_rows_into_nested_trees() {
        let rows = vec![
            learner_row(1, "Algebra", 10, 1, 100),
            learner_row(1, "Algebra", 10, 1, 101),
            learner_row(1, "Algebra", 11, 2, 102),
            learner_row(1, "Algebra", 11, 2, 103),
            learner_row(2, "Geometry", 20, 1, 200),
            learner_row(2, "Geometry", 20, 1, 201),
        ];

        let quizzes = group_content_rows(&rows);

        assert_eq!(quizzes.len(), 2);
        assert_eq!(quizzes[0].quiz_id, 1);
        assert_eq!(quizzes[0].quiz_name, "Algebra");
        assert_eq!(quizzes[0].questions.len(), 2);
        assert_eq!(quizzes[0].questions[0].position, 1);
        assert_eq!(quizzes[0].questions[0].answers.len(), 2);
        assert_eq!(quizzes[0].questions[1].answers[1].id, 103);
        assert_eq!(quizzes[1].quiz_id, 2);
        assert_eq!(quizzes[1].questions.len(), 1);
    }

    #[test]
    fn grouping_preserves_row_order() {
        // Rows arrive ordered by quiz id, question position, answer id;
        // the tree must keep that order.
        let rows = vec![
            learner_row(5, "Order", 51, 1, 510),
            learner_row(5, "Order", 51, 1, 511),
            learner_row(5, "Order", 52, 2, 520),
            learner_row(5, "Order", 53, 3, 530),
        ];

        let quizzes = group_content_rows(&rows);
        let positions: Vec<i32> = quizzes[0].questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn empty_rows_give_empty_output() {
        assert!(group_content_rows(&[]).is_empty());
        assert!(group_keyed_rows(&[]).is_empty());
    }

    #[test]
    fn keyed_grouping_carries_correctness() {
        let rows = vec![
            KeyedContentRow {
                quiz_id: 1,
                quiz_name: "Algebra".into(),
                question_id: 10,
                question_text: "What is 2+2?".into(),
                question_pos: 1,
                answer_id: 100,
                answer_text: "3".into(),
                is_correct: false,
            },
            KeyedContentRow {
                quiz_id: 1,
                quiz_name: "Algebra".into(),
                question_id: 10,
                question_text: "What is 2+2?".into(),
                question_pos: 1,
                answer_id: 101,
                answer_text: "4".into(),
                is_correct: true,
            },
        ];

        let quizzes = group_keyed_rows(&rows);
        assert_eq!(quizzes.len(), 1);
        let answers = &quizzes[0].questions[0].answers;
        assert!(!answers[0].is_correct);
        assert!(answers[1].is_correct);
    }

    fn valid_request() -> CreateQuizRequest {
        CreateQuizRequest {
            name: "Algebra basics".into(),
            questions: vec![QuestionSpec {
                text: "What is 2+2?".into(),
                answers: vec![
                    AnswerSpec {
                        text: "3".into(),
                        is_correct: false,
                    },
                    AnswerSpec {
                        text: "4".into(),
                        is_correct: true,
                    },
                ],
            }],
        }
    }

    #[test]
    fn valid_authoring_request_passes() {
        assert!(valid_request().validate_shape().is_ok());
    }

    #[test]
    fn rejects_short_quiz_name() {
        let mut req = valid_request();
        req.name = "ab".into();
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("Quiz name"));
    }

    #[test]
    fn rejects_too_many_questions() {
        let mut req = valid_request();
        let template = req.questions.pop().unwrap();
        for _ in 0..51 {
            req.questions.push(QuestionSpec {
                text: template.text.clone(),
                answers: vec![
                    AnswerSpec {
                        text: "3".into(),
                        is_correct: false,
                    },
                    AnswerSpec {
                        text: "4".into(),
                        is_correct: true,
                    },
                ],
            });
        }
        assert!(req.validate_shape().is_err());
    }

    #[test]
    fn rejects_question_with_one_answer() {
        let mut req = valid_request();
        req.questions[0].answers.truncate(1);
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("Question 1"));
    }

    #[test]
    fn rejects_zero_correct_answers() {
        let mut req = valid_request();
        req.questions[0].answers[1].is_correct = false;
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn rejects_multiple_correct_answers() {
        let mut req = valid_request();
        req.questions[0].answers[0].is_correct = true;
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn names_offending_answer_index() {
        let mut req = valid_request();
        req.questions[0].answers[1].text = String::new();
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("Question 1, answer 2"));
    }

    #[test]
    fn first_violation_wins() {
        // Both the name and a question are invalid; the name check comes first.
        let mut req = valid_request();
        req.name = "x".into();
        req.questions[0].answers.clear();
        let err = req.validate_shape().unwrap_err();
        assert!(err.to_string().contains("Quiz name"));
    }
}
