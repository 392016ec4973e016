// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::{
            SubmitAttemptRequest, attempt_answers, attempt_by_id, attempts_summary,
            grade_submission, merge_attempt_review, persist_attempt,
        },
        quiz::{fetch_quiz, fetch_quiz_with_key, fetch_quizzes_by_topic},
    },
    utils::jwt::Claims,
};

/// Lists all quizzes under a topic in learner mode (no correctness flags).
pub async fn list_quizzes_by_topic(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = fetch_quizzes_by_topic(&pool, topic_id).await?;

    if quizzes.is_empty() {
        return Err(AppError::NotFound(
            "No quizzes found for this topic".to_string(),
        ));
    }

    Ok(Json(json!({ "quizzes": quizzes })))
}

/// Returns a single quiz in learner mode. The answer key is absent from the
/// underlying query, not stripped afterwards.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id)
        .await?
        .ok_or(AppError::NotFound("No quiz found with this ID".to_string()))?;

    Ok(Json(json!({ "quiz": [quiz] })))
}

/// Submits a quiz attempt: validates the picks against the authoritative
/// quiz, grades them, and persists the attempt with its answers atomically.
pub async fn take_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if payload.answers.is_empty() {
        return Err(AppError::BadRequest(
            "quizId and answers are required".to_string(),
        ));
    }

    let quiz = fetch_quiz_with_key(&pool, payload.quiz_id)
        .await?
        .ok_or(AppError::NotFound("No quiz found with this ID".to_string()))?;

    let graded = grade_submission(&quiz, &payload.answers)?;

    let attempt = persist_attempt(&pool, user_id, payload.quiz_id, &graded)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist attempt: {:?}", e);
            e
        })?;

    let correct_count = graded.iter().filter(|g| g.is_correct).count();

    Ok(Json(json!({
        "quizAttemptSummary": {
            "attemptId": attempt.id,
            "takenAt": attempt.taken_at,
            "correctCount": correct_count
        }
    })))
}

/// Lists the authenticated user's attempts at a quiz, most recent first.
pub async fn list_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = attempts_summary(&pool, user_id, quiz_id).await?;
    if attempts.is_empty() {
        return Err(AppError::NotFound("No attempts found".to_string()));
    }

    Ok(Json(json!({ "attempts": attempts })))
}

/// Returns the full review of one attempt. Only the owner may read it.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = attempt_by_id(&pool, attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    let quiz = fetch_quiz_with_key(&pool, attempt.quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let picks = attempt_answers(&pool, attempt_id).await?;

    let detail = merge_attempt_review(&attempt, &quiz, &picks);

    Ok(Json(detail))
}
