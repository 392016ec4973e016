// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::{CreateQuizRequest, CreatedQuiz},
        topic::{CreateTopicRequest, Topic},
    },
};

/// Creates a new topic.
/// Admin only.
pub async fn create_topic(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let topic =
        sqlx::query_as::<_, Topic>("INSERT INTO topics (name) VALUES ($1) RETURNING id, name")
            .bind(&payload.name)
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create topic: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "topic": topic })),
    ))
}

/// Creates a quiz with its questions and answers under an existing topic.
/// Admin only.
///
/// The whole write runs in one transaction: quiz row, then each question with
/// `position = index + 1` (submission order is stored explicitly, never
/// inferred from insertion order), then that question's answers. Any failure
/// rolls the entire unit back, so no partial quiz is ever visible.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate_shape()?;

    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let quiz_id: i64 =
        sqlx::query_scalar("INSERT INTO quizzes (topic_id, name) VALUES ($1, $2) RETURNING id")
            .bind(topic_id)
            .bind(&payload.name)
            .fetch_one(&mut *tx)
            .await?;

    for (i, question) in payload.questions.iter().enumerate() {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (quiz_id, text, position) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(quiz_id)
        .bind(&question.text)
        .bind(i as i32 + 1)
        .fetch_one(&mut *tx)
        .await?;

        for answer in &question.answers {
            sqlx::query("INSERT INTO answers (question_id, text, is_correct) VALUES ($1, $2, $3)")
                .bind(question_id)
                .bind(&answer.text)
                .bind(answer.is_correct)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit quiz creation: {:?}", e);
        AppError::from(e)
    })?;

    let quiz = CreatedQuiz {
        id: quiz_id,
        topic_id,
        name: payload.name,
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "quiz": quiz })),
    ))
}
