// src/handlers/topic.rs

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
        attempt::{attempted_quiz_ids, per_quiz_average_ratios},
        topic::{Topic, is_topic_completed, topic_average_score},
    },
    utils::jwt::Claims,
};

/// Lists all topics, ordered by name.
pub async fn list_topics(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let topics = sqlx::query_as::<_, Topic>("SELECT id, name FROM topics ORDER BY name")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list topics: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(json!({ "topics": topics })))
}

async fn topic_quiz_ids(pool: &PgPool, topic_id: i64) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar("SELECT id FROM quizzes WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Reports whether the authenticated user has attempted every quiz under the
/// topic. A topic without quizzes is never completed.
pub async fn topic_completed(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz_ids = topic_quiz_ids(&pool, topic_id).await?;
    let attempted = attempted_quiz_ids(&pool, user_id).await?;

    let completed = is_topic_completed(&quiz_ids, &attempted);

    Ok(Json(json!({ "completed": completed })))
}

/// Returns the user's average score for a topic: the mean over the topic's
/// quizzes of the per-quiz mean attempt ratio, with unattempted quizzes
/// counting as zero.
pub async fn topic_average(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz_ids = topic_quiz_ids(&pool, topic_id).await?;
    let per_quiz = per_quiz_average_ratios(&pool, user_id, &quiz_ids).await?;

    let average = topic_average_score(&quiz_ids, &per_quiz);

    Ok(Json(json!({ "averageScore": average })))
}
