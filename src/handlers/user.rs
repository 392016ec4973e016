// src/handlers/user.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::user::UserProfile, utils::jwt::Claims};

/// Returns the profile of the authenticated user.
pub async fn whoami(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT id, first_name, last_name, user_name, email, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::AuthError("Unauthorized".to_string()))?;

    Ok(Json(user))
}
