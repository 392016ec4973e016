// src/routes.rs

use axum::{
    Router, http::Method,
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, quiz, topic, user},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, user, topic, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/me", get(user::whoami))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let topic_routes = Router::new()
        .route("/", get(topic::list_topics))
        .route("/{topic_id}/quizzes", get(quiz::list_quizzes_by_topic))
        .route("/quiz/{quiz_id}", get(quiz::get_quiz))
        // Protected topic routes
        .merge(
            Router::new()
                .route("/quiz/take", post(quiz::take_quiz))
                .route("/quiz/{quiz_id}/attempts", get(quiz::list_attempts))
                .route("/quiz/attempt/{attempt_id}", get(quiz::get_attempt))
                .route("/{topic_id}/completed", get(topic::topic_completed))
                .route("/{topic_id}/average-score", get(topic::topic_average))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let admin_routes = Router::new()
        .route("/topics", post(admin::create_topic))
        .route("/topics/{topic_id}/quizzes", post(admin::create_quiz))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/user", user_routes)
        .nest("/api/topic", topic_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
