// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, auth, exams, sessions},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exams, sessions, attempts).
/// * Protects everything except sign-in behind the JWT middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://127.0.0.1:5173"),
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
        .route("/login", post(auth::login))
        .route("/guest", post(auth::guest));

    let exam_routes = Router::new()
        .route("/", get(exams::list_exams))
        .route("/{id}", get(exams::get_exam))
        .route("/{id}/sessions", post(exams::start_session));

    let session_routes = Router::new()
        .route("/{id}", get(sessions::get_session).delete(sessions::discard))
        .route("/{id}/answers", put(sessions::select_answer))
        .route("/{id}/position", put(sessions::navigate))
        .route("/{id}/monitoring", put(sessions::report_monitoring))
        .route("/{id}/submit", post(sessions::submit))
        .route("/{id}/persist", post(sessions::persist));

    let attempt_routes = Router::new()
        .route("/", get(attempts::list_attempts))
        .route("/{id}/result", get(attempts::get_result));

    let protected_routes = Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/attempts", attempt_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
