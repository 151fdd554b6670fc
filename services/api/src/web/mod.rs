pub mod countdown_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use middleware::require_user;
pub use rest::{create_quiz_handler, get_quiz_handler, list_attempts_handler, list_quizzes_handler};
pub use ws_handler::ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Builds the API router: public catalog routes plus the routes that need
/// the caller's user id.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no user id required)
    let public_routes = Router::new()
        .route(
            "/quizzes",
            get(list_quizzes_handler).post(create_quiz_handler),
        )
        .route("/quizzes/{quiz_id}", get(get_quiz_handler));

    // User routes (x-user-id required)
    let user_routes = Router::new()
        .route("/attempts", get(list_attempts_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .with_state(app_state)
}
