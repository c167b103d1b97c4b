use crate::{AppState, handlers};
use axum::{
    Router,
    routing::post,
};

/// Authenticated Router Module
///
/// Interaction endpoints for any signed-in user. Handlers take the resolved
/// `AuthUser` as an argument and act on its id.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/refresh-token
        // Re-issues a token for the current identity with a fresh expiry.
        .route("/refresh-token", post(handlers::refresh_token))
        // POST /api/article/{id}/comment
        // Appends a comment and bumps the article's comment count atomically.
        .route("/article/{id}/comment", post(handlers::add_comment))
        // GET/POST/DELETE /api/article/{id}/like
        // Status, like and unlike. A repeated like or an unlike without a prior
        // like is a 409 and leaves the count unchanged.
        .route(
            "/article/{id}/like",
            post(handlers::like_article)
                .delete(handlers::unlike_article)
                .get(handlers::article_like_status),
        )
        // GET/POST/DELETE /api/comment/{id}/like
        // Same contract as articles; hidden comments are a 404.
        .route(
            "/comment/{id}/like",
            post(handlers::like_comment)
                .delete(handlers::unlike_comment)
                .get(handlers::comment_like_status),
        )
}
