use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Every route here is reached only after `auth_middleware` resolved an
/// identity and `admin_middleware` confirmed the Administrator role; the
/// handlers do no role checks of their own.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Totals for users, articles, comments and both like ledgers.
        .route("/stats", get(handlers::admin_stats))
        // PUT /api/admin/users/{id}/role
        // Promotes or demotes an account. Takes effect on the target's next request.
        .route("/users/{id}/role", put(handlers::update_user_role))
}
