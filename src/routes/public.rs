use crate::{AppState, CatalogState, handlers, models::ArticleOrder};
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

/// Feed
///
/// A fixed public listing: one category in one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub path: &'static str,
    pub category_id: i64,
    pub order: ArticleOrder,
}

const fn feed(path: &'static str, category_id: i64, order: ArticleOrder) -> Feed {
    Feed {
        path,
        category_id,
        order,
    }
}

/// The section pages of the portal.
pub const FEEDS: [Feed; 9] = [
    feed("/public/community/latest", 1, ArticleOrder::Latest),
    feed("/public/community/hottest", 1, ArticleOrder::Hottest),
    feed("/public/community/hotqa", 1, ArticleOrder::MostDiscussed),
    feed("/public/policy/latest", 2, ArticleOrder::Latest),
    feed("/public/policy/local", 4, ArticleOrder::Latest),
    feed("/public/policy/interpretation", 5, ArticleOrder::Latest),
    feed("/public/offline/cooperation", 6, ArticleOrder::Latest),
    feed("/public/offline/online", 7, ArticleOrder::Latest),
    feed("/public/offline/registration", 8, ArticleOrder::Latest),
];

/// Public Router Module
///
/// Anonymous endpoints. Catalog reads only ever return visible articles and
/// comments; that filter lives in the `ArticleCatalog` implementations.
pub fn public_routes() -> Router<AppState> {
    let router = Router::new()
        // GET /health
        // Liveness check.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Username + password in, signed token out.
        .route("/auth/login", post(handlers::login))
        // POST /auth/register
        // Creates a Standard account.
        .route("/auth/register", post(handlers::register))
        // GET /public/articles?category_id=..&order=latest|hottest|most_discussed
        .route("/public/articles", get(handlers::list_articles))
        // GET /public/article/{id}
        // Article plus its visible comments.
        .route("/public/article/{id}", get(handlers::article_detail));

    FEEDS.iter().fold(router, |router, &feed| {
        router.route(
            feed.path,
            get(move |State(catalog): State<CatalogState>| async move {
                handlers::list_category(catalog.as_ref(), feed.category_id, feed.order).await
            }),
        )
    })
}
