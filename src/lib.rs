use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Security core: token issuing/verification and the authorization pipeline.
pub mod auth;
pub mod password;
pub mod token;

// Interactions and the stores behind them.
pub mod interaction;
pub mod memory;
pub mod repository;

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod response;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use interaction::InteractionEngine;
pub use memory::InMemoryRepository;
pub use repository::{
    ArticleCatalog, CatalogState, CredentialState, CredentialStore, LedgerState, LedgerStore,
    PostgresRepository,
};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register, handlers::refresh_token,
        handlers::add_comment,
        handlers::like_article, handlers::unlike_article, handlers::article_like_status,
        handlers::like_comment, handlers::unlike_comment, handlers::comment_like_status,
        handlers::list_articles, handlers::article_detail,
        handlers::admin_stats, handlers::update_user_role
    ),
    components(
        schemas(
            models::Role, models::User, models::Article, models::Comment, models::ArticleOrder,
            models::LoginRequest, models::RegisterRequest, models::CreateCommentRequest,
            models::UpdateRoleRequest, models::LoginResponse, models::TokenResponse,
            models::RegisteredUser, models::CommentCreated, models::LikeResponse,
            models::ArticleDetail, models::PortalStats,
        )
    ),
    tags(
        (name = "content-portal", description = "Content portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a handler can reach. Each store contract is held separately so
/// handlers extract only the capability they use (see the `FromRef` impls),
/// even though one repository usually backs all three.
#[derive(Clone)]
pub struct AppState {
    pub users: CredentialState,
    pub catalog: CatalogState,
    pub engine: InteractionEngine,
    pub tokens: TokenService,
}

impl AppState {
    /// Wires one repository into every store slot and derives the token
    /// service from the configured secret and lifetime.
    pub fn new<R>(repo: Arc<R>, config: &AppConfig) -> Self
    where
        R: CredentialStore + ArticleCatalog + LedgerStore + 'static,
    {
        let ledger: LedgerState = repo.clone();
        Self {
            users: repo.clone(),
            catalog: repo,
            engine: InteractionEngine::new(ledger),
            tokens: TokenService::new(&config.jwt_secret, config.jwt_expire_hours),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Handlers pull `State<CredentialState>`, `State<CatalogState>`,
// `State<InteractionEngine>` or `State<TokenService>` rather than the whole state.

impl FromRef<AppState> for CredentialState {
    fn from_ref(app_state: &AppState) -> CredentialState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for CatalogState {
    fn from_ref(app_state: &AppState) -> CatalogState {
        app_state.catalog.clone()
    }
}

impl FromRef<AppState> for InteractionEngine {
    fn from_ref(app_state: &AppState) -> InteractionEngine {
        app_state.engine.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing tree and the shared middleware stack.
///
/// Layer order on protected routes, outermost first: authentication gate, then
/// (admin only) role gate, then the handler. A request rejected by a gate never
/// reaches anything behind it.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // `route_layer` runs only for matched routes, so unknown paths stay 404
    // instead of turning into 401s.
    let api_router = Router::new()
        .merge(authenticated::authenticated_routes())
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn(auth::admin_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/api", api_router)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`; tags every log line of a request with its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
