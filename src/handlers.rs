use crate::{
    CatalogState, CredentialState, InteractionEngine, TokenService,
    auth::AuthUser,
    error::{AppError, AuthFailure, ConflictReason},
    models::{
        Article, ArticleDetail, ArticleFilter, ArticleOrder, CommentCreated, CreateCommentRequest,
        LikeResponse, LikeState, LikeTarget, LoginRequest, LoginResponse, NewUser, PortalStats,
        RegisterRequest, RegisteredUser, Role, TokenResponse, UpdateRoleRequest, User,
    },
    password::{hash_password, verify_password},
    repository::ArticleCatalog,
    response::ApiResponse,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

const MIN_PASSWORD_LEN: usize = 6;

// --- Extraction Helpers ---

/// Parses a path id. Non-numeric or non-positive ids are a validation error
/// rendered in the standard envelope, not axum's plain-text rejection.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(format!("invalid {what} id"))),
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(format!("invalid request body: {}", rejection.body_text())))
}

// --- Accounts ---

/// login
///
/// [Public Route] Exchanges username + password for a signed token. Unknown
/// usernames and wrong passwords get the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn login(
    State(users): State<CredentialState>,
    State(tokens): State<TokenService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let req = json_body(payload)?;

    let user = match users.user_by_username(&req.username).await? {
        Some(user) if verify_password(&req.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(username = %req.username, "login failed");
            return Err(AppError::Unauthenticated(AuthFailure::BadCredentials));
        }
    };

    let issued = tokens.issue(&user)?;
    tracing::info!(user_id = user.id, "login succeeded");
    Ok(ApiResponse::ok(
        "login successful",
        LoginResponse {
            token: issued.token,
            user,
            expire: issued.expires_at,
        },
    ))
}

/// register
///
/// [Public Route] Creates a Standard account. Duplicate username or email is
/// a 409.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = RegisteredUser),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn register(
    State(users): State<CredentialState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<RegisteredUser>, AppError> {
    let req = json_body(payload)?;

    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    let email = req.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(AppError::Validation("email is not valid".to_string())),
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // Checked up front to skip hashing for an obvious duplicate. `create_user`
    // still enforces uniqueness for concurrent registrations.
    if users.user_by_username(username).await?.is_some()
        || users.user_by_email(email).await?.is_some()
    {
        return Err(AppError::Conflict(ConflictReason::AccountExists));
    }

    let user = users
        .create_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(&req.password)?,
            role: Role::Standard,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(ApiResponse::ok(
        "registration successful",
        RegisteredUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    ))
}

/// refresh_token
///
/// [Authenticated Route] Issues a new token for the identity resolved by the
/// authentication gate, carrying its current role.
#[utoipa::path(
    post,
    path = "/api/refresh-token",
    responses((status = 200, description = "Token refreshed", body = TokenResponse))
)]
pub async fn refresh_token(
    auth: AuthUser,
    State(tokens): State<TokenService>,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    let issued = tokens.issue(auth.user())?;
    Ok(ApiResponse::ok(
        "token refreshed",
        TokenResponse {
            token: issued.token,
            expire: issued.expires_at,
        },
    ))
}

// --- Interactions ---

/// add_comment
///
/// [Authenticated Route] Appends a comment to an article.
#[utoipa::path(
    post,
    path = "/api/article/{id}/comment",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment added", body = CommentCreated),
        (status = 404, description = "Article not found")
    )
)]
pub async fn add_comment(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<ApiResponse<CommentCreated>, AppError> {
    let article_id = parse_id(&raw_id, "article")?;
    let req = json_body(payload)?;
    let comment_id = engine
        .add_comment(article_id, &req.content, auth.id())
        .await?;
    Ok(ApiResponse::ok(
        "comment added",
        CommentCreated {
            comment_id,
            article_id,
        },
    ))
}

async fn change_like(
    engine: &InteractionEngine,
    user_id: i64,
    target: LikeTarget,
    desired: LikeState,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    engine.set_like_state(target, user_id, desired).await?;
    let message = match desired {
        LikeState::Liked => "liked",
        LikeState::Unliked => "like removed",
    };
    Ok(ApiResponse::ok(message, LikeResponse::for_target(target, None)))
}

async fn like_status(
    engine: &InteractionEngine,
    user_id: i64,
    target: LikeTarget,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let liked = engine.like_status(target, user_id).await?;
    Ok(ApiResponse::ok("ok", LikeResponse::for_target(target, Some(liked))))
}

/// like_article
///
/// [Authenticated Route] One like per user per article; a repeat is a 409.
#[utoipa::path(
    post,
    path = "/api/article/{id}/like",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Liked", body = LikeResponse),
        (status = 404, description = "Article not found"),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_article(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::article(parse_id(&raw_id, "article")?);
    change_like(&engine, auth.id(), target, LikeState::Liked).await
}

/// unlike_article
#[utoipa::path(
    delete,
    path = "/api/article/{id}/like",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Like removed", body = LikeResponse),
        (status = 409, description = "Not liked")
    )
)]
pub async fn unlike_article(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::article(parse_id(&raw_id, "article")?);
    change_like(&engine, auth.id(), target, LikeState::Unliked).await
}

/// article_like_status
#[utoipa::path(
    get,
    path = "/api/article/{id}/like",
    params(("id" = i64, Path, description = "Article ID")),
    responses((status = 200, description = "Like status", body = LikeResponse))
)]
pub async fn article_like_status(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::article(parse_id(&raw_id, "article")?);
    like_status(&engine, auth.id(), target).await
}

/// like_comment
///
/// [Authenticated Route] Only visible comments can be liked.
#[utoipa::path(
    post,
    path = "/api/comment/{id}/like",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Liked", body = LikeResponse),
        (status = 404, description = "Comment not found or hidden"),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_comment(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::comment(parse_id(&raw_id, "comment")?);
    change_like(&engine, auth.id(), target, LikeState::Liked).await
}

/// unlike_comment
#[utoipa::path(
    delete,
    path = "/api/comment/{id}/like",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Like removed", body = LikeResponse),
        (status = 409, description = "Not liked")
    )
)]
pub async fn unlike_comment(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::comment(parse_id(&raw_id, "comment")?);
    change_like(&engine, auth.id(), target, LikeState::Unliked).await
}

/// comment_like_status
#[utoipa::path(
    get,
    path = "/api/comment/{id}/like",
    params(("id" = i64, Path, description = "Comment ID")),
    responses((status = 200, description = "Like status", body = LikeResponse))
)]
pub async fn comment_like_status(
    auth: AuthUser,
    State(engine): State<InteractionEngine>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<LikeResponse>, AppError> {
    let target = LikeTarget::comment(parse_id(&raw_id, "comment")?);
    like_status(&engine, auth.id(), target).await
}

// --- Catalog ---

/// list_articles
///
/// [Public Route] Visible articles of a category.
#[utoipa::path(
    get,
    path = "/public/articles",
    params(ArticleFilter),
    responses((status = 200, description = "Articles", body = [Article]))
)]
pub async fn list_articles(
    State(catalog): State<CatalogState>,
    query: Result<Query<ArticleFilter>, QueryRejection>,
) -> Result<ApiResponse<Vec<Article>>, AppError> {
    let Query(filter) = query
        .map_err(|rejection| AppError::Validation(format!("invalid query: {}", rejection.body_text())))?;
    list_category(catalog.as_ref(), filter.category_id, filter.order).await
}

/// Shared by the generic listing and the fixed public feeds.
pub async fn list_category(
    catalog: &dyn ArticleCatalog,
    category_id: i64,
    order: ArticleOrder,
) -> Result<ApiResponse<Vec<Article>>, AppError> {
    let articles = catalog.list_articles(category_id, order).await?;
    Ok(ApiResponse::ok("ok", articles))
}

/// article_detail
///
/// [Public Route] An article with its visible comments.
#[utoipa::path(
    get,
    path = "/public/article/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = ArticleDetail),
        (status = 404, description = "Not found")
    )
)]
pub async fn article_detail(
    State(catalog): State<CatalogState>,
    Path(raw_id): Path<String>,
) -> Result<ApiResponse<ArticleDetail>, AppError> {
    let id = parse_id(&raw_id, "article")?;
    let article = catalog
        .article(id)
        .await?
        .ok_or_else(|| AppError::NotFound("article not found".to_string()))?;
    let comments = catalog.visible_comments(id).await?;
    Ok(ApiResponse::ok("ok", ArticleDetail { article, comments }))
}

// --- Administration ---

/// admin_stats
///
/// [Admin Route] Dashboard totals.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = PortalStats),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn admin_stats(
    State(catalog): State<CatalogState>,
) -> Result<ApiResponse<PortalStats>, AppError> {
    Ok(ApiResponse::ok("ok", catalog.stats().await?))
}

/// update_user_role
///
/// [Admin Route] The privileged role change. The target's next request sees
/// the new role because the authentication gate reloads the user.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_role(
    admin: AuthUser,
    State(users): State<CredentialState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<ApiResponse<User>, AppError> {
    let user_id = parse_id(&raw_id, "user")?;
    let req = json_body(payload)?;
    let user = users
        .set_role(user_id, req.role)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    tracing::info!(admin_id = admin.id(), user_id, role = ?req.role, "role updated");
    Ok(ApiResponse::ok("role updated", user))
}
