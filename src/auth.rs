use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::{AppError, AuthFailure},
    models::{Role, User},
    repository::CredentialStore,
    token::TokenService,
};

/// AuthUser
///
/// The request-scoped identity produced once by the authentication gate and
/// stored in the request extensions. It wraps the freshly loaded user record,
/// not the token claims, so a role change applies before the token expires.
#[derive(Debug, Clone)]
pub struct AuthUser {
    user: User,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self { user }
    }
}

/// authenticate
///
/// The authentication gate proper:
/// 1. Requires `Authorization: Bearer <token>`.
/// 2. Verifies the token (signature, algorithm, expiry).
/// 3. Re-fetches the identity by subject id; a deleted account is rejected even
///    though its token is still structurally valid.
pub async fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    users: &dyn CredentialStore,
) -> Result<AuthUser, AppError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthenticated(AuthFailure::MissingToken))?;
    let value = raw
        .to_str()
        .map_err(|_| AppError::Unauthenticated(AuthFailure::MalformedHeader))?;
    let token = bearer_token(value).ok_or(AppError::Unauthenticated(AuthFailure::MalformedHeader))?;

    let claims = tokens
        .verify(token)
        .map_err(|e| AppError::Unauthenticated(e.into()))?;
    let user_id = claims
        .user_id()
        .ok_or(AppError::Unauthenticated(AuthFailure::InvalidToken))?;

    let user = users
        .user_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthenticated(AuthFailure::AccountGone))?;

    Ok(AuthUser::from(user))
}

/// Splits `Bearer <token>`. The scheme is matched exactly.
fn bearer_token(value: &str) -> Option<&str> {
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// require_role
///
/// The role gate. A missing identity means the gate was mounted without the
/// authentication gate in front of it; it still surfaces as 401.
pub fn require_role(identity: Option<&AuthUser>, required: Role) -> Result<(), AppError> {
    let user = identity.ok_or(AppError::Unauthenticated(AuthFailure::MissingIdentity))?;
    match (required, user.role()) {
        (Role::Standard, _) | (Role::Administrator, Role::Administrator) => Ok(()),
        (Role::Administrator, Role::Standard) => {
            tracing::warn!(user_id = user.id(), "administrator role required");
            Err(AppError::Forbidden)
        }
    }
}

/// auth_middleware
///
/// Runs `authenticate` and attaches the resulting `AuthUser` to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(request.headers(), &state.tokens, state.users.as_ref())
        .await
        .inspect_err(|e| tracing::debug!(error = %e, "authentication gate rejected request"))?;
    tracing::debug!(user_id = user.id(), username = user.username(), "request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// admin_middleware
///
/// Must be layered inside `auth_middleware`.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(request.extensions().get::<AuthUser>(), Role::Administrator)?;
    Ok(next.run(request).await)
}

/// Handlers take `AuthUser` as an argument; it is read from the request
/// extensions only, never from headers.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated(AuthFailure::MissingIdentity))
    }
}
