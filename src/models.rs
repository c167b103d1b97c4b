use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

// --- Identity ---

/// Role
///
/// Closed set of account roles, stored as the Postgres enum `user_role`.
/// Every gate matches on it exhaustively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
    Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Standard,
    Administrator,
}

impl Role {
    pub fn is_admin(self) -> bool {
        match self {
            Role::Administrator => true,
            Role::Standard => false,
        }
    }
}

/// User
///
/// Canonical identity record from the `users` table. The password hash never
/// leaves the server: it is skipped by every serializer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
}

/// NewUser
///
/// Insert payload for the credential store. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Content ---

/// Article
///
/// `like_count` and `comment_count` are denormalized aggregates of the
/// `article_likes` and `comments` ledgers and are only mutated together with them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub is_visible: bool,
    pub like_count: i64,
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// Row from `comments`; `like_count` aggregates `comment_likes`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
    pub is_visible: bool,
    pub like_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ArticleOrder
///
/// Sort orders offered by the public listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArticleOrder {
    #[default]
    Latest,
    Hottest,
    MostDiscussed,
}

/// ArticleFilter
///
/// Query parameters for `GET /public/articles`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArticleFilter {
    pub category_id: i64,
    #[serde(default)]
    pub order: ArticleOrder,
}

// --- Interactions ---

/// TargetKind
///
/// Which ledger a like belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Article,
    Comment,
}

impl TargetKind {
    pub fn label(self) -> &'static str {
        match self {
            TargetKind::Article => "article",
            TargetKind::Comment => "comment",
        }
    }
}

/// LikeTarget
///
/// A likeable row: an article or a comment, by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LikeTarget {
    pub kind: TargetKind,
    pub id: i64,
}

impl LikeTarget {
    pub fn article(id: i64) -> Self {
        Self { kind: TargetKind::Article, id }
    }

    pub fn comment(id: i64) -> Self {
        Self { kind: TargetKind::Comment, id }
    }
}

/// LikeState
///
/// The state a caller wants a (target, user) pair to end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    Liked,
    Unliked,
}

impl LikeState {
    /// Counter adjustment applied when the transition succeeds.
    pub fn delta(self) -> i64 {
        match self {
            LikeState::Liked => 1,
            LikeState::Unliked => -1,
        }
    }
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RegisterRequest
///
/// Public sign-up payload. The role is not accepted from the client; new
/// accounts are always Standard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// --- Response Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    /// Expiry as a unix timestamp (seconds).
    pub expire: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
    pub expire: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisteredUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentCreated {
    pub comment_id: i64,
    pub article_id: i64,
}

/// LikeResponse
///
/// Echoes the target id under `article_id` or `comment_id`; `liked` is only
/// present on status queries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LikeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

impl LikeResponse {
    pub fn for_target(target: LikeTarget, liked: Option<bool>) -> Self {
        match target.kind {
            TargetKind::Article => Self {
                article_id: Some(target.id),
                liked,
                ..Self::default()
            },
            TargetKind::Comment => Self {
                comment_id: Some(target.id),
                liked,
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleDetail {
    pub article: Article,
    pub comments: Vec<Comment>,
}

/// PortalStats
///
/// Totals for the administrator dashboard (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[ts(export)]
pub struct PortalStats {
    pub total_users: i64,
    pub total_articles: i64,
    pub total_comments: i64,
    pub total_article_likes: i64,
    pub total_comment_likes: i64,
}
