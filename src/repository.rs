use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

use crate::{
    error::{AppError, ConflictReason},
    models::{
        Article, ArticleOrder, Comment, LikeTarget, NewUser, PortalStats, Role, TargetKind, User,
    },
};

// --- Store Contracts ---

/// CredentialStore
///
/// User records read by the authentication gate on every request, plus the
/// few writes the account endpoints and the admin seed need.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Fails with `Conflict(AccountExists)` when the username or email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError>;
    async fn admin_exists(&self) -> Result<bool, AppError>;
}

/// ArticleCatalog
///
/// Read-only article/comment lookups backing the public pages and the
/// administrator dashboard.
#[async_trait]
pub trait ArticleCatalog: Send + Sync {
    /// Visible articles of one category, in the requested order.
    async fn list_articles(
        &self,
        category_id: i64,
        order: ArticleOrder,
    ) -> Result<Vec<Article>, AppError>;
    /// A visible article by id.
    async fn article(&self, id: i64) -> Result<Option<Article>, AppError>;
    /// Visible comments of an article, oldest first.
    async fn visible_comments(&self, article_id: i64) -> Result<Vec<Comment>, AppError>;
    async fn stats(&self) -> Result<PortalStats, AppError>;
}

/// LedgerStore
///
/// Entry point to the interaction ledgers. Every mutation goes through a
/// `LedgerTransaction`; only the like-status query reads outside one.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, AppError>;
    async fn like_exists(&self, target: LikeTarget, user_id: i64) -> Result<bool, AppError>;
}

/// LedgerTransaction
///
/// One atomic unit of work over articles, comments and the like ledgers.
/// Nothing is visible to other callers until `commit`; dropping the value
/// without committing discards every change made through it.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// True when the target exists and is visible.
    async fn target_visible(&mut self, target: LikeTarget) -> Result<bool, AppError>;
    async fn like_exists(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError>;
    /// Returns false when the (target, user) row already exists.
    async fn insert_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError>;
    /// Returns false when there was no (target, user) row to delete.
    async fn delete_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError>;
    /// Adds `delta` to the target's like count, never going below zero.
    async fn adjust_like_count(&mut self, target: LikeTarget, delta: i64) -> Result<(), AppError>;
    /// Inserts a visible comment and returns its id; fails with NotFound if the
    /// article does not exist.
    async fn insert_comment(
        &mut self,
        article_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<i64, AppError>;
    async fn increment_comment_count(&mut self, article_id: i64) -> Result<(), AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// Shared handles injected into `AppState`.
pub type CredentialState = Arc<dyn CredentialStore>;
pub type CatalogState = Arc<dyn ArticleCatalog>;
pub type LedgerState = Arc<dyn LedgerStore>;

// --- Postgres Implementation ---

/// PostgresRepository
///
/// Production implementation of all three store contracts over one pool.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role";
const ARTICLE_COLUMNS: &str =
    "id, title, content, category_id, is_visible, like_count, comment_count, created_at";

/// Static SQL per ledger, so table names are never assembled from input.
struct LedgerSql {
    target_visible: &'static str,
    like_exists: &'static str,
    insert_like: &'static str,
    delete_like: &'static str,
    adjust_count: &'static str,
}

const ARTICLE_LEDGER: LedgerSql = LedgerSql {
    target_visible: "SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1 AND is_visible)",
    like_exists: "SELECT EXISTS(SELECT 1 FROM article_likes WHERE article_id = $1 AND user_id = $2)",
    insert_like: "INSERT INTO article_likes (article_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    delete_like: "DELETE FROM article_likes WHERE article_id = $1 AND user_id = $2",
    adjust_count: "UPDATE articles SET like_count = GREATEST(like_count + $2, 0) WHERE id = $1",
};

const COMMENT_LEDGER: LedgerSql = LedgerSql {
    target_visible: "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1 AND is_visible)",
    like_exists: "SELECT EXISTS(SELECT 1 FROM comment_likes WHERE comment_id = $1 AND user_id = $2)",
    insert_like: "INSERT INTO comment_likes (comment_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    delete_like: "DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2",
    adjust_count: "UPDATE comments SET like_count = GREATEST(like_count + $2, 0) WHERE id = $1",
};

fn ledger_sql(kind: TargetKind) -> &'static LedgerSql {
    match kind {
        TargetKind::Article => &ARTICLE_LEDGER,
        TargetKind::Comment => &COMMENT_LEDGER,
    }
}

fn order_clause(order: ArticleOrder) -> &'static str {
    match order {
        ArticleOrder::Latest => "created_at DESC, id DESC",
        ArticleOrder::Hottest => "like_count DESC, id DESC",
        ArticleOrder::MostDiscussed => "comment_count DESC, id DESC",
    }
}

#[async_trait]
impl CredentialStore for PostgresRepository {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Relies on the UNIQUE constraints of `users` rather than a prior lookup,
    /// so two concurrent registrations cannot both succeed.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict(ConflictReason::AccountExists)
                }
                other => other.into(),
            })
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role = $1)")
                .bind(Role::Administrator)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl ArticleCatalog for PostgresRepository {
    async fn list_articles(
        &self,
        category_id: i64,
        order: ArticleOrder,
    ) -> Result<Vec<Article>, AppError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE category_id = $1 AND is_visible ORDER BY {}",
            order_clause(order)
        );
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn article(&self, id: i64) -> Result<Option<Article>, AppError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND is_visible");
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn visible_comments(&self, article_id: i64) -> Result<Vec<Comment>, AppError> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, article_id, user_id, content, is_visible, like_count, created_at
            FROM comments
            WHERE article_id = $1 AND is_visible
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Compiles all dashboard counters in a single round trip.
    async fn stats(&self) -> Result<PortalStats, AppError> {
        let (total_users, total_articles, total_comments, total_article_likes, total_comment_likes) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM articles),
                    (SELECT COUNT(*) FROM comments),
                    (SELECT COUNT(*) FROM article_likes),
                    (SELECT COUNT(*) FROM comment_likes)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(PortalStats {
            total_users,
            total_articles,
            total_comments,
            total_article_likes,
            total_comment_likes,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresRepository {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn like_exists(&self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        Ok(sqlx::query_scalar::<_, bool>(ledger_sql(target.kind).like_exists)
            .bind(target.id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }
}

/// PgLedgerTransaction
///
/// Wraps a `sqlx::Transaction`, which issues ROLLBACK when dropped before
/// `commit`. That covers early `?` returns as well as a cancelled request
/// future.
struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn target_visible(&mut self, target: LikeTarget) -> Result<bool, AppError> {
        Ok(sqlx::query_scalar::<_, bool>(ledger_sql(target.kind).target_visible)
            .bind(target.id)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn like_exists(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        Ok(sqlx::query_scalar::<_, bool>(ledger_sql(target.kind).like_exists)
            .bind(target.id)
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    // ON CONFLICT DO NOTHING: a concurrent insert of the same pair blocks on the
    // primary key until the other transaction finishes, then affects 0 rows.
    async fn insert_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        let res = sqlx::query(ledger_sql(target.kind).insert_like)
            .bind(target.id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        let res = sqlx::query(ledger_sql(target.kind).delete_like)
            .bind(target.id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn adjust_like_count(&mut self, target: LikeTarget, delta: i64) -> Result<(), AppError> {
        sqlx::query(ledger_sql(target.kind).adjust_count)
            .bind(target.id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_comment(
        &mut self,
        article_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO comments (article_id, user_id, content, is_visible) VALUES ($1, $2, $3, TRUE) RETURNING id",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match e {
            // The article vanished between the existence check and the insert.
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::NotFound("article not found".to_string())
            }
            other => other.into(),
        })
    }

    async fn increment_comment_count(&mut self, article_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE articles SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(article_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgLedgerTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
