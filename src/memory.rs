use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, ConflictReason},
    models::{
        Article, ArticleOrder, Comment, LikeTarget, NewUser, PortalStats, Role, TargetKind, User,
    },
    repository::{ArticleCatalog, CredentialStore, LedgerStore, LedgerTransaction},
};

#[derive(Clone, Default)]
struct MemoryState {
    last_user_id: i64,
    last_article_id: i64,
    last_comment_id: i64,
    users: BTreeMap<i64, User>,
    articles: BTreeMap<i64, Article>,
    comments: BTreeMap<i64, Comment>,
    // (target id, user id); set semantics give the same uniqueness as the
    // composite primary keys in Postgres.
    article_likes: HashSet<(i64, i64)>,
    comment_likes: HashSet<(i64, i64)>,
}

impl MemoryState {
    fn ledger(&self, kind: TargetKind) -> &HashSet<(i64, i64)> {
        match kind {
            TargetKind::Article => &self.article_likes,
            TargetKind::Comment => &self.comment_likes,
        }
    }

    fn ledger_mut(&mut self, kind: TargetKind) -> &mut HashSet<(i64, i64)> {
        match kind {
            TargetKind::Article => &mut self.article_likes,
            TargetKind::Comment => &mut self.comment_likes,
        }
    }

    fn like_count_mut(&mut self, target: LikeTarget) -> Option<&mut i64> {
        match target.kind {
            TargetKind::Article => self.articles.get_mut(&target.id).map(|a| &mut a.like_count),
            TargetKind::Comment => self.comments.get_mut(&target.id).map(|c| &mut c.like_count),
        }
    }

    fn next_comment(&mut self, article_id: i64, user_id: i64, content: &str) -> Option<i64> {
        if !self.articles.contains_key(&article_id) {
            return None;
        }
        self.last_comment_id += 1;
        let id = self.last_comment_id;
        self.comments.insert(
            id,
            Comment {
                id,
                article_id,
                user_id,
                content: content.to_string(),
                is_visible: true,
                like_count: 0,
                created_at: Utc::now(),
            },
        );
        Some(id)
    }
}

/// InMemoryRepository
///
/// Implements every store contract over process memory. A transaction holds
/// the state lock for its whole lifetime and works on a staged copy, so
/// transactions are serializable and an uncommitted one leaves no trace.
/// Used by the test suite and for running the API without Postgres.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    fail_counter_updates: Arc<AtomicBool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a visible article and returns its id.
    pub async fn insert_article(&self, category_id: i64, title: &str, content: &str) -> i64 {
        let mut state = self.state.lock().await;
        state.last_article_id += 1;
        let id = state.last_article_id;
        state.articles.insert(
            id,
            Article {
                id,
                title: title.to_string(),
                content: content.to_string(),
                category_id,
                is_visible: true,
                like_count: 0,
                comment_count: 0,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Seeds a comment, keeping the article's comment count in step.
    pub async fn insert_comment(&self, article_id: i64, user_id: i64, content: &str) -> Option<i64> {
        let mut state = self.state.lock().await;
        let id = state.next_comment(article_id, user_id, content)?;
        if let Some(article) = state.articles.get_mut(&article_id) {
            article.comment_count += 1;
        }
        Some(id)
    }

    pub async fn set_article_visibility(&self, id: i64, visible: bool) {
        if let Some(article) = self.state.lock().await.articles.get_mut(&id) {
            article.is_visible = visible;
        }
    }

    pub async fn set_comment_visibility(&self, id: i64, visible: bool) {
        if let Some(comment) = self.state.lock().await.comments.get_mut(&id) {
            comment.is_visible = visible;
        }
    }

    /// The stored article regardless of visibility.
    pub async fn article_snapshot(&self, id: i64) -> Option<Article> {
        self.state.lock().await.articles.get(&id).cloned()
    }

    /// The stored comment regardless of visibility.
    pub async fn comment_snapshot(&self, id: i64) -> Option<Comment> {
        self.state.lock().await.comments.get(&id).cloned()
    }

    /// Number of ledger rows referencing `target`.
    pub async fn like_rows(&self, target: LikeTarget) -> usize {
        self.state
            .lock()
            .await
            .ledger(target.kind)
            .iter()
            .filter(|(target_id, _)| *target_id == target.id)
            .count()
    }

    pub async fn delete_user(&self, id: i64) {
        self.state.lock().await.users.remove(&id);
    }

    /// Makes every subsequent like-count update fail, to exercise rollback.
    pub fn fail_counter_updates(&self, fail: bool) {
        self.fail_counter_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for InMemoryRepository {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let taken = state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(AppError::Conflict(ConflictReason::AccountExists));
        }
        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.users.get_mut(&id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().any(|u| u.role.is_admin()))
    }
}

#[async_trait]
impl ArticleCatalog for InMemoryRepository {
    async fn list_articles(
        &self,
        category_id: i64,
        order: ArticleOrder,
    ) -> Result<Vec<Article>, AppError> {
        let state = self.state.lock().await;
        let mut articles: Vec<Article> = state
            .articles
            .values()
            .filter(|a| a.category_id == category_id && a.is_visible)
            .cloned()
            .collect();
        articles.sort_by(|a, b| {
            let primary = match order {
                ArticleOrder::Latest => b.created_at.cmp(&a.created_at),
                ArticleOrder::Hottest => b.like_count.cmp(&a.like_count),
                ArticleOrder::MostDiscussed => b.comment_count.cmp(&a.comment_count),
            };
            primary.then(b.id.cmp(&a.id))
        });
        Ok(articles)
    }

    async fn article(&self, id: i64) -> Result<Option<Article>, AppError> {
        let state = self.state.lock().await;
        Ok(state.articles.get(&id).filter(|a| a.is_visible).cloned())
    }

    async fn visible_comments(&self, article_id: i64) -> Result<Vec<Comment>, AppError> {
        let state = self.state.lock().await;
        // BTreeMap iteration is id order, which is insertion order here.
        Ok(state
            .comments
            .values()
            .filter(|c| c.article_id == article_id && c.is_visible)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<PortalStats, AppError> {
        let state = self.state.lock().await;
        Ok(PortalStats {
            total_users: state.users.len() as i64,
            total_articles: state.articles.len() as i64,
            total_comments: state.comments.len() as i64,
            total_article_likes: state.article_likes.len() as i64,
            total_comment_likes: state.comment_likes.len() as i64,
        })
    }
}

#[async_trait]
impl LedgerStore for InMemoryRepository {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            fail_counter_updates: self.fail_counter_updates.load(Ordering::SeqCst),
        }))
    }

    async fn like_exists(&self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        let state = self.state.lock().await;
        Ok(state.ledger(target.kind).contains(&(target.id, user_id)))
    }
}

/// MemoryTransaction
///
/// Mutates `staged` only; `commit` publishes it through the held guard.
struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_counter_updates: bool,
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn target_visible(&mut self, target: LikeTarget) -> Result<bool, AppError> {
        Ok(match target.kind {
            TargetKind::Article => self.staged.articles.get(&target.id).is_some_and(|a| a.is_visible),
            TargetKind::Comment => self.staged.comments.get(&target.id).is_some_and(|c| c.is_visible),
        })
    }

    async fn like_exists(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        Ok(self.staged.ledger(target.kind).contains(&(target.id, user_id)))
    }

    async fn insert_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        Ok(self.staged.ledger_mut(target.kind).insert((target.id, user_id)))
    }

    async fn delete_like(&mut self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        Ok(self.staged.ledger_mut(target.kind).remove(&(target.id, user_id)))
    }

    async fn adjust_like_count(&mut self, target: LikeTarget, delta: i64) -> Result<(), AppError> {
        if self.fail_counter_updates {
            return Err(AppError::Internal("injected counter failure".to_string()));
        }
        if let Some(count) = self.staged.like_count_mut(target) {
            *count = (*count + delta).max(0);
        }
        Ok(())
    }

    async fn insert_comment(
        &mut self,
        article_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<i64, AppError> {
        self.staged
            .next_comment(article_id, user_id, content)
            .ok_or_else(|| AppError::NotFound("article not found".to_string()))
    }

    async fn increment_comment_count(&mut self, article_id: i64) -> Result<(), AppError> {
        if let Some(article) = self.staged.articles.get_mut(&article_id) {
            article.comment_count += 1;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
