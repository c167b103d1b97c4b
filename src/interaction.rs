use crate::{
    error::{AppError, ConflictReason},
    models::{LikeState, LikeTarget},
    repository::LedgerState,
};

/// InteractionEngine
///
/// Comment-append and like/unlike over the ledger store. Each mutating
/// operation runs in exactly one `LedgerTransaction`: the ledger row and the
/// denormalized counter change together or not at all.
///
/// The existence check before a like insert/delete is an early exit only. The
/// authoritative guard against a concurrent duplicate is the store's uniqueness
/// on (target, user), surfaced through `insert_like`/`delete_like` returning
/// false.
#[derive(Clone)]
pub struct InteractionEngine {
    ledger: LedgerState,
}

impl InteractionEngine {
    pub fn new(ledger: LedgerState) -> Self {
        Self { ledger }
    }

    /// add_comment
    ///
    /// Appends a visible comment to an article and bumps its comment count.
    /// Comments are not deduplicated.
    pub async fn add_comment(
        &self,
        article_id: i64,
        content: &str,
        user_id: i64,
    ) -> Result<i64, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment content must not be empty".to_string()));
        }

        let mut tx = self.ledger.begin().await?;
        if !tx.target_visible(LikeTarget::article(article_id)).await? {
            return Err(not_found(LikeTarget::article(article_id)));
        }
        let comment_id = tx.insert_comment(article_id, user_id, content).await?;
        tx.increment_comment_count(article_id).await?;
        tx.commit().await?;

        tracing::info!(article_id, comment_id, user_id, "comment added");
        Ok(comment_id)
    }

    /// set_like_state
    ///
    /// Moves the (target, user) pair to `desired`. Liking an already-liked
    /// target or unliking a not-liked one is a `Conflict`, and leaves the
    /// counter untouched.
    pub async fn set_like_state(
        &self,
        target: LikeTarget,
        user_id: i64,
        desired: LikeState,
    ) -> Result<(), AppError> {
        // Any early return drops `tx`, which rolls it back.
        let mut tx = self.ledger.begin().await?;

        if !tx.target_visible(target).await? {
            return Err(not_found(target));
        }

        let liked = tx.like_exists(target, user_id).await?;
        match (desired, liked) {
            (LikeState::Liked, true) => {
                return Err(AppError::Conflict(ConflictReason::AlreadyLiked));
            }
            (LikeState::Unliked, false) => {
                return Err(AppError::Conflict(ConflictReason::NotLiked));
            }
            (LikeState::Liked, false) | (LikeState::Unliked, true) => {}
        }

        let changed = match desired {
            LikeState::Liked => tx.insert_like(target, user_id).await?,
            LikeState::Unliked => tx.delete_like(target, user_id).await?,
        };
        if !changed {
            // Lost a race with a concurrent request for the same pair.
            return Err(AppError::Conflict(match desired {
                LikeState::Liked => ConflictReason::AlreadyLiked,
                LikeState::Unliked => ConflictReason::NotLiked,
            }));
        }

        tx.adjust_like_count(target, desired.delta()).await?;
        tx.commit().await?;

        tracing::info!(
            target_kind = target.kind.label(),
            target_id = target.id,
            user_id,
            state = ?desired,
            "like state changed"
        );
        Ok(())
    }

    /// like_status
    ///
    /// Whether the user currently likes the target. Plain read; no transaction.
    pub async fn like_status(&self, target: LikeTarget, user_id: i64) -> Result<bool, AppError> {
        self.ledger.like_exists(target, user_id).await
    }
}

fn not_found(target: LikeTarget) -> AppError {
    AppError::NotFound(format!("{} not found", target.kind.label()))
}
