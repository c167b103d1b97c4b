use async_trait::async_trait;
use content_portal::{
    AppError, InMemoryRepository, InteractionEngine,
    error::ConflictReason,
    models::{LikeState, LikeTarget, NewUser, Role},
    repository::{CredentialStore, LedgerStore, LedgerTransaction},
};
use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicUsize, Ordering},
};

struct Fixture {
    repo: InMemoryRepository,
    engine: InteractionEngine,
    article_id: i64,
}

async fn fixture() -> Fixture {
    let repo = InMemoryRepository::new();
    let article_id = repo.insert_article(1, "Welcome", "First post").await;
    let engine = InteractionEngine::new(Arc::new(repo.clone()));
    Fixture {
        repo,
        engine,
        article_id,
    }
}

async fn user(repo: &InMemoryRepository, username: &str) -> i64 {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: "unused".to_string(),
        role: Role::Standard,
    })
    .await
    .unwrap()
    .id
}

fn is_conflict(result: Result<(), AppError>, reason: ConflictReason) -> bool {
    matches!(result, Err(AppError::Conflict(r)) if r == reason)
}

// --- Article likes ---

#[tokio::test]
async fn like_then_like_again_conflicts() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let target = LikeTarget::article(f.article_id);

    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    assert!(f.engine.like_status(target, alice).await.unwrap());
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 1);

    let again = f.engine.set_like_state(target, alice, LikeState::Liked).await;
    assert!(is_conflict(again, ConflictReason::AlreadyLiked));
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 1);
    assert_eq!(f.repo.like_rows(target).await, 1);
}

#[tokio::test]
async fn unlike_without_like_conflicts() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let target = LikeTarget::article(f.article_id);

    let result = f.engine.set_like_state(target, alice, LikeState::Unliked).await;
    assert!(is_conflict(result, ConflictReason::NotLiked));
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn like_unlike_cycle_restores_count() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let target = LikeTarget::article(f.article_id);

    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    f.engine.set_like_state(target, alice, LikeState::Unliked).await.unwrap();

    assert!(!f.engine.like_status(target, alice).await.unwrap());
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 0);
    assert_eq!(f.repo.like_rows(target).await, 0);

    // And the pair can be liked again afterwards.
    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 1);
}

#[tokio::test]
async fn count_matches_ledger_rows_for_many_users() {
    let f = fixture().await;
    let target = LikeTarget::article(f.article_id);

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(user(&f.repo, &format!("user{i}")).await);
    }
    for &id in &ids {
        f.engine.set_like_state(target, id, LikeState::Liked).await.unwrap();
    }
    f.engine.set_like_state(target, ids[0], LikeState::Unliked).await.unwrap();
    f.engine.set_like_state(target, ids[3], LikeState::Unliked).await.unwrap();

    let article = f.repo.article_snapshot(f.article_id).await.unwrap();
    assert_eq!(article.like_count, 3);
    assert_eq!(f.repo.like_rows(target).await, 3);
}

#[tokio::test]
async fn concurrent_likes_by_same_user_apply_once() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let target = LikeTarget::article(f.article_id);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = f.engine.clone();
            tokio::spawn(async move { engine.set_like_state(target, alice, LikeState::Liked).await })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(AppError::Conflict(ConflictReason::AlreadyLiked)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 1);
    assert_eq!(f.repo.like_rows(target).await, 1);
}

#[tokio::test]
async fn hidden_or_missing_article_is_not_found() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;

    let missing = f
        .engine
        .set_like_state(LikeTarget::article(9999), alice, LikeState::Liked)
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(msg)) if msg == "article not found"));

    f.repo.set_article_visibility(f.article_id, false).await;
    let hidden = f
        .engine
        .set_like_state(LikeTarget::article(f.article_id), alice, LikeState::Liked)
        .await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn failed_counter_update_rolls_back_ledger_row() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let target = LikeTarget::article(f.article_id);

    f.repo.fail_counter_updates(true);
    let result = f.engine.set_like_state(target, alice, LikeState::Liked).await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    assert_eq!(f.repo.like_rows(target).await, 0);
    assert!(!f.engine.like_status(target, alice).await.unwrap());
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 0);

    f.repo.fail_counter_updates(false);
    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    assert_eq!(f.repo.like_rows(target).await, 1);
}

// --- Comment likes ---

#[tokio::test]
async fn comment_likes_are_tracked_separately() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let comment_id = f.repo.insert_comment(f.article_id, alice, "nice").await.unwrap();
    let target = LikeTarget::comment(comment_id);

    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    assert_eq!(f.repo.comment_snapshot(comment_id).await.unwrap().like_count, 1);
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().like_count, 0);
    assert!(!f
        .engine
        .like_status(LikeTarget::article(f.article_id), alice)
        .await
        .unwrap());

    let again = f.engine.set_like_state(target, alice, LikeState::Liked).await;
    assert!(is_conflict(again, ConflictReason::AlreadyLiked));

    f.engine.set_like_state(target, alice, LikeState::Unliked).await.unwrap();
    assert_eq!(f.repo.comment_snapshot(comment_id).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn hidden_comment_cannot_be_liked_or_unliked() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;
    let comment_id = f.repo.insert_comment(f.article_id, alice, "nice").await.unwrap();
    let target = LikeTarget::comment(comment_id);

    f.engine.set_like_state(target, alice, LikeState::Liked).await.unwrap();
    f.repo.set_comment_visibility(comment_id, false).await;

    let unlike = f.engine.set_like_state(target, alice, LikeState::Unliked).await;
    assert!(matches!(unlike, Err(AppError::NotFound(msg)) if msg == "comment not found"));
    assert_eq!(f.repo.comment_snapshot(comment_id).await.unwrap().like_count, 1);
}

// --- Comments ---

#[tokio::test]
async fn add_comment_bumps_comment_count() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;

    let first = f.engine.add_comment(f.article_id, "  hello  ", alice).await.unwrap();
    let second = f.engine.add_comment(f.article_id, "hello", alice).await.unwrap();
    assert_ne!(first, second);

    let stored = f.repo.comment_snapshot(first).await.unwrap();
    assert_eq!(stored.content, "hello");
    assert_eq!(stored.user_id, alice);
    assert!(stored.is_visible);
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().comment_count, 2);
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;

    for content in ["", "   ", "\n\t"] {
        let result = f.engine.add_comment(f.article_id, content, alice).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{content:?}");
    }
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().comment_count, 0);
}

#[tokio::test]
async fn comment_on_missing_or_hidden_article_is_not_found() {
    let f = fixture().await;
    let alice = user(&f.repo, "alice").await;

    let missing = f.engine.add_comment(424242, "hello", alice).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    f.repo.set_article_visibility(f.article_id, false).await;
    let hidden = f.engine.add_comment(f.article_id, "hello", alice).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));
    assert_eq!(f.repo.article_snapshot(f.article_id).await.unwrap().comment_count, 0);
}

// --- Lost races ---

/// Ledger whose existence check is always stale: it reports the opposite of
/// what the uniqueness constraint then enforces, the way a concurrent request
/// for the same pair looks from inside a READ COMMITTED transaction.
#[derive(Default)]
struct StaleLedger {
    counter_delta: Arc<AtomicI64>,
    commits: Arc<AtomicUsize>,
}

struct StaleTransaction {
    counter_delta: Arc<AtomicI64>,
    commits: Arc<AtomicUsize>,
    liked_before: bool,
}

#[async_trait]
impl LedgerStore for StaleLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, AppError> {
        Ok(Box::new(StaleTransaction {
            counter_delta: self.counter_delta.clone(),
            commits: self.commits.clone(),
            liked_before: false,
        }))
    }

    async fn like_exists(&self, _target: LikeTarget, _user_id: i64) -> Result<bool, AppError> {
        Ok(false)
    }
}

#[async_trait]
impl LedgerTransaction for StaleTransaction {
    async fn target_visible(&mut self, _target: LikeTarget) -> Result<bool, AppError> {
        Ok(true)
    }

    // What the transaction saw before the competing request committed.
    async fn like_exists(&mut self, _target: LikeTarget, _user_id: i64) -> Result<bool, AppError> {
        Ok(self.liked_before)
    }

    async fn insert_like(&mut self, _target: LikeTarget, _user_id: i64) -> Result<bool, AppError> {
        Ok(false)
    }

    async fn delete_like(&mut self, _target: LikeTarget, _user_id: i64) -> Result<bool, AppError> {
        Ok(false)
    }

    async fn adjust_like_count(&mut self, _target: LikeTarget, delta: i64) -> Result<(), AppError> {
        self.counter_delta.fetch_add(delta, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_comment(
        &mut self,
        _article_id: i64,
        _user_id: i64,
        _content: &str,
    ) -> Result<i64, AppError> {
        Ok(1)
    }

    async fn increment_comment_count(&mut self, _article_id: i64) -> Result<(), AppError> {
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Same as `StaleLedger`, but every transaction believes the pair is liked.
struct StaleLikedLedger(StaleLedger);

#[async_trait]
impl LedgerStore for StaleLikedLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, AppError> {
        Ok(Box::new(StaleTransaction {
            counter_delta: self.0.counter_delta.clone(),
            commits: self.0.commits.clone(),
            liked_before: true,
        }))
    }

    async fn like_exists(&self, _target: LikeTarget, _user_id: i64) -> Result<bool, AppError> {
        Ok(true)
    }
}

#[tokio::test]
async fn insert_rejected_by_uniqueness_is_already_liked() {
    let ledger = StaleLedger::default();
    let (delta, commits) = (ledger.counter_delta.clone(), ledger.commits.clone());
    let engine = InteractionEngine::new(Arc::new(ledger));

    let result = engine
        .set_like_state(LikeTarget::article(1), 7, LikeState::Liked)
        .await;

    assert!(is_conflict(result, ConflictReason::AlreadyLiked));
    assert_eq!(delta.load(Ordering::SeqCst), 0);
    assert_eq!(commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_of_vanished_row_is_not_liked() {
    let ledger = StaleLikedLedger(StaleLedger::default());
    let (delta, commits) = (ledger.0.counter_delta.clone(), ledger.0.commits.clone());
    let engine = InteractionEngine::new(Arc::new(ledger));

    let result = engine
        .set_like_state(LikeTarget::comment(3), 7, LikeState::Unliked)
        .await;

    assert!(is_conflict(result, ConflictReason::NotLiked));
    assert_eq!(delta.load(Ordering::SeqCst), 0);
    assert_eq!(commits.load(Ordering::SeqCst), 0);
}
