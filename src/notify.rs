use chrono::Duration;

use crate::models::{Id, NotificationKey, NotificationKind};
use crate::repo::NotificationRepo;

/// Max rows returned by a notification listing.
pub const LIST_LIMIT: usize = 50;

pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 3600;

pub const CREATE_FAILURES_METRIC: &str = "notification_create_failures_total";

#[derive(Clone, Debug)]
pub struct NotifyPolicy {
    pub dedup_window: Duration,
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self { dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS) }
    }
}

/// Record that `actor_id` did `kind` to `post_id` owned by `user_id`.
///
/// Fire-and-forget: self-actions are skipped without touching the repository,
/// and a matching notification inside the dedup window suppresses the insert.
/// Failures are logged and counted on [`CREATE_FAILURES_METRIC`], never returned.
///
/// The lookup and the insert are separate statements, so two concurrent calls
/// for the same key can both insert.
pub async fn create_notification<R: NotificationRepo + ?Sized>(
    repo: &R,
    policy: &NotifyPolicy,
    user_id: Id,
    actor_id: Id,
    post_id: Id,
    kind: NotificationKind,
) {
    let key = NotificationKey { user_id, actor_id, post_id, kind };
    if key.is_self_action() {
        return;
    }
    let existing = match repo.find_recent(&key, policy.dedup_window).await {
        Ok(v) => v,
        Err(e) => {
            log::error!("create notification lookup failed for {key:?}: {e}");
            metrics::counter!(CREATE_FAILURES_METRIC).increment(1);
            return;
        }
    };
    if let Some(id) = existing {
        log::debug!("notification {id} already covers {key:?}");
        return;
    }
    if let Err(e) = repo.insert_notification(&key).await {
        log::error!("create notification insert failed for {key:?}: {e}");
        metrics::counter!(CREATE_FAILURES_METRIC).increment(1);
    }
}

#[cfg(all(test, feature = "inmem-store"))]
mod tests {
    use super::*;
    use crate::models::NotificationView;
    use crate::repo::inmem::InMemRepo;
    use crate::repo::{RepoError, RepoResult};
    use async_trait::async_trait;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every call; optionally fails all of them, or only inserts.
    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
        fail: bool,
        fail_insert: bool,
    }

    impl CountingRepo {
        fn hit<T>(&self, ok: T) -> RepoResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(RepoError::Internal("db down".into())) } else { Ok(ok) }
        }
    }

    #[async_trait]
    impl NotificationRepo for CountingRepo {
        async fn find_recent(&self, _: &NotificationKey, _: Duration) -> RepoResult<Option<Id>> { self.hit(None) }
        async fn insert_notification(&self, _: &NotificationKey) -> RepoResult<Id> {
            if self.fail_insert {
                self.calls.fetch_add(1, Ordering::SeqCst);
                return Err(RepoError::Internal("insert rejected".into()));
            }
            self.hit(1)
        }
        async fn list_notifications(&self, _: Id, _: usize) -> RepoResult<Vec<NotificationView>> { self.hit(vec![]) }
        async fn mark_read(&self, _: Id) -> RepoResult<()> { self.hit(()) }
        async fn mark_all_read(&self, _: Id) -> RepoResult<u64> { self.hit(0) }
        async fn unread_count(&self, _: Id) -> RepoResult<i64> { self.hit(0) }
    }

    #[tokio::test]
    async fn self_action_never_reaches_repo() {
        let repo = CountingRepo::default();
        create_notification(&repo, &NotifyPolicy::default(), 1, 1, 5, NotificationKind::Like).await;
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let repo = CountingRepo { fail: true, ..Default::default() };
        create_notification(&repo, &NotifyPolicy::default(), 1, 2, 5, NotificationKind::Comment).await;
        // lookup failed, so no insert was attempted
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    fn failures_counted(repo: &CountingRepo) -> u64 {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        metrics::with_local_recorder(&recorder, || {
            rt.block_on(create_notification(repo, &NotifyPolicy::default(), 1, 2, 5, NotificationKind::Like))
        });
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, ..)| key.key().name() == CREATE_FAILURES_METRIC)
            .map(|(.., value)| match value {
                DebugValue::Counter(n) => n,
                other => panic!("unexpected metric value {other:?}"),
            })
            .unwrap_or(0)
    }

    #[test]
    fn failed_lookup_bumps_failure_counter() {
        assert_eq!(failures_counted(&CountingRepo { fail: true, ..Default::default() }), 1);
    }

    #[test]
    fn failed_insert_bumps_failure_counter() {
        let repo = CountingRepo { fail_insert: true, ..Default::default() };
        assert_eq!(failures_counted(&repo), 1);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn success_leaves_failure_counter_alone() {
        assert_eq!(failures_counted(&CountingRepo::default()), 0);
    }

    #[tokio::test]
    async fn sequential_duplicate_is_suppressed() {
        let repo = InMemRepo::new();
        let policy = NotifyPolicy::default();
        create_notification(&repo, &policy, 1, 2, 5, NotificationKind::Like).await;
        create_notification(&repo, &policy, 1, 2, 5, NotificationKind::Like).await;
        assert_eq!(repo.notification_count().unwrap(), 1);

        // a different kind on the same post is its own notification
        create_notification(&repo, &policy, 1, 2, 5, NotificationKind::Bookmark).await;
        assert_eq!(repo.notification_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn expired_window_allows_new_row() {
        let repo = InMemRepo::new();
        let policy = NotifyPolicy::default();
        create_notification(&repo, &policy, 1, 2, 5, NotificationKind::Like).await;
        let first = repo.list_notifications(1, LIST_LIMIT).await.unwrap()[0].id;
        repo.set_created_at(first, chrono::Utc::now() - Duration::hours(2)).unwrap();

        create_notification(&repo, &policy, 1, 2, 5, NotificationKind::Like).await;
        assert_eq!(repo.notification_count().unwrap(), 2);
    }
}
