use async_trait::async_trait;
use chrono::Duration;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    /// Id of a notification with the same key created strictly inside the trailing `window`.
    async fn find_recent(&self, key: &NotificationKey, window: Duration) -> RepoResult<Option<Id>>;
    async fn insert_notification(&self, key: &NotificationKey) -> RepoResult<Id>;
    /// Newest first, enriched with actor and post summaries.
    async fn list_notifications(&self, user_id: Id, limit: usize) -> RepoResult<Vec<NotificationView>>;
    async fn mark_read(&self, id: Id) -> RepoResult<()>;
    async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64>;
    async fn unread_count(&self, user_id: Id) -> RepoResult<i64>;
}

pub trait Repo: NotificationRepo {}

impl<T> Repo for T where T: NotificationRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        notifications: HashMap<Id, Notification>,
        users: HashMap<Id, User>,
        posts: HashMap<Id, Post>,
        next_id: Id,
    }

    /// Process-local backend. With a snapshot path every write is flushed to a JSON file.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Load `<dir>/state.json` if present and persist back to it after each write.
        pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join("state.json");
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("[inmem] loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("[inmem] failed to parse snapshot '{}': {e}. Starting empty.", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("[inmem] no snapshot at '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let bytes = match self.read().and_then(|s| {
                serde_json::to_vec_pretty(&*s).map_err(|e| RepoError::Internal(e.to_string()))
            }) {
                Ok(b) => b,
                Err(e) => {
                    log::error!("[inmem] failed to serialize snapshot: {e}");
                    return;
                }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(path.as_path(), bytes) {
                log::error!("[inmem] failed to write snapshot '{}': {e}", path.display());
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }

        pub fn put_user(&self, user: User) -> RepoResult<()> {
            self.write()?.users.insert(user.id, user);
            self.persist();
            Ok(())
        }

        pub fn put_post(&self, post: Post) -> RepoResult<()> {
            self.write()?.posts.insert(post.id, post);
            self.persist();
            Ok(())
        }

        pub fn remove_user(&self, id: Id) -> RepoResult<()> {
            self.write()?.users.remove(&id);
            self.persist();
            Ok(())
        }

        pub fn remove_post(&self, id: Id) -> RepoResult<()> {
            self.write()?.posts.remove(&id);
            self.persist();
            Ok(())
        }

        /// Move a notification's timestamp, e.g. to age it out of the dedup window.
        pub fn set_created_at(&self, id: Id, at: DateTime<Utc>) -> RepoResult<()> {
            let mut s = self.write()?;
            let n = s.notifications.get_mut(&id).ok_or(RepoError::NotFound)?;
            n.created_at = at;
            drop(s);
            self.persist();
            Ok(())
        }

        pub fn notification_count(&self) -> RepoResult<usize> {
            Ok(self.read()?.notifications.len())
        }

        fn view(state: &State, n: &Notification) -> NotificationView {
            let actor = state.users.get(&n.actor_id);
            let post = state.posts.get(&n.post_id);
            NotificationView {
                id: n.id,
                kind: n.kind,
                is_read: n.is_read,
                created_at: n.created_at,
                actor: ActorSummary {
                    id: actor.map(|u| u.id),
                    username: actor.map(|u| u.username.clone()),
                },
                post: PostSummary {
                    id: post.map(|p| p.id),
                    title: post.map(|p| p.title.clone()),
                    caption: post.map(|p| caption_preview(&p.caption)),
                },
            }
        }
    }

    #[async_trait]
    impl NotificationRepo for InMemRepo {
        async fn find_recent(&self, key: &NotificationKey, window: Duration) -> RepoResult<Option<Id>> {
            let cutoff = Utc::now()
                .checked_sub_signed(window)
                .ok_or_else(|| RepoError::Internal(format!("dedup window out of range: {window}")))?;
            let s = self.read()?;
            Ok(s.notifications
                .values()
                .find(|n| {
                    n.user_id == key.user_id
                        && n.actor_id == key.actor_id
                        && n.post_id == key.post_id
                        && n.kind == key.kind
                        && n.created_at > cutoff
                })
                .map(|n| n.id))
        }

        async fn insert_notification(&self, key: &NotificationKey) -> RepoResult<Id> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s);
            s.notifications.insert(id, Notification {
                id,
                user_id: key.user_id,
                actor_id: key.actor_id,
                post_id: key.post_id,
                kind: key.kind,
                is_read: false,
                created_at: Utc::now(),
            });
            drop(s);                       // release lock before persisting
            self.persist();
            Ok(id)
        }

        async fn list_notifications(&self, user_id: Id, limit: usize) -> RepoResult<Vec<NotificationView>> {
            let s = self.read()?;
            let mut rows: Vec<&Notification> = s.notifications
                .values()
                .filter(|n| n.user_id == user_id)
                .collect();
            // newest first; id breaks ties between same-instant inserts
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(rows.into_iter().take(limit).map(|n| Self::view(&s, n)).collect())
        }

        async fn mark_read(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if let Some(n) = s.notifications.get_mut(&id) {
                n.is_read = true;
            }
            drop(s);
            self.persist();
            Ok(())
        }

        async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64> {
            let mut s = self.write()?;
            let mut touched = 0;
            for n in s.notifications.values_mut().filter(|n| n.user_id == user_id) {
                n.is_read = true;
                touched += 1;
            }
            drop(s);
            self.persist();
            Ok(touched)
        }

        async fn unread_count(&self, user_id: Id) -> RepoResult<i64> {
            let s = self.read()?;
            let count = s.notifications
                .values()
                .filter(|n| n.user_id == user_id && !n.is_read)
                .count();
            Ok(count as i64)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::{DateTime, Utc};
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    fn internal(e: sqlx::Error) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    #[derive(sqlx::FromRow)]
    struct ViewRow {
        id: Id,
        kind: String,
        is_read: bool,
        created_at: DateTime<Utc>,
        actor_id: Option<Id>,
        actor_username: Option<String>,
        post_id: Option<Id>,
        post_title: Option<String>,
        post_caption: Option<String>,
    }

    impl TryFrom<ViewRow> for NotificationView {
        type Error = RepoError;

        fn try_from(r: ViewRow) -> Result<Self, Self::Error> {
            let kind = r.kind.parse().map_err(|e: UnknownKind| RepoError::Internal(e.to_string()))?;
            Ok(NotificationView {
                id: r.id,
                kind,
                is_read: r.is_read,
                created_at: r.created_at,
                actor: ActorSummary { id: r.actor_id, username: r.actor_username },
                post: PostSummary { id: r.post_id, title: r.post_title, caption: r.post_caption },
            })
        }
    }

    #[async_trait]
    impl NotificationRepo for PgRepo {
        async fn find_recent(&self, key: &NotificationKey, window: Duration) -> RepoResult<Option<Id>> {
            sqlx::query_scalar::<_, Id>(r#"
                SELECT id::bigint FROM notifications
                WHERE user_id = $1 AND actor_id = $2 AND post_id = $3 AND type::text = $4
                  AND created_at > NOW() - ($5::bigint * INTERVAL '1 second')
                LIMIT 1
            "#)
                .bind(key.user_id)
                .bind(key.actor_id)
                .bind(key.post_id)
                .bind(key.kind.as_str())
                .bind(window.num_seconds())
                .fetch_optional(&self.pool).await.map_err(internal)
        }

        async fn insert_notification(&self, key: &NotificationKey) -> RepoResult<Id> {
            // `type` may be TEXT or a Postgres enum; json_populate_record converts
            // the label through the column's own input function either way.
            sqlx::query_scalar::<_, Id>(r#"
                INSERT INTO notifications (user_id, actor_id, post_id, type)
                SELECT $1, $2, $3,
                       (json_populate_record(NULL::notifications, json_build_object('type', $4::text))).type
                RETURNING id::bigint
            "#)
                .bind(key.user_id)
                .bind(key.actor_id)
                .bind(key.post_id)
                .bind(key.kind.as_str())
                .fetch_one(&self.pool).await.map_err(internal)
        }

        async fn list_notifications(&self, user_id: Id, limit: usize) -> RepoResult<Vec<NotificationView>> {
            let rows = sqlx::query_as::<_, ViewRow>(r#"
                SELECT n.id::bigint AS id,
                       n.type::text AS kind,
                       n.is_read,
                       n.created_at,
                       actor.id::bigint AS actor_id,
                       actor.username AS actor_username,
                       p.id::bigint AS post_id,
                       p.title AS post_title,
                       SUBSTRING(p.caption, 1, 50) AS post_caption
                FROM notifications n
                LEFT JOIN users actor ON n.actor_id = actor.id
                LEFT JOIN posts p ON n.post_id = p.id
                WHERE n.user_id = $1
                ORDER BY n.created_at DESC, n.id DESC
                LIMIT $2
            "#)
                .bind(user_id)
                .bind(limit as i64)
                .fetch_all(&self.pool).await.map_err(internal)?;
            rows.into_iter().map(NotificationView::try_from).collect()
        }

        async fn mark_read(&self, id: Id) -> RepoResult<()> {
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(internal)?;
            Ok(())
        }

        async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64> {
            let res = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool).await.map_err(internal)?;
            Ok(res.rows_affected())
        }

        async fn unread_count(&self, user_id: Id) -> RepoResult<i64> {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE"
            )
                .bind(user_id)
                .fetch_optional(&self.pool).await.map_err(internal)?;
            Ok(count.unwrap_or(0))
        }
    }
}
