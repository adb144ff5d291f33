#![cfg(feature = "inmem-store")]

use chrono::{Duration, Utc};
use postfeed::models::{NotificationKey, NotificationKind, Post, User};
use postfeed::repo::inmem::InMemRepo;
use postfeed::repo::{NotificationRepo, RepoError};

fn key(user_id: i64, actor_id: i64, post_id: i64, kind: NotificationKind) -> NotificationKey {
    NotificationKey { user_id, actor_id, post_id, kind }
}

#[tokio::test]
async fn find_recent_matches_whole_key_inside_window() {
    let r = InMemRepo::new();
    let k = key(1, 2, 3, NotificationKind::Like);
    let id = r.insert_notification(&k).await.unwrap();

    assert_eq!(r.find_recent(&k, Duration::hours(1)).await.unwrap(), Some(id));
    assert!(r.find_recent(&key(1, 2, 3, NotificationKind::Comment), Duration::hours(1)).await.unwrap().is_none());
    assert!(r.find_recent(&key(1, 9, 3, NotificationKind::Like), Duration::hours(1)).await.unwrap().is_none());

    r.set_created_at(id, Utc::now() - Duration::minutes(61)).unwrap();
    assert!(r.find_recent(&k, Duration::hours(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn unread_count_and_mark_read() {
    let r = InMemRepo::new();
    let a = r.insert_notification(&key(7, 1, 1, NotificationKind::Like)).await.unwrap();
    r.insert_notification(&key(7, 2, 1, NotificationKind::Bookmark)).await.unwrap();
    assert_eq!(r.unread_count(7).await.unwrap(), 2);
    assert_eq!(r.unread_count(99).await.unwrap(), 0);

    r.mark_read(a).await.unwrap();
    r.mark_read(a).await.unwrap();
    assert_eq!(r.unread_count(7).await.unwrap(), 1);

    assert_eq!(r.mark_all_read(7).await.unwrap(), 2);
    assert_eq!(r.unread_count(7).await.unwrap(), 0);
}

#[tokio::test]
async fn listing_respects_limit_and_enrichment() {
    let r = InMemRepo::new();
    r.put_user(User { id: 2, username: "bob".into() }).unwrap();
    r.put_post(Post { id: 3, title: "T".into(), caption: "short caption".into() }).unwrap();
    for post in [3, 4, 5] {
        r.insert_notification(&key(1, 2, post, NotificationKind::Comment)).await.unwrap();
    }
    let list = r.list_notifications(1, 2).await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list[0].created_at >= list[1].created_at);
    // post 3 was the oldest and got cut
    assert!(list.iter().all(|v| v.post.id.is_none()));
    assert_eq!(list[0].actor.username.as_deref(), Some("bob"));

    let all = r.list_notifications(1, 50).await.unwrap();
    assert_eq!(all[2].post.caption.as_deref(), Some("short caption"));
}

#[tokio::test]
async fn listing_orders_by_timestamp_not_id() {
    let r = InMemRepo::new();
    let a = r.insert_notification(&key(1, 2, 3, NotificationKind::Like)).await.unwrap();
    let b = r.insert_notification(&key(1, 2, 4, NotificationKind::Like)).await.unwrap();
    r.set_created_at(b, Utc::now() - Duration::minutes(10)).unwrap();

    let ids: Vec<_> = r.list_notifications(1, 50).await.unwrap().iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![a, b]);
}

#[tokio::test]
async fn out_of_range_window_is_an_error() {
    let r = InMemRepo::new();
    let k = key(1, 2, 3, NotificationKind::Like);
    r.insert_notification(&k).await.unwrap();
    let window = Duration::seconds(i64::MAX / 1000);
    assert!(matches!(r.find_recent(&k, window).await, Err(RepoError::Internal(_))));
}

#[tokio::test]
async fn set_created_at_unknown_id() {
    let r = InMemRepo::new();
    assert!(matches!(r.set_created_at(42, Utc::now()), Err(RepoError::NotFound)));
}

#[tokio::test]
async fn snapshot_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let r = InMemRepo::with_snapshot_dir(dir.path());
        r.insert_notification(&key(1, 2, 3, NotificationKind::Like)).await.unwrap();
    }
    let r = InMemRepo::with_snapshot_dir(dir.path());
    assert_eq!(r.unread_count(1).await.unwrap(), 1);
    // ids keep counting from the snapshot
    let next = r.insert_notification(&key(1, 2, 4, NotificationKind::Like)).await.unwrap();
    assert_eq!(next, 2);
}
