use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Always Postgres backed (BIGSERIAL keys)
pub type Id = i64;

/// What the actor did to the recipient's post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Bookmark,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Bookmark => "bookmark",
            NotificationKind::Comment => "comment",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown notification type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for NotificationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(NotificationKind::Like),
            "bookmark" => Ok(NotificationKind::Bookmark),
            "comment" => Ok(NotificationKind::Comment),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Stored notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Id,
    pub user_id: Id,  // recipient
    pub actor_id: Id,
    pub post_id: Id,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// The tuple a notification is deduplicated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub user_id: Id,
    pub actor_id: Id,
    pub post_id: Id,
    pub kind: NotificationKind,
}

impl NotificationKey {
    pub fn is_self_action(&self) -> bool {
        self.user_id == self.actor_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActorSummary {
    #[serde(rename = "_id")]
    pub id: Option<Id>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostSummary {
    #[serde(rename = "_id")]
    pub id: Option<Id>,
    pub title: Option<String>,
    pub caption: Option<String>, // first CAPTION_PREVIEW_CHARS characters
}

/// Notification joined with its actor and post, as returned to clients.
/// A deleted actor or post leaves every field of its summary null.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub actor: ActorSummary,
    pub post: PostSummary,
}

pub const CAPTION_PREVIEW_CHARS: usize = 50;

/// Character-based prefix, matching SQL `SUBSTRING(caption, 1, 50)`.
pub fn caption_preview(caption: &str) -> String {
    caption.chars().take(CAPTION_PREVIEW_CHARS).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub caption: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}
