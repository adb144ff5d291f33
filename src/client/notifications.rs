use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::api::{ApiClient, ApiClientError};
use super::session::Session;
use crate::models::{Id, NotificationView};

#[derive(Deserialize)]
struct ListBody {
    notifications: Vec<NotificationView>,
}

#[derive(Deserialize)]
struct CountBody {
    #[serde(default)]
    count: i64,
}

fn decode<T: DeserializeOwned>(v: Value) -> Result<T, ApiClientError> {
    serde_json::from_value(v).map_err(|e| ApiClientError::Decode(e.to_string()))
}

/// Inbox calls made on behalf of a signed-in [`Session`].
#[derive(Clone, Debug)]
pub struct NotificationsClient {
    api: ApiClient,
}

impl NotificationsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn inbox_path(session: &Session, suffix: &str) -> String {
        format!("/notifications/{}{suffix}", urlencoding::encode(&session.user_id))
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<NotificationView>, ApiClientError> {
        let v = self.api.get_json(&Self::inbox_path(session, ""), Some(&session.token)).await?;
        Ok(decode::<ListBody>(v)?.notifications)
    }

    pub async fn unread_count(&self, session: &Session) -> Result<i64, ApiClientError> {
        let v = self.api.get_json(&Self::inbox_path(session, "/unread-count"), Some(&session.token)).await?;
        Ok(decode::<CountBody>(v)?.count)
    }

    pub async fn mark_read(&self, session: &Session, id: Id) -> Result<(), ApiClientError> {
        self.api.put_json(&format!("/notifications/{id}/read"), Some(&session.token)).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, session: &Session) -> Result<(), ApiClientError> {
        self.api.put_json(&Self::inbox_path(session, "/read-all"), Some(&session.token)).await?;
        Ok(())
    }
}
