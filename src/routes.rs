use std::sync::Arc;
use actix_web::{web, HttpResponse};

use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::notify::{self, NotifyPolicy, LIST_LIMIT};
use crate::repo::Repo;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notifications")
            // a malformed id is answered like any other data-access failure
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                log::error!("notification path error: {err}");
                ApiError::Internal(err.to_string()).into()
            }))
            .service(web::resource("/{user_id}").route(web::get().to(get_notifications)))
            .service(web::resource("/{user_id}/unread-count").route(web::get().to(get_unread_count)))
            .service(web::resource("/{id}/read").route(web::put().to(mark_as_read)))
            .service(web::resource("/{user_id}/read-all").route(web::put().to(mark_all_as_read))),
    );
    cfg.route("/health", web::get().to(health));
}

#[derive(Clone)]
pub struct AppState { pub repo: Arc<dyn Repo>, pub policy: NotifyPolicy }

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, policy: NotifyPolicy) -> Self {
        Self { repo, policy }
    }

    /// Entry point for other server logic (likes, bookmarks, comments) to raise a notification.
    pub async fn notify(&self, user_id: Id, actor_id: Id, post_id: Id, kind: NotificationKind) {
        notify::create_notification(self.repo.as_ref(), &self.policy, user_id, actor_id, post_id, kind).await
    }
}

fn message(text: &str) -> MessageBody {
    MessageBody { message: text.to_string() }
}

#[utoipa::path(
    get,
    tag = "notifications",
    path = "/api/notifications/{user_id}",
    params(("user_id" = Id, Path, description = "Recipient user id")),
    responses(
        (status = 200, description = "Up to 50 newest notifications", body = NotificationList),
        (status = 500, description = "Server error", body = ApiErrorBody)
    )
)]
pub async fn get_notifications(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let notifications = data.repo.list_notifications(user_id, LIST_LIMIT).await.map_err(|e| {
        log::error!("get notifications error for user {user_id}: {e}");
        ApiError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(NotificationList { notifications }))
}

#[utoipa::path(
    put,
    tag = "notifications",
    path = "/api/notifications/{id}/read",
    params(("id" = Id, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read (also when the id is unknown)", body = MessageBody),
        (status = 500, description = "Server error", body = ApiErrorBody)
    )
)]
pub async fn mark_as_read(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    data.repo.mark_read(id).await.map_err(|e| {
        log::error!("mark as read error for notification {id}: {e}");
        ApiError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(message("Notification marked as read")))
}

#[utoipa::path(
    put,
    tag = "notifications",
    path = "/api/notifications/{user_id}/read-all",
    params(("user_id" = Id, Path, description = "Recipient user id")),
    responses(
        (status = 200, description = "All marked as read", body = MessageBody),
        (status = 500, description = "Server error", body = ApiErrorBody)
    )
)]
pub async fn mark_all_as_read(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let touched = data.repo.mark_all_read(user_id).await.map_err(|e| {
        log::error!("mark all as read error for user {user_id}: {e}");
        ApiError::from(e)
    })?;
    log::debug!("marked {touched} notifications read for user {user_id}");
    Ok(HttpResponse::Ok().json(message("All notifications marked as read")))
}

#[utoipa::path(
    get,
    tag = "notifications",
    path = "/api/notifications/{user_id}/unread-count",
    params(("user_id" = Id, Path, description = "Recipient user id")),
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCount),
        (status = 500, description = "Server error", body = ApiErrorBody)
    )
)]
pub async fn get_unread_count(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let count = data.repo.unread_count(user_id).await.map_err(|e| {
        log::error!("get unread count error for user {user_id}: {e}");
        ApiError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(UnreadCount { count }))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
