use crate::error::ApiErrorBody;
use crate::models::{ActorSummary, MessageBody, NotificationKind, NotificationList, NotificationView, PostSummary, UnreadCount};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::get_notifications,
        crate::routes::mark_as_read,
        crate::routes::mark_all_as_read,
        crate::routes::get_unread_count,
    ),
    components(schemas(
        NotificationKind, NotificationView, ActorSummary, PostSummary,
        NotificationList, UnreadCount, MessageBody, ApiErrorBody
    )),
    tags(
        (name = "notifications", description = "Notification inbox operations"),
    )
)]
pub struct ApiDoc;
