use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::notificationdb::NotificationExt,
    dtos::{
        notificationdtos::{ClearedNotificationsDto, UnreadCountDto},
        responsedtos::{ApiResponse, TimedDto},
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn notifications_handler() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/clear", post(clear_notifications))
        .route("/:notification_id/read", post(mark_read))
}

pub async fn list_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let now = Utc::now();
    let notifications: Vec<_> = app_state
        .db_client
        .list_and_mark_read(auth.user.id)
        .await?
        .into_iter()
        .map(|notification| {
            let at = Some(notification.created_at);
            TimedDto::new(notification, at, now)
        })
        .collect();

    Ok(Json(ApiResponse::success("Notifications", notifications)))
}

pub async fn mark_read(
    Path(notification_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state
        .db_client
        .mark_notification_read(notification_id, auth.user.id)
        .await?
        .ok_or_else(|| HttpError::not_found("Notification not found"))?;

    Ok(Json(ApiResponse::success("Notification marked as read.", notification)))
}

pub async fn clear_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let cleared = app_state.db_client.mark_all_read(auth.user.id).await?;
    Ok(Json(ApiResponse::success(
        format!("{} notifications marked as read.", cleared),
        ClearedNotificationsDto { cleared },
    )))
}

pub async fn unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let unread_count = app_state.db_client.count_unread(auth.user.id).await?;
    Ok(Json(ApiResponse::success(
        "Unread notifications",
        UnreadCountDto { unread_count },
    )))
}
