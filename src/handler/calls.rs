use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    db::{calldb::CallExt, userdb::UserExt},
    dtos::{
        calldtos::{CallStartedDto, CallStatusDto, CallTokenDto, StartCallDto},
        responsedtos::ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::error::ServiceError,
    AppState,
};

pub fn calls_handler() -> Router {
    Router::new()
        .route("/token", get(call_token))
        .route("/start", post(start_call))
        .route("/status/:room_sid", get(call_status))
}

pub fn call_identity(user_id: Uuid) -> String {
    format!("user_{}", user_id)
}

pub fn room_name(caller: Uuid, recipient: Uuid) -> String {
    format!("call_{}_{}_{}", caller, recipient, hex::encode(rand::random::<[u8; 3]>()))
}

pub async fn call_token(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let identity = call_identity(auth.user.id);
    let token = app_state.twilio.access_token(&identity).map_err(|e| {
        tracing::error!("Twilio token for {} failed: {}", identity, e);
        HttpError::server_error("Could not create a call token")
    })?;

    Ok(Json(ApiResponse::success(
        "Call token issued",
        CallTokenDto { token, identity },
    )))
}

pub async fn start_call(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<StartCallDto>,
) -> Result<impl IntoResponse, HttpError> {
    let recipient_id = body
        .recipient_id
        .ok_or_else(|| HttpError::bad_request("Recipient is required"))?;

    let recipient = app_state
        .db_client
        .get_user(Some(recipient_id), None, None, None)
        .await?
        .ok_or(ServiceError::UserNotFound(recipient_id))?;

    let name = room_name(auth.user.id, recipient.id);
    let room = app_state
        .twilio
        .create_room(&name)
        .await
        .map_err(|e| ServiceError::Gateway(e.to_string()))?;

    let call = app_state
        .db_client
        .create_call(auth.user.id, recipient.id, Some(room.sid.clone()), &name, body.call_type)
        .await?;

    tracing::info!(
        "User {} started a {} call {} with {}",
        auth.user.id,
        body.call_type.to_str(),
        call.id,
        recipient.id
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Call started",
            CallStartedDto {
                room_name: name,
                room_sid: room.sid,
                call_id: call.id,
            },
        )),
    ))
}

pub async fn call_status(
    Path(room_sid): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let status = app_state.twilio.room_status(&room_sid).await;
    Ok(Json(ApiResponse::success(
        "Call status",
        CallStatusDto { room_sid, status },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_format() {
        let caller = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let name = room_name(caller, recipient);

        let prefix = format!("call_{}_{}_", caller, recipient);
        assert!(name.starts_with(&prefix));
        let suffix = &name[prefix.len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_call_identity() {
        let id = Uuid::nil();
        assert_eq!(call_identity(id), format!("user_{}", id));
    }
}
