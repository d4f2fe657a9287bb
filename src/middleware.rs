pub mod rate_limit;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    db::{cache::TokenBlacklist, userdb::UserExt},
    error::{ErrorMessage, HttpError},
    models::usermodel::{User, UserRole},
    utils::token,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddeware {
    pub user: User,
    #[serde(skip)]
    pub token: String,
}

/// Token from the `token` cookie, falling back to a Bearer header.
pub fn extract_token(cookie_jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|value| value.trim().to_owned())
        })
}

/// Resolves the user behind a token, honouring the logout blacklist.
pub async fn authenticate(app_state: &AppState, token: &str) -> Result<User, HttpError> {
    let token_details = token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    if let Some(redis_client) = &app_state.db_client.redis_client {
        if TokenBlacklist::is_revoked(redis_client, token).await {
            return Err(HttpError::unauthorized("Token has been revoked. Please login again."));
        }
    }

    let user_id = uuid::Uuid::parse_str(&token_details)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None, None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    if !user.is_active {
        return Err(HttpError::forbidden(ErrorMessage::AccountDeactivated.to_string()));
    }

    Ok(user)
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, req.headers())
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user = authenticate(&app_state, &token).await?;

    req.extensions_mut().insert(JWTAuthMiddeware { user, token });

    Ok(next.run(req).await)
}

pub async fn role_check(
    Extension(_app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddeware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&user.user.role) {
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_extract_token_prefers_cookie() {
        let jar = CookieJar::new().add(Cookie::new("token", "from-cookie"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("from-cookie"));
        assert_eq!(extract_token(&CookieJar::new(), &headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_extract_token_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_token(&CookieJar::new(), &headers).is_none());
    }
}
