use std::sync::Arc;

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use oauth2::CsrfToken;
use serde::Serialize;
use validator::Validate;

use crate::{
    db::userdb::{NewUser, UserExt},
    dtos::userdtos::{CompleteGoogleRegistrationDto, GoogleCallbackQuery},
    error::{ErrorMessage, HttpError},
    handler::auth::{login_response, unique_violation_to_http, with_cookie},
    models::usermodel::UserRole,
    service::google_oauth::{registration_token, GoogleUserInfo, OAuthError, PendingGoogleRegistration},
    utils::token,
    AppState,
};

const STATE_COOKIE: &str = "oauth_state";

#[derive(Debug, Serialize)]
pub struct RegistrationRequiredDto {
    pub status: &'static str,
    pub registration_token: String,
    pub email: String,
    pub name: Option<String>,
}

pub fn google_oauth_handler() -> Router {
    Router::new()
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
        .route("/google/complete", post(complete_google_registration))
}

fn state_cookie(value: String, max_age_minutes: i64) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .path("/")
        .max_age(time::Duration::minutes(max_age_minutes))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}

fn oauth_gateway_error(error: OAuthError) -> HttpError {
    tracing::error!("Google OAuth failed: {}", error);
    HttpError::bad_gateway("Google sign-in failed. Please try again.")
}

pub async fn google_login(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let csrf_state = CsrfToken::new_random();
    let auth_url = app_state
        .google_auth
        .get_authorization_url(csrf_state.secret());

    with_cookie(
        Redirect::to(&auth_url).into_response(),
        state_cookie(csrf_state.secret().to_string(), 10),
    )
}

pub async fn google_callback(
    cookie_jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let expected_state = cookie_jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    match (query.state.as_deref(), expected_state.as_deref()) {
        (Some(received), Some(expected)) if !expected.is_empty() && received == expected => {}
        _ => {
            tracing::warn!("Google callback with mismatched state");
            return Err(HttpError::bad_request("Invalid OAuth state. Please try signing in again."));
        }
    }

    if let Some(error) = query.error.as_deref() {
        return Err(HttpError::bad_request(format!("Google sign-in was cancelled: {}", error)));
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| HttpError::bad_request("Authorization code missing"))?;

    let access_token = app_state
        .google_auth
        .exchange_code(code)
        .await
        .map_err(oauth_gateway_error)?;
    let info = app_state
        .google_auth
        .get_user_info(&access_token)
        .await
        .map_err(oauth_gateway_error)?;

    let response = resolve_google_user(&app_state, info).await?;
    with_cookie(response, state_cookie(String::new(), -1))
}

async fn resolve_google_user(
    app_state: &AppState,
    info: GoogleUserInfo,
) -> Result<axum::response::Response, HttpError> {
    let email = info.email.clone().unwrap_or_default().to_lowercase();

    let existing = match app_state
        .db_client
        .get_user(None, None, None, Some(&info.sub))
        .await?
    {
        Some(user) => Some(user),
        None => app_state.db_client.get_user(None, Some(&email), None, None).await?,
    };

    if let Some(user) = existing {
        if !user.is_active {
            return Err(HttpError::forbidden(ErrorMessage::AccountDeactivated.to_string()));
        }
        let user = app_state
            .db_client
            .link_google_account(user.id, &info.sub, info.email_verified)
            .await?;
        tracing::info!("User {} signed in with Google", user.id);
        return login_response(app_state, &user, StatusCode::OK);
    }

    let registration_token = registration_token(&info, app_state.env.jwt_secret.as_bytes())
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(RegistrationRequiredDto {
        status: "registration_required",
        registration_token,
        email,
        name: info.name,
    })
    .into_response())
}

pub async fn complete_google_registration(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CompleteGoogleRegistrationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let pending: PendingGoogleRegistration =
        token::verify_claims(&body.registration_token, app_state.env.jwt_secret.as_bytes())
            .map_err(|_| HttpError::bad_request("Registration session expired. Please sign in with Google again."))?;

    let email = pending.email.to_lowercase();
    let phone = body
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    if app_state.db_client.get_user(None, Some(&email), None, None).await?.is_some()
        || app_state
            .db_client
            .get_user(None, None, None, Some(&pending.google_id))
            .await?
            .is_some()
    {
        return Err(HttpError::bad_request(ErrorMessage::EmailExist.to_string()));
    }

    if let Some(phone) = phone.as_deref() {
        if app_state.db_client.get_user(None, None, Some(phone), None).await?.is_some() {
            return Err(HttpError::bad_request(ErrorMessage::PhoneExist.to_string()));
        }
    }

    let user = app_state
        .db_client
        .save_user(
            UserRole::from(body.role),
            NewUser {
                name: pending.name.clone(),
                email: Some(email),
                phone,
                google_id: Some(pending.google_id.clone()),
                is_email_verified: pending.email_verified,
                ..Default::default()
            },
        )
        .await
        .map_err(unique_violation_to_http)?;

    tracing::info!("Registered {} {} via Google", user.role.to_str(), user.id);
    login_response(&app_state, &user, StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cookie_attributes() {
        let cookie = state_cookie("abc".into(), 10);
        assert_eq!(cookie.name(), STATE_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn test_registration_required_shape() {
        let body = RegistrationRequiredDto {
            status: "registration_required",
            registration_token: "tok".into(),
            email: "asha@example.com".into(),
            name: Some("Asha".into()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "registration_required");
        assert_eq!(json["registration_token"], "tok");
    }
}
