use std::sync::Arc;

use axum::{
    extract::Query,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use chrono::{Duration, Utc};
use validator::Validate;

use crate::{
    db::{
        cache::TokenBlacklist,
        userdb::{NewUser, UserExt},
    },
    dtos::{responsedtos::ApiResponse, userdtos::*},
    error::{ErrorMessage, HttpError},
    mail::mails::{reset_link, send_password_reset_email, send_verification_email, verification_link},
    middleware::{auth, JWTAuthMiddeware},
    models::usermodel::{User, UserRole},
    service::error::is_unique_violation,
    utils::{otp_generator::generate_secure_token, password, token},
    AppState,
};

const EMAIL_TOKEN_HOURS: i64 = 1;
const RESET_TOKEN_MINUTES: i64 = 30;

pub fn auth_handler() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", get(verify_email))
        .route("/login", post(login))
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
        .route("/register/phone", post(register_phone))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/logout", post(logout).layer(middleware::from_fn(auth)))
        .route("/me", get(get_me).layer(middleware::from_fn(auth)))
}

fn token_cookie(token: String, max_age_minutes: i64) -> Cookie<'static> {
    Cookie::build(("token", token))
        .path("/")
        .max_age(time::Duration::minutes(max_age_minutes))
        .http_only(true)
        .build()
}

pub(crate) fn with_cookie(mut response: Response, cookie: Cookie<'_>) -> Result<Response, HttpError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|_| HttpError::server_error(ErrorMessage::ServerError.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.append(header::SET_COOKIE, value);
    response.headers_mut().extend(headers);
    Ok(response)
}

/// Issues the JWT, sets the `token` cookie and returns the login payload.
pub(crate) fn login_response(app_state: &AppState, user: &User, status: StatusCode) -> Result<Response, HttpError> {
    let token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    let cookie = token_cookie(token.clone(), app_state.env.jwt_maxage);
    let body = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token,
        user: FilterUserDto::filter_user(user),
    });

    with_cookie((status, body).into_response(), cookie)
}

pub(crate) fn unique_violation_to_http(error: sqlx::Error) -> HttpError {
    if is_unique_violation(&error) {
        HttpError::bad_request("An account with these details already exists")
    } else {
        error.into()
    }
}

pub async fn register(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let email = body.email.trim().to_lowercase();
    let phone = body.phone.trim().to_string();

    if app_state.db_client.get_user(None, Some(&email), None, None).await?.is_some() {
        return Err(HttpError::bad_request(ErrorMessage::EmailExist.to_string()));
    }
    if app_state.db_client.get_user(None, None, Some(&phone), None).await?.is_some() {
        return Err(HttpError::bad_request(ErrorMessage::PhoneExist.to_string()));
    }

    let hash_password = password::hash(&body.password)
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let verification_token = generate_secure_token();
    let user = app_state
        .db_client
        .save_user(
            UserRole::from(body.role),
            NewUser {
                name: Some(body.name.trim().to_string()),
                email: Some(email.clone()),
                phone: Some(phone),
                password_hash: Some(hash_password),
                email_verification_token: Some(verification_token.clone()),
                token_expiry: Some(Utc::now() + Duration::hours(EMAIL_TOKEN_HOURS)),
                ..Default::default()
            },
        )
        .await
        .map_err(unique_violation_to_http)?;

    let mailer = app_state.mailer.clone();
    let link = verification_link(&app_state.env.app_url, &verification_token);
    let username = user.display_name();
    tokio::spawn(async move {
        if let Err(e) = send_verification_email(&mailer, &email, &username, &link).await {
            tracing::error!("Failed to send verification email to {}: {}", email, e);
        }
    });

    tracing::info!("Registered {} {} via email", user.role.to_str(), user.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Registration successful! Please check your email to verify your account.",
            FilterUserDto::filter_user(&user),
        )),
    ))
}

pub async fn verify_email(
    Query(query_params): Query<VerifyEmailQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .db_client
        .get_user_by_verification_token(&query_params.token)
        .await?
        .ok_or_else(|| HttpError::bad_request("Invalid or expired verification link"))?;

    if user.token_expiry.map_or(true, |expiry| Utc::now() > expiry) {
        return Err(HttpError::bad_request("Verification link has expired"));
    }

    app_state.db_client.mark_email_verified(user.id).await?;
    tracing::info!("Email verified for user {}", user.id);

    let redirect_url = format!(
        "{}/login?verified=true",
        app_state.env.app_url.trim_end_matches('/')
    );
    Ok(Redirect::to(&redirect_url))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .db_client
        .get_user(None, Some(body.email.trim()), None, None)
        .await?
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?;

    let password_matched = match user.password_hash.as_deref() {
        Some(hash) => password::compare(&body.password, hash)
            .map_err(|_| HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?,
        None => false,
    };
    if !password_matched {
        return Err(HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()));
    }

    if !user.is_email_verified {
        return Err(HttpError::forbidden(ErrorMessage::EmailNotVerified.to_string()));
    }
    if !user.is_active {
        return Err(HttpError::forbidden(ErrorMessage::AccountDeactivated.to_string()));
    }

    app_state.db_client.update_last_login(user.id).await?;
    login_response(&app_state, &user, StatusCode::OK)
}

pub async fn logout(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    if let Some(redis_client) = &app_state.db_client.redis_client {
        if let Some(ttl) = token::remaining_lifetime(&auth.token, app_state.env.jwt_secret.as_bytes()) {
            if let Err(e) = TokenBlacklist::revoke(redis_client, &auth.token, ttl as usize).await {
                tracing::warn!("Could not blacklist token for user {}: {}", auth.user.id, e);
            }
        }
    }

    let cookie = token_cookie(String::new(), -1);
    with_cookie(
        Json(ApiResponse::message("You have been logged out.")).into_response(),
        cookie,
    )
}

pub async fn request_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<OtpRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let phone = body.phone.trim();
    let user = app_state
        .db_client
        .get_user(None, None, Some(phone), None)
        .await?
        .ok_or_else(|| HttpError::not_found("No account found for this phone number"))?;

    if !user.is_active {
        return Err(HttpError::forbidden(ErrorMessage::AccountDeactivated.to_string()));
    }

    let sent = app_state.profile_service.issue_otp(user.id, phone).await?;
    if !sent {
        return Err(HttpError::bad_gateway("Could not send the OTP. Please try again."));
    }

    Ok(Json(ApiResponse::message("OTP sent to your phone.")))
}

pub async fn verify_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<OtpVerifyDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .db_client
        .get_user(None, None, Some(body.phone.trim()), None)
        .await?
        .ok_or_else(|| HttpError::not_found("No account found for this phone number"))?;

    if !user.is_active {
        return Err(HttpError::forbidden(ErrorMessage::AccountDeactivated.to_string()));
    }

    // Consumption is a conditional update, so a code can only ever log in once.
    let user = app_state
        .db_client
        .complete_otp_login(user.id, &body.otp)
        .await?
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::InvalidOtp.to_string()))?;

    tracing::info!("User {} logged in with OTP", user.id);
    login_response(&app_state, &user, StatusCode::OK)
}

pub async fn register_phone(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PhoneRegisterDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let phone = body.phone.trim().to_string();

    if let Some(existing) = app_state.db_client.get_user(None, None, Some(&phone), None).await? {
        if existing.is_phone_verified {
            return Err(HttpError::bad_request(
                "This phone number is already registered. Please use OTP login.",
            ));
        }

        let otp_sent = app_state.profile_service.issue_otp(existing.id, &phone).await?;
        return Ok((
            StatusCode::OK,
            Json(OtpSentResponseDto {
                status: "success".to_string(),
                message: "A new OTP has been sent to your phone.".to_string(),
                user_id: existing.id,
                otp_sent,
            }),
        ));
    }

    let user = app_state
        .db_client
        .save_user(
            UserRole::from(body.role),
            NewUser {
                phone: Some(phone.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(unique_violation_to_http)?;

    let otp_sent = app_state.profile_service.issue_otp(user.id, &phone).await?;
    tracing::info!("Registered {} {} via phone (otp sent: {})", user.role.to_str(), user.id, otp_sent);

    let message = if otp_sent {
        "Registration started. Enter the OTP sent to your phone."
    } else {
        "Account created, but the OTP could not be sent. Please request a new one."
    };

    Ok((
        StatusCode::CREATED,
        Json(OtpSentResponseDto {
            status: "success".to_string(),
            message: message.to_string(),
            user_id: user.id,
            otp_sent,
        }),
    ))
}

pub async fn forgot_password(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let generic = "If an account with that email exists, a password reset link has been sent.";

    let user = app_state
        .db_client
        .get_user(None, Some(body.email.trim()), None, None)
        .await?;

    if let Some(user) = user.filter(|u| u.is_email_verified) {
        let reset_token = generate_secure_token();
        app_state
            .db_client
            .set_password_reset_token(user.id, &reset_token, Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES))
            .await?;

        if let Some(email) = user.email.clone() {
            let mailer = app_state.mailer.clone();
            let link = reset_link(&app_state.env.app_url, &reset_token);
            let username = user.display_name();
            tokio::spawn(async move {
                if let Err(e) = send_password_reset_email(&mailer, &email, &username, &link).await {
                    tracing::error!("Failed to send password reset email to {}: {}", email, e);
                }
            });
        }
    }

    Ok(Json(ApiResponse::message(generic)))
}

pub async fn reset_password(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .db_client
        .get_user_by_reset_token(&body.token)
        .await?
        .ok_or_else(|| HttpError::bad_request("Invalid or expired reset link"))?;

    if user.token_expiry.map_or(true, |expiry| Utc::now() > expiry) {
        return Err(HttpError::bad_request("Reset link has expired"));
    }

    let hash_password = password::hash(&body.password)
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    app_state.db_client.reset_password(user.id, hash_password).await?;
    tracing::info!("Password reset for user {}", user.id);

    Ok(Json(ApiResponse::message("Password has been successfully reset.")))
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state.profile_service.snapshot(&auth.user).await?;

    Ok(Json(ApiResponse::success(
        "Current user",
        UserProfileDto::new(&auth.user, &snapshot),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cookie_is_http_only() {
        let cookie = token_cookie("abc".into(), 60);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(60)));
    }

    #[test]
    fn test_with_cookie_sets_header() {
        let response = with_cookie(StatusCode::OK.into_response(), token_cookie("abc".into(), 5)).unwrap();
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("token=abc"));
        assert!(set_cookie.contains("HttpOnly"));
    }
}
