use std::sync::Arc;

use axum::{
    extract::Path,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    db::{
        jobdb::JobExt, paymentdb::PaymentExt, userdb::UserExt, verificationdb::VerificationExt,
    },
    dtos::{responsedtos::ApiResponse, userdtos::PublicWorkerProfileDto},
    error::HttpError,
    middleware::{authenticate, extract_token},
    models::usermodel::{User, UserRole},
    service::error::ServiceError,
    AppState,
};

const PUBLIC_RATINGS_SHOWN: i64 = 10;

pub fn public_handler() -> Router {
    Router::new().route("/workers/:worker_id", get(public_worker_profile))
}

/// Only another employer looking at the profile counts as a view.
pub fn counts_as_view(viewer: Option<&User>, worker_id: Uuid) -> bool {
    viewer.map_or(false, |v| v.role == UserRole::Employer && v.id != worker_id)
}

pub async fn public_worker_profile(
    Path(worker_id): Path<Uuid>,
    cookie_jar: CookieJar,
    headers: HeaderMap,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let worker = app_state
        .db_client
        .get_user(Some(worker_id), None, None, None)
        .await?
        .filter(|u| u.role == UserRole::Worker && u.is_active)
        .ok_or(ServiceError::UserNotFound(worker_id))?;

    let viewer = match extract_token(&cookie_jar, &headers) {
        Some(token) => authenticate(&app_state, &token).await.ok(),
        None => None,
    };

    let mut profile_views = worker.profile_views;
    if counts_as_view(viewer.as_ref(), worker.id) {
        app_state.db_client.increment_profile_views(worker.id).await?;
        profile_views += 1;
    }

    let summary = app_state.db_client.get_worker_rating_summary(worker.id).await?;
    let completed_jobs_count = app_state.db_client.count_completed_jobs(worker.id).await?;
    let ratings = app_state
        .db_client
        .get_worker_ratings(worker.id, PUBLIC_RATINGS_SHOWN)
        .await?;
    let certifications = app_state
        .db_client
        .get_verified_worker_certifications(worker.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Worker profile",
        PublicWorkerProfileDto {
            id: worker.id,
            skills: worker.skills_list(),
            name: worker.name,
            experience_years: worker.experience_years,
            language: worker.language,
            location_address: worker.location_address,
            profile_views,
            average_rating: summary.average,
            ratings_count: summary.count,
            completed_jobs_count,
            ratings,
            certifications,
        },
    )))
}
