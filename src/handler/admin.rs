use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        alertdb::AlertExt, jobdb::JobExt, paymentdb::PaymentExt, statsdb::StatsExt,
        userdb::UserExt, verificationdb::VerificationExt,
    },
    dtos::{
        paymentdtos::ResolveDisputeDto,
        responsedtos::{ApiResponse, PageQueryDto, Paginated, TimedDto},
        userdtos::{FilterUserDto, ToggleUserResponseDto},
        verificationdtos::*,
    },
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::error::ServiceError,
    AppState,
};

const PENDING_DOCUMENTS_PER_PAGE: i64 = 15;
const DASHBOARD_ALERTS: i64 = 5;
const ANALYTICS_RECENT: i64 = 5;

pub fn admin_handler() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:user_id/toggle", post(toggle_user))
        .route("/jobs", get(list_jobs))
        .route("/emergency-alerts", get(list_alerts))
        .route("/emergency-alerts/:alert_id/resolve", post(resolve_alert))
        .route("/verifications/pending", get(pending_documents))
        .route("/verifications/:doc_id", get(view_document).post(review_document))
        .route("/payments/disputes", get(payment_disputes))
        .route("/payments/:payment_id/resolve", post(resolve_dispute))
        .route("/certifications", get(list_certifications).post(create_certification))
        .route("/certifications/pending", get(pending_certifications))
        .route("/certifications/:cert_id/verify", post(verify_certification))
        .route("/analytics", get(analytics))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        }))
}

pub async fn dashboard(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.db_client.get_platform_stats().await?;
    let recent_alerts = app_state.db_client.get_recent_alerts(DASHBOARD_ALERTS).await?;
    let pending_documents = app_state.db_client.count_pending_documents().await?;
    let pending_certifications = app_state.db_client.count_pending_worker_certifications().await?;

    Ok(Json(ApiResponse::success(
        "Admin dashboard",
        AdminDashboardDto::new(stats, recent_alerts, pending_documents, pending_certifications),
    )))
}

pub async fn list_users(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let users = app_state.db_client.get_users().await?;
    Ok(Json(ApiResponse::success(
        "All users",
        FilterUserDto::filter_users(&users),
    )))
}

pub async fn toggle_user(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .toggle_user_active(user_id)
        .await?
        .ok_or(ServiceError::UserNotFound(user_id))?;

    tracing::info!(
        "Admin {} set user {} active={}",
        auth.user.id,
        user.id,
        user.is_active
    );

    let message = if user.is_active {
        "User activated."
    } else {
        "User deactivated."
    };

    Ok(Json(ApiResponse::success(
        message,
        ToggleUserResponseDto {
            user_id: user.id,
            is_active: user.is_active,
        },
    )))
}

pub async fn list_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state.db_client.get_all_jobs().await?;
    Ok(Json(ApiResponse::success("All jobs", jobs)))
}

pub async fn list_alerts(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let now = Utc::now();
    let alerts: Vec<_> = app_state
        .db_client
        .get_alerts()
        .await?
        .into_iter()
        .map(|alert| {
            let at = Some(alert.created_at);
            TimedDto::new(alert, at, now)
        })
        .collect();

    Ok(Json(ApiResponse::success("Emergency alerts", alerts)))
}

pub async fn resolve_alert(
    Path(alert_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let alert = app_state
        .db_client
        .resolve_alert(alert_id)
        .await?
        .ok_or(ServiceError::AlertNotFound(alert_id))?;

    tracing::info!("Admin {} resolved SOS alert {}", auth.user.id, alert.id);
    Ok(Json(ApiResponse::success("Alert marked as resolved.", alert)))
}

pub async fn pending_documents(
    Query(query): Query<PageQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let documents = app_state
        .db_client
        .get_pending_documents(PENDING_DOCUMENTS_PER_PAGE, query.offset(PENDING_DOCUMENTS_PER_PAGE))
        .await?;
    let total = app_state.db_client.count_pending_documents().await?;

    Ok(Json(ApiResponse::success(
        "Pending documents",
        Paginated::new(documents, query.page(), PENDING_DOCUMENTS_PER_PAGE, total),
    )))
}

pub async fn view_document(
    Path(doc_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let document = app_state
        .db_client
        .get_pending_document_detail(doc_id)
        .await?
        .ok_or(ServiceError::DocumentNotFound(doc_id))?;

    Ok(Json(ApiResponse::success("Document details", document)))
}

pub async fn review_document(
    Path(doc_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<ReviewDocumentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let approve = body
        .approves()
        .ok_or_else(|| HttpError::bad_request("Invalid action."))?;

    let document = app_state
        .verification_service
        .review_document(auth.user.id, doc_id, approve, body.rejection_reason)
        .await?;

    let message = if approve {
        "Document approved."
    } else {
        "Document rejected."
    };
    Ok(Json(ApiResponse::success(message, document)))
}

pub async fn payment_disputes(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let disputes = app_state.db_client.get_disputed_payments().await?;
    Ok(Json(ApiResponse::success("Disputed payments", disputes)))
}

pub async fn resolve_dispute(
    Path(payment_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<ResolveDisputeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let approve = body.resolution.trim() == "approve";
    let payment = app_state
        .payment_service
        .resolve_dispute(payment_id, approve)
        .await?;

    tracing::info!("Admin {} resolved dispute on payment {}", auth.user.id, payment.id);

    let message = if approve {
        "Payment verified."
    } else {
        "Payment rejected and the application reopened."
    };
    Ok(Json(ApiResponse::success(message, payment)))
}

pub async fn list_certifications(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let catalog = app_state.db_client.get_certifications().await?;
    Ok(Json(ApiResponse::success("Certification catalog", catalog)))
}

pub async fn create_certification(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CreateCertificationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let certification = app_state
        .verification_service
        .create_certification(&body.name, body.description, body.issuing_org, body.validity_months)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Certification created.", certification)),
    ))
}

pub async fn pending_certifications(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let pending = app_state.db_client.get_pending_worker_certifications().await?;
    Ok(Json(ApiResponse::success("Pending certifications", pending)))
}

pub async fn verify_certification(
    Path(cert_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<VerifyCertificationDto>,
) -> Result<impl IntoResponse, HttpError> {
    let approve = body.action.trim() == "approve";
    let certification = app_state
        .verification_service
        .verify_worker_cert(cert_id, approve)
        .await?;

    let message = if approve {
        "Certification verified."
    } else {
        "Certification rejected."
    };
    Ok(Json(ApiResponse::success(message, certification)))
}

pub async fn analytics(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.db_client.get_platform_stats().await?;
    let recent_jobs = app_state.db_client.get_recent_jobs(ANALYTICS_RECENT).await?;
    let recent_payments = app_state.db_client.get_recent_payments(ANALYTICS_RECENT).await?;
    let rating_distribution = app_state.db_client.get_rating_distribution().await?;

    Ok(Json(ApiResponse::success(
        "Platform analytics",
        AnalyticsDto {
            total_workers: stats.total_workers,
            total_employers: stats.total_employers,
            total_jobs: stats.total_jobs,
            total_payments: stats.total_payment_amount.with_scale(2).to_string(),
            recent_jobs,
            recent_payments,
            rating_distribution,
        },
    )))
}
