use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};

use crate::{
    dtos::responsedtos::ApiResponse,
    error::HttpError,
    handler::forms::MultipartForm,
    middleware::JWTAuthMiddeware,
    service::verification_service::StoredFileKind,
    utils::uploads::content_type_for,
    AppState,
};

pub fn documents_handler() -> Router {
    Router::new()
        .route("/view/*path", get(view_document))
        .route("/certs/*path", get(view_certification_document))
}

/// KYC upload shared by workers and employers.
pub async fn upload_document(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut form = MultipartForm::read(multipart).await?;
    let document_type = form.required_text("document_type")?;
    let document_number = form.text("document_number");
    let file = form.take_file("document")?;

    let document = app_state
        .verification_service
        .upload_document(&auth.user, &document_type, document_number, file)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Document uploaded and sent for verification.",
            document,
        )),
    ))
}

async fn serve_file(
    app_state: &AppState,
    auth: &JWTAuthMiddeware,
    kind: StoredFileKind,
    relative: &str,
) -> Result<Response, HttpError> {
    let path = app_state
        .verification_service
        .authorize_download(&auth.user, kind, relative)
        .await?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!("Failed to read {}: {}", path.display(), e);
        HttpError::server_error("Could not read the file")
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(relative))
        .body(Body::from(bytes))
        .map_err(|e| HttpError::server_error(e.to_string()))
}

pub async fn view_document(
    Path(path): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    serve_file(&app_state, &auth, StoredFileKind::Document, &path).await
}

pub async fn view_certification_document(
    Path(path): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    serve_file(&app_state, &auth, StoredFileKind::CertificationDocument, &path).await
}
