use std::sync::Arc;

use axum::{response::IntoResponse, routing::post, Extension, Form, Json, Router};

use crate::{
    dtos::{paymentdtos::RazorpayCallbackForm, responsedtos::ApiResponse},
    error::HttpError,
    service::payment_service::CallbackOutcome,
    AppState,
};

/// Gateway webhooks; authenticity comes from the payment signature.
pub fn payments_handler() -> Router {
    Router::new().route("/razorpay/callback", post(razorpay_callback))
}

pub async fn razorpay_callback(
    Extension(app_state): Extension<Arc<AppState>>,
    Form(form): Form<RazorpayCallbackForm>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state.payment_service.handle_callback(form.into()).await?;

    let message = match &outcome {
        CallbackOutcome::Recorded { .. } => "Payment successful!",
        CallbackOutcome::AlreadyRecorded { .. } => "Payment already recorded.",
    };

    Ok(Json(ApiResponse::success(message, outcome)))
}
