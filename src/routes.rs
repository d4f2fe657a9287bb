use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    handler::{
        admin::admin_handler, auth::auth_handler, calls::calls_handler,
        documents::documents_handler, employer::employer_handler,
        google_oauth::google_oauth_handler, ivr::ivr_handler,
        notifications::notifications_handler, payments::payments_handler,
        public::public_handler, worker::worker_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.env.max_content_length;

    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest("/oauth", google_oauth_handler())
        .nest("/worker", worker_handler().layer(middleware::from_fn(auth)))
        .nest("/employer", employer_handler().layer(middleware::from_fn(auth)))
        .nest("/admin", admin_handler().layer(middleware::from_fn(auth)))
        .nest("/calls", calls_handler().layer(middleware::from_fn(auth)))
        .nest(
            "/notifications",
            notifications_handler().layer(middleware::from_fn(auth)),
        )
        .nest("/documents", documents_handler().layer(middleware::from_fn(auth)))
        .nest("/payments", payments_handler())
        .nest("/public", public_handler());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .nest("/ivr", ivr_handler())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::{config::Config, db::db::DBClient};

    fn test_app() -> Router {
        let config = Config::test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let state = AppState::new(Arc::new(DBClient::new(pool)), config, reqwest::Client::new());
        create_router(Arc::new(state))
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ivr_welcome_returns_twiml() {
        let response = test_app()
            .oneshot(Request::get("/ivr/welcome").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("/ivr/handle-language"));
    }

    #[tokio::test]
    async fn test_ivr_language_selection() {
        let response = test_app()
            .oneshot(
                Request::post("/ivr/handle-language")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("Digits=1&CallSid=CA123"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("/ivr/handle-action?lang=en-IN"));
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for uri in ["/api/worker/dashboard", "/api/admin/users", "/api/notifications/unread-count"] {
            let response = test_app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_invalid_phone_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::post("/api/auth/otp/request")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"phone":"12345"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = Config::test_config();
        config.max_content_length = 64;
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let state = AppState::new(Arc::new(DBClient::new(pool)), config, reqwest::Client::new());
        let app = create_router(Arc::new(state));

        let payload = format!(r#"{{"phone":"{}"}}"#, "9".repeat(200));
        let response = app
            .oneshot(
                Request::post("/api/auth/otp/request")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, payload.len())
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
