mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::db::DBClient,
    mail::sendmail::Mailer,
    middleware::rate_limit::otp_rate_limiter,
    service::{
        geocoding::Geocoder, google_oauth::GoogleAuthService, job_service::JobService,
        notification_service::NotificationService, payment_service::PaymentService,
        profile_service::ProfileService, razorpay::RazorpayClient, sos_service::SosService,
        speech::SpeechClient, twilio::TwilioClient, verification_service::VerificationService,
    },
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub twilio: Arc<TwilioClient>,
    pub speech: Arc<SpeechClient>,
    pub google_auth: Arc<GoogleAuthService>,
    pub mailer: Arc<Mailer>,
    pub profile_service: Arc<ProfileService>,
    pub job_service: Arc<JobService>,
    pub payment_service: Arc<PaymentService>,
    pub sos_service: Arc<SosService>,
    pub verification_service: Arc<VerificationService>,
}

impl AppState {
    /// Wires clients and services together. Performs no IO.
    pub fn new(db_client: Arc<DBClient>, config: Config, http: reqwest::Client) -> Self {
        let twilio = Arc::new(TwilioClient::new(&config, http.clone()));
        let razorpay = Arc::new(RazorpayClient::new(&config, http.clone()));
        let speech = Arc::new(SpeechClient::new(&config, http.clone()));
        let google_auth = Arc::new(GoogleAuthService::new(&config, http.clone()));
        let geocoder = Arc::new(Geocoder::new(http));
        let mailer = Arc::new(Mailer::new(&config));

        let notification_service = Arc::new(NotificationService::new(db_client.clone(), twilio.clone()));
        let profile_service = Arc::new(ProfileService::new(
            db_client.clone(),
            notification_service.clone(),
            speech.clone(),
            geocoder,
            otp_rate_limiter(),
            config.upload_folder.clone(),
        ));
        let job_service = Arc::new(JobService::new(
            db_client.clone(),
            notification_service.clone(),
            profile_service.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            db_client.clone(),
            razorpay,
            notification_service.clone(),
        ));
        let sos_service = Arc::new(SosService::new(db_client.clone(), notification_service));
        let verification_service = Arc::new(VerificationService::new(
            db_client.clone(),
            config.upload_folder.clone(),
        ));

        Self {
            env: config,
            db_client,
            twilio,
            speech,
            google_auth,
            mailer,
            profile_service,
            job_service,
            payment_service,
            sos_service,
            verification_service,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    tracing::info!("Connection to the database is successful");

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.upload_folder)
        .await
        .with_context(|| format!("Failed to create upload folder {}", config.upload_folder))?;

    let db_client = match config.redis_url {
        Some(ref redis_url) => DBClient::with_redis(pool, redis_url).await,
        None => {
            tracing::info!("Redis not configured; logout token blacklist disabled");
            DBClient::new(pool)
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build the HTTP client")?;

    let app_state = Arc::new(AppState::new(Arc::new(db_client), config.clone(), http));
    tracing::info!("Token blacklist: {}", app_state.db_client.cache_status());

    let app = create_router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}
