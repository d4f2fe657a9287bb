// service/payment_service.rs
use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::JobExt,
        paymentdb::{NewPayment, PaymentExt},
        userdb::UserExt,
    },
    models::{
        jobmodel::{Application, Job, JobStatus},
        paymentmodel::{Payment, PaymentMethod, PaymentStatus},
        usermodel::User,
    },
    service::{
        error::ServiceError,
        notification_service::NotificationService,
        razorpay::{OrderNotes, RazorpayClient, RazorpayError, RazorpayOrder, RazorpayPayment},
    },
    utils::currency::{format_rupees, paise_to_rupees},
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum PaymentInitiation {
    /// Open the checkout widget with this order.
    Checkout { order: RazorpayOrder, key_id: String, job_id: Uuid },
    /// Cash and bank transfers are recorded by hand afterwards.
    #[serde(rename = "record-payment")]
    RecordPayment { method: PaymentMethod, job_id: Uuid },
}

/// Fields Razorpay posts back after checkout.
#[derive(Debug, Clone, Default)]
pub struct GatewayCallback {
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CallbackOutcome {
    Recorded { payment_id: Uuid, job_id: Uuid },
    AlreadyRecorded { job_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkerPaymentAction {
    Confirm,
    Dispute,
}

impl FromStr for WorkerPaymentAction {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "confirm" => Ok(WorkerPaymentAction::Confirm),
            "dispute" => Ok(WorkerPaymentAction::Dispute),
            _ => Err(ServiceError::validation("Invalid action.")),
        }
    }
}

fn gateway_error(error: RazorpayError) -> ServiceError {
    match error {
        small @ RazorpayError::AmountTooSmall => ServiceError::validation(small.to_string()),
        other => ServiceError::Gateway(other.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Job details of a fetched gateway payment, once it is known to be a captured payment
/// for the order the checkout posted.
fn captured_order_notes(order_id: &str, payment: &RazorpayPayment) -> Result<OrderNotes, ServiceError> {
    if !payment.belongs_to_order(order_id) {
        tracing::warn!(
            "Razorpay payment {} belongs to order {:?}, not {}",
            payment.id,
            payment.order_id,
            order_id
        );
        return Err(ServiceError::validation("Payment does not belong to this order."));
    }

    if payment.status != "captured" {
        return Err(ServiceError::validation(format!(
            "Payment is {} at the gateway, not captured.",
            payment.status
        )));
    }

    payment
        .order_notes()
        .ok_or_else(|| ServiceError::validation("Payment is missing its job details."))
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    db_client: Arc<DBClient>,
    razorpay: Arc<RazorpayClient>,
    notifications: Arc<NotificationService>,
}

impl PaymentService {
    pub fn new(
        db_client: Arc<DBClient>,
        razorpay: Arc<RazorpayClient>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_client,
            razorpay,
            notifications,
        }
    }

    /// Application plus its job, checked against the acting employer.
    async fn employer_application(
        &self,
        employer_id: Uuid,
        application_id: Uuid,
    ) -> Result<(Application, Job), ServiceError> {
        let application = self
            .db_client
            .get_application(application_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;

        let job = self
            .db_client
            .get_job(application.job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(application.job_id))?;

        if job.employer_id != employer_id {
            return Err(ServiceError::Forbidden);
        }

        Ok((application, job))
    }

    pub async fn initiate_payment(
        &self,
        employer_id: Uuid,
        application_id: Uuid,
        method: PaymentMethod,
    ) -> Result<PaymentInitiation, ServiceError> {
        let (application, job) = self.employer_application(employer_id, application_id).await?;

        if job.status != JobStatus::Completed {
            return Err(ServiceError::InvalidJobStatus(job.status, JobStatus::Completed));
        }

        if self
            .db_client
            .has_completed_payment(job.id, application.worker_id)
            .await?
        {
            return Err(ServiceError::validation("Payment for this job has already been completed."));
        }

        match method {
            PaymentMethod::Razorpay => {
                let notes = OrderNotes {
                    job_id: job.id,
                    employer_id,
                    worker_id: application.worker_id,
                };
                let order = self
                    .razorpay
                    .create_order(&job.salary, &notes)
                    .await
                    .map_err(gateway_error)?;

                tracing::info!("Razorpay order {} created for job {}", order.id, job.id);

                Ok(PaymentInitiation::Checkout {
                    order,
                    key_id: self.razorpay.key_id().to_string(),
                    job_id: job.id,
                })
            }
            manual => Ok(PaymentInitiation::RecordPayment { method: manual, job_id: job.id }),
        }
    }

    pub async fn handle_callback(&self, callback: GatewayCallback) -> Result<CallbackOutcome, ServiceError> {
        let (payment_id, order_id, signature) = match (
            non_empty(callback.payment_id),
            non_empty(callback.order_id),
            non_empty(callback.signature),
        ) {
            (Some(p), Some(o), Some(s)) => (p, o, s),
            _ => return Err(ServiceError::validation("Missing payment details from gateway.")),
        };

        if !self.razorpay.verify_signature(&order_id, &payment_id, &signature) {
            tracing::warn!("Rejected Razorpay callback with bad signature for {}", payment_id);
            return Err(ServiceError::validation("Payment signature verification failed."));
        }

        let gateway_payment = self
            .razorpay
            .fetch_payment(&payment_id)
            .await
            .map_err(gateway_error)?;

        let notes = captured_order_notes(&order_id, &gateway_payment)?;

        if let Some(existing) = self.db_client.get_payment_by_transaction(&payment_id).await? {
            tracing::info!("Razorpay payment {} already recorded as {}", payment_id, existing.id);
            return Ok(CallbackOutcome::AlreadyRecorded { job_id: existing.job_id });
        }

        let recorded = self
            .db_client
            .record_gateway_payment(NewPayment {
                job_id: notes.job_id,
                worker_id: notes.worker_id,
                employer_id: notes.employer_id,
                amount: paise_to_rupees(gateway_payment.amount),
                method: PaymentMethod::Razorpay,
                status: PaymentStatus::Completed,
                transaction_id: Some(payment_id.clone()),
                created_at: Utc.timestamp_opt(gateway_payment.created_at, 0).single(),
                verified_at: Some(Utc::now()),
            })
            .await?;

        match recorded {
            Some(payment) => {
                tracing::info!("Recorded Razorpay payment {} for job {}", payment_id, payment.job_id);
                Ok(CallbackOutcome::Recorded {
                    payment_id: payment.id,
                    job_id: payment.job_id,
                })
            }
            // A concurrent callback inserted it first
            None => Ok(CallbackOutcome::AlreadyRecorded { job_id: notes.job_id }),
        }
    }

    pub async fn record_manual_payment(
        &self,
        employer_id: Uuid,
        application_id: Uuid,
        amount: BigDecimal,
        method: PaymentMethod,
        transaction_id: Option<String>,
    ) -> Result<Payment, ServiceError> {
        if method == PaymentMethod::Razorpay {
            return Err(ServiceError::validation("Online payments are recorded by the gateway."));
        }
        if amount <= BigDecimal::from(0) {
            return Err(ServiceError::validation("Amount must be greater than zero."));
        }

        let (application, job) = self.employer_application(employer_id, application_id).await?;

        let payment = self
            .db_client
            .create_payment(NewPayment {
                job_id: job.id,
                worker_id: application.worker_id,
                employer_id,
                amount,
                method,
                status: PaymentStatus::Pending,
                transaction_id: non_empty(transaction_id),
                created_at: None,
                verified_at: None,
            })
            .await?;

        self.notifications
            .notify(
                application.worker_id,
                "Payment Recorded",
                &format!(
                    "Employer recorded a {} payment of Rs.{} for '{}'. Please verify in Payment History.",
                    method.to_str(),
                    payment.amount.with_scale(2),
                    job.title
                ),
                Some("/api/worker/payments"),
            )
            .await;

        Ok(payment)
    }

    /// The worker's answer to a manually recorded payment.
    pub async fn worker_verify(
        &self,
        worker: &User,
        payment_id: Uuid,
        action: WorkerPaymentAction,
    ) -> Result<Payment, ServiceError> {
        let payment = self
            .db_client
            .get_payment(payment_id)
            .await?
            .filter(|p| p.worker_id == worker.id)
            .ok_or(ServiceError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Pending {
            return Err(ServiceError::InvalidPaymentStatus(payment.status));
        }

        let target = match action {
            WorkerPaymentAction::Confirm => PaymentStatus::Verified,
            WorkerPaymentAction::Dispute => PaymentStatus::Disputed,
        };

        let updated = self
            .db_client
            .settle_pending_payment(payment_id, target)
            .await?
            .ok_or(ServiceError::InvalidPaymentStatus(payment.status))?;

        if action == WorkerPaymentAction::Dispute {
            let job_title = self
                .db_client
                .get_job(updated.job_id)
                .await?
                .map(|j| j.title)
                .unwrap_or_default();

            self.notifications
                .notify_admins(
                    "Payment Dispute Raised",
                    &format!(
                        "Worker {} disputed payment ID {} for job '{}'.",
                        worker.display_name(),
                        updated.id,
                        job_title
                    ),
                    Some("/api/admin/payments/disputes"),
                )
                .await;
        }

        Ok(updated)
    }

    pub async fn resolve_dispute(&self, payment_id: Uuid, approve: bool) -> Result<Payment, ServiceError> {
        let payment = self
            .db_client
            .get_payment(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Disputed {
            return Err(ServiceError::InvalidPaymentStatus(payment.status));
        }

        let resolved = self
            .db_client
            .resolve_dispute(payment_id, approve)
            .await?
            .ok_or(ServiceError::InvalidPaymentStatus(payment.status))?;

        tracing::info!(
            "Dispute on payment {} resolved as {}",
            payment_id,
            resolved.status.to_str()
        );

        if approve {
            self.announce_verified(&resolved).await;
        }

        Ok(resolved)
    }

    async fn announce_verified(&self, payment: &Payment) {
        let title = match self.db_client.get_job(payment.job_id).await {
            Ok(Some(job)) => job.title,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::error!("Could not load job {} for payment notice: {}", payment.job_id, e);
                return;
            }
        };

        let body = format!(
            "Admin has verified your payment of {} for {}",
            format_rupees(&payment.amount),
            title
        );

        for user_id in [payment.worker_id, payment.employer_id] {
            let phone = match self.db_client.get_user(Some(user_id), None, None, None).await {
                Ok(Some(user)) => user.phone,
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("Could not load user {} for payment notice: {}", user_id, e);
                    None
                }
            };

            if let Some(phone) = phone.filter(|p| !p.is_empty()) {
                self.notifications.send_whatsapp(&phone, &body).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::fixtures,
        service::{razorpay::hmac_sha256_hex, twilio::TwilioClient},
    };
    use axum::{routing::get, Json, Router};
    use sqlx::PgPool;

    #[test]
    fn test_worker_actions() {
        assert_eq!("confirm".parse::<WorkerPaymentAction>().unwrap(), WorkerPaymentAction::Confirm);
        assert_eq!(" dispute ".parse::<WorkerPaymentAction>().unwrap(), WorkerPaymentAction::Dispute);
        assert!("refund".parse::<WorkerPaymentAction>().is_err());
    }

    #[test]
    fn test_small_amount_is_a_validation_error() {
        let err = gateway_error(RazorpayError::AmountTooSmall);
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = gateway_error(RazorpayError::Api("Bad request".into()));
        assert!(matches!(err, ServiceError::Gateway(_)));
    }

    #[test]
    fn test_initiation_wire_shape() {
        let json = serde_json::to_value(PaymentInitiation::RecordPayment {
            method: PaymentMethod::Cash,
            job_id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["next"], "record-payment");
        assert_eq!(json["method"], "cash");
    }

    fn gateway_payment(order_id: Option<&str>, status: &str) -> RazorpayPayment {
        RazorpayPayment {
            id: "pay_29QQoUBi66xm2f".into(),
            amount: 50000,
            status: status.into(),
            order_id: order_id.map(String::from),
            created_at: 1_700_000_000,
            notes: serde_json::json!({
                "job_id": Uuid::new_v4().to_string(),
                "employer_id": Uuid::new_v4().to_string(),
                "worker_id": Uuid::new_v4().to_string(),
            }),
        }
    }

    #[test]
    fn test_captured_payment_for_posted_order() {
        let payment = gateway_payment(Some("order_9A33XWu170gUtm"), "captured");
        let notes = captured_order_notes("order_9A33XWu170gUtm", &payment).unwrap();
        assert_eq!(Some(notes.job_id), payment.note_uuid("job_id"));
    }

    #[test]
    fn test_payment_from_another_order_is_rejected() {
        let payment = gateway_payment(Some("order_OTHER0000000"), "captured");
        let err = captured_order_notes("order_9A33XWu170gUtm", &payment).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let orphan = gateway_payment(None, "captured");
        assert!(captured_order_notes("order_9A33XWu170gUtm", &orphan).is_err());
    }

    #[test]
    fn test_uncaptured_payment_is_rejected() {
        let payment = gateway_payment(Some("order_9A33XWu170gUtm"), "authorized");
        let err = captured_order_notes("order_9A33XWu170gUtm", &payment).unwrap_err();
        assert!(err.to_string().contains("authorized"));
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" pay_1 ".into())).as_deref(), Some("pay_1"));
    }

    /// Serves `payment` from `GET /payments/:id` on a local port.
    async fn gateway_serving(payment: RazorpayPayment) -> String {
        let app = Router::new().route(
            "/payments/:id",
            get(move || {
                let payment = payment.clone();
                async move { Json(payment) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn service_with(pool: PgPool, api_base: String) -> PaymentService {
        let config = Config::test_config();
        let http = reqwest::Client::new();
        let db_client = Arc::new(DBClient::new(pool));
        let twilio = Arc::new(TwilioClient::new(&config, http.clone()));

        PaymentService::new(
            db_client.clone(),
            Arc::new(RazorpayClient::new(&config, http).with_api_base(api_base)),
            Arc::new(NotificationService::new(db_client, twilio)),
        )
    }

    fn signed_callback(order_id: &str, payment_id: &str) -> GatewayCallback {
        let secret = Config::test_config().razorpay_key_secret;
        GatewayCallback {
            payment_id: Some(payment_id.to_string()),
            order_id: Some(order_id.to_string()),
            signature: Some(hmac_sha256_hex(&secret, &format!("{}|{}", order_id, payment_id))),
        }
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_replayed_callback_is_recorded_once(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let employer = fixtures::employer(&db, "site@sharma.in").await;
        let worker = fixtures::worker(&db, "Ramesh", "+919876543210").await;
        let job = fixtures::active_job(&db, employer.id, "Wall plastering").await;

        let mut captured = gateway_payment(Some("order_9A33XWu170gUtm"), "captured");
        captured.notes = serde_json::json!({
            "job_id": job.id.to_string(),
            "employer_id": employer.id.to_string(),
            "worker_id": worker.id.to_string(),
        });
        let service = service_with(pool, gateway_serving(captured.clone()).await);
        let callback = signed_callback("order_9A33XWu170gUtm", &captured.id);

        let payment_id = match service.handle_callback(callback.clone()).await.unwrap() {
            CallbackOutcome::Recorded { payment_id, job_id } => {
                assert_eq!(job_id, job.id);
                payment_id
            }
            other => panic!("first callback should record the payment, got {:?}", other),
        };

        let again = service.handle_callback(callback).await.unwrap();
        assert!(matches!(again, CallbackOutcome::AlreadyRecorded { job_id } if job_id == job.id));

        let stored = db.get_payment_by_transaction(&captured.id).await.unwrap().unwrap();
        assert_eq!(stored.id, payment_id);
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.amount, BigDecimal::from(500));
        assert_eq!(db.count_employer_payments(employer.id).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_callback_for_other_order_records_nothing(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let captured = gateway_payment(Some("order_OTHER0000000"), "captured");
        let service = service_with(pool, gateway_serving(captured.clone()).await);

        let err = service
            .handle_callback(signed_callback("order_9A33XWu170gUtm", &captured.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(db.get_payment_by_transaction(&captured.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_signature_never_reaches_the_gateway() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&Config::test_config().database_url)
            .unwrap();
        // Nothing listens here
        let service = service_with(pool, "http://127.0.0.1:1".to_string());

        let mut callback = signed_callback("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f");
        callback.signature = Some("0".repeat(64));

        let err = service.handle_callback(callback).await.unwrap_err();
        assert!(err.to_string().contains("signature"));
    }
}
