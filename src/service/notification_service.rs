// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{db::DBClient, notificationdb::NotificationExt, userdb::UserExt},
    service::twilio::TwilioClient,
};

/// In-app notifications plus the SMS/WhatsApp side channel.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<DBClient>,
    twilio: Arc<TwilioClient>,
}

impl NotificationService {
    pub fn new(db_client: Arc<DBClient>, twilio: Arc<TwilioClient>) -> Self {
        Self { db_client, twilio }
    }

    /// Stores an in-app notification. Failures are logged; the triggering action has already happened.
    pub async fn notify(&self, user_id: Uuid, title: &str, message: &str, link_url: Option<&str>) {
        match self
            .db_client
            .create_notification(user_id, title, message, link_url)
            .await
        {
            Ok(_) => tracing::debug!("Notification '{}' stored for user {}", title, user_id),
            Err(e) => tracing::error!("Failed to store notification '{}' for user {}: {}", title, user_id, e),
        }
    }

    /// Notifies every active admin.
    pub async fn notify_admins(&self, title: &str, message: &str, link_url: Option<&str>) {
        let admins = match self.db_client.get_active_admins().await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::error!("Could not load admins for '{}': {}", title, e);
                return;
            }
        };

        for admin in admins {
            self.notify(admin.id, title, message, link_url).await;
        }
    }

    pub async fn send_otp(&self, phone: &str, otp: &str) -> bool {
        let body = format!(
            "Your ShramBandhu verification code is {}. It is valid for 5 minutes.",
            otp
        );
        self.twilio.send_sms(phone, &body).await.is_some()
    }

    pub async fn send_sms(&self, phone: &str, body: &str) -> Option<String> {
        self.twilio.send_sms(phone, body).await
    }

    pub async fn send_whatsapp(&self, phone: &str, body: &str) -> Option<String> {
        self.twilio.send_whatsapp(phone, body).await
    }
}
