// service/sos_service.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{alertdb::AlertExt, db::DBClient, userdb::UserExt},
    models::usermodel::User,
    service::{error::ServiceError, notification_service::NotificationService},
    utils::geo::{google_maps_link, within_radius, GeoPoint, RESPONDER_RADIUS_KM},
};

#[derive(Debug, Clone, Serialize)]
pub struct SosOutcome {
    pub success: bool,
    pub alert_id: Uuid,
    pub responders_contacted: usize,
}

pub fn sos_message(worker: &User, lat: f64, lng: f64, at: DateTime<Utc>) -> String {
    let name = worker
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Unknown");
    let phone = worker.phone.as_deref().unwrap_or("no phone");

    format!(
        "🚨 EMERGENCY SOS 🚨\nWorker: {} ({})\nLocation: {}\nTime: {}",
        name,
        phone,
        google_maps_link(lat, lng),
        at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Nearby responders first, then every active admin; one entry per user, never the sender,
/// and only users we can text.
pub fn select_responders(sender_id: Uuid, nearby: Vec<User>, active_admins: Vec<User>) -> Vec<User> {
    let mut seen = HashSet::new();
    nearby
        .into_iter()
        .chain(active_admins)
        .filter(|u| u.id != sender_id)
        .filter(|u| u.phone.as_deref().map_or(false, |p| !p.is_empty()))
        .filter(|u| seen.insert(u.id))
        .collect()
}

#[derive(Debug, Clone)]
pub struct SosService {
    db_client: Arc<DBClient>,
    notifications: Arc<NotificationService>,
}

impl SosService {
    pub fn new(db_client: Arc<DBClient>, notifications: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notifications,
        }
    }

    /// Admins with a location within `radius_km`, nearest first.
    pub async fn nearest_responders(&self, origin: GeoPoint, radius_km: f64) -> Result<Vec<(User, f64)>, ServiceError> {
        let admins = self.db_client.get_admins_with_location().await?;
        Ok(within_radius(origin, admins, Some(radius_km), User::location))
    }

    async fn responders_for(&self, sender_id: Uuid, origin: GeoPoint) -> Result<Vec<User>, ServiceError> {
        let nearby = self
            .nearest_responders(origin, RESPONDER_RADIUS_KM)
            .await?
            .into_iter()
            .map(|(user, _)| user)
            .collect();
        let active_admins = self.db_client.get_active_admins().await?;
        Ok(select_responders(sender_id, nearby, active_admins))
    }

    pub async fn trigger(&self, worker: &User, lat: f64, lng: f64) -> Result<SosOutcome, ServiceError> {
        let alert = self.db_client.create_alert(worker.id, lat, lng).await?;
        tracing::warn!("SOS alert {} raised by user {} at {},{}", alert.id, worker.id, lat, lng);

        // The alert row exists; from here on failures only reduce the count.
        let responders = match self.responders_for(worker.id, GeoPoint::new(lat, lng)).await {
            Ok(responders) => responders,
            Err(e) => {
                tracing::error!("Could not load SOS responders for alert {}: {}", alert.id, e);
                Vec::new()
            }
        };

        let body = sos_message(worker, lat, lng, alert.created_at);
        let sends = responders.iter().filter_map(|r| r.phone.as_deref()).map(|phone| {
            let body = &body;
            async move {
                let sid = self.notifications.send_sms(phone, body).await;
                if sid.is_none() {
                    tracing::error!("SOS SMS to {} failed", phone);
                }
                sid.is_some()
            }
        });

        let responders_contacted = join_all(sends).await.into_iter().filter(|sent| *sent).count();

        tracing::info!(
            "SOS alert {} delivered to {} of {} responders",
            alert.id,
            responders_contacted,
            responders.len()
        );

        Ok(SosOutcome {
            success: true,
            alert_id: alert.id,
            responders_contacted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usermodel::{sample_user, UserRole};
    use chrono::TimeZone;

    fn admin_with_phone(phone: Option<&str>) -> User {
        let mut admin = sample_user(UserRole::Admin);
        admin.phone = phone.map(str::to_string);
        admin
    }

    #[test]
    fn test_message_format() {
        let mut worker = sample_user(UserRole::Worker);
        worker.name = Some("Ramesh".into());
        worker.phone = Some("+919876543210".into());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap();

        let message = sos_message(&worker, 17.385, 78.4867, at);
        assert!(message.starts_with("🚨 EMERGENCY SOS 🚨\n"));
        assert!(message.contains("Worker: Ramesh (+919876543210)"));
        assert!(message.contains("Location: https://www.google.com/maps?q=17.385,78.4867"));
        assert!(message.ends_with("Time: 2024-05-01 09:05 UTC"));

        worker.name = None;
        assert!(sos_message(&worker, 1.0, 2.0, at).contains("Worker: Unknown"));
    }

    #[test]
    fn test_responders_deduplicated_and_filtered() {
        let nearby = admin_with_phone(Some("+919000000001"));
        let silent = admin_with_phone(None);
        let other = admin_with_phone(Some("+919000000002"));
        let sender = admin_with_phone(Some("+919000000003"));

        let selected = select_responders(
            sender.id,
            vec![nearby.clone()],
            vec![nearby.clone(), silent, other.clone(), sender],
        );

        let ids: Vec<Uuid> = selected.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![nearby.id, other.id]);
    }
}
