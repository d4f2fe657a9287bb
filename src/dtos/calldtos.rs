use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::callmodel::CallType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCallDto {
    pub recipient_id: Option<Uuid>,
    #[serde(rename = "type", default)]
    pub call_type: CallType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallTokenDto {
    pub token: String,
    pub identity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallStartedDto {
    pub room_name: String,
    pub room_sid: String,
    pub call_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallStatusDto {
    pub room_sid: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_call_defaults_to_audio() {
        let dto: StartCallDto = serde_json::from_str(r#"{"recipient_id": null}"#).unwrap();
        assert!(dto.recipient_id.is_none());
        assert_eq!(dto.call_type, CallType::Audio);

        let dto: StartCallDto = serde_json::from_value(serde_json::json!({
            "recipient_id": "6f1c2d9e-8a4b-4c1d-9e2f-3a4b5c6d7e8f",
            "type": "video"
        }))
        .unwrap();
        assert_eq!(dto.call_type, CallType::Video);
    }
}
