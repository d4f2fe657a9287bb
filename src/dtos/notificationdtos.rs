use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountDto {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearedNotificationsDto {
    pub cleared: u64,
}
