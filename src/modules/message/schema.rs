use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntity {
    pub id: Uuid,
    /// Store insertion order; breaks `created_at` ties
    pub seq: i64,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
