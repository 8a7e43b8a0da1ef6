use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Namespace for deriving conversation ids from participant pairs.
const CONVERSATION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b9e_4d7a_4c11_9e3b_58a0_d2f7_41c6);

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntity {
    pub id: Uuid,
    pub artist_id: String,
    pub customer_id: String,
    pub last_message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ConversationEntity {
    /// Deterministic id for the unordered pair `{a, b}`.
    ///
    /// Both ids are length-prefixed so that no two distinct pairs can
    /// produce the same name.
    pub fn key_for(a: &str, b: &str) -> Uuid {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let name = format!("{}:{}{}:{}", lo.len(), lo, hi.len(), hi);
        Uuid::new_v5(&CONVERSATION_NAMESPACE, name.as_bytes())
    }
}
