use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone)]
pub struct InsertMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageBody {
    #[validate(length(min = 1, message = "Message text cannot be empty"))]
    pub text: String,
}
