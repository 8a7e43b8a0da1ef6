use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    conversation::schema::ConversationEntity, message::schema::MessageEntity,
    realtime::Subscription,
};

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub id: Uuid,
    pub artist_id: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationBody {
    #[validate(length(min = 1, message = "Artist ID is required"))]
    pub artist_id: String,
}

/// What the caller wants to open.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenTarget {
    /// Start or resume a chat with this artist; the actor is the customer
    Artist(String),
    /// Re-open a conversation already listed somewhere (e.g. the artist inbox)
    Existing(Uuid),
}

/// A resolved conversation together with its live message feed.
pub struct OpenConversation {
    pub conversation: ConversationEntity,
    pub messages: Subscription<MessageEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    #[serde(flatten)]
    pub conversation: ConversationEntity,
    pub customer_name: String,
}
