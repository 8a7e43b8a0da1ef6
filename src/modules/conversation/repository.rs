use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{model::NewConversation, schema::ConversationEntity},
};

#[async_trait::async_trait]
pub trait ConversationRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Insert unless a conversation with the same id exists, then return
    /// whichever record is stored.
    ///
    /// `Ok(None)` when a concurrent writer committed the record after this
    /// statement's snapshot was taken. A fresh read will see it.
    async fn create_if_absent(
        &self,
        conversation: &NewConversation,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Overwrite the summary fields. `Ok(false)` when no such conversation exists.
    async fn update_summary(
        &self,
        conversation_id: &Uuid,
        last_message: &str,
    ) -> Result<bool, error::SystemError>;

    /// Newest activity first.
    async fn find_by_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<ConversationEntity>, error::SystemError>;
}
