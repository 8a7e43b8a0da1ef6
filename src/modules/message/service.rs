/// Message Service
///
/// Appends messages to a conversation, keeps the conversation summary in
/// step, and serves the ordered message sequence once or as a live feed.
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::constants::PREVIEW_MAX_CHARS;
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::message::model::InsertMessage;
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::MessageEntity;
use crate::modules::realtime::{spawn_snapshot, ChangeHub, Subscription, SubscriptionSettings};
use crate::utils::require_id;

pub struct MessageService<M, C>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ConversationRepository + Send + Sync + 'static,
{
    message_repo: Arc<M>,
    conversation_repo: Arc<C>,
    hub: ChangeHub,
    settings: SubscriptionSettings,
}

impl<M, C> Clone for MessageService<M, C>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ConversationRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            message_repo: self.message_repo.clone(),
            conversation_repo: self.conversation_repo.clone(),
            hub: self.hub.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<M, C> MessageService<M, C>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ConversationRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        hub: ChangeHub,
        settings: SubscriptionSettings,
    ) -> Self {
        MessageService { message_repo, conversation_repo, hub, settings }
    }

    /// Append a message and refresh the conversation summary.
    ///
    /// Flow:
    /// 1. Validate sender and trimmed text
    /// 2. Insert the message (authoritative)
    /// 3. Update `last_message` / `updated_at` in a second write
    ///
    /// A failure in step 3 leaves the message in place and is only logged;
    /// the summary is allowed to lag behind the message sequence.
    pub async fn send(
        &self,
        conversation_id: Uuid,
        sender_id: &str,
        text: &str,
    ) -> Result<MessageEntity, error::SystemError> {
        let sender_id = require_id(sender_id, "senderId")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(error::SystemError::invalid_argument("Message text cannot be empty"));
        }

        self.conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        let message = self
            .message_repo
            .create(&InsertMessage {
                id: Uuid::now_v7(),
                conversation_id,
                sender_id: sender_id.to_string(),
                text: text.to_string(),
            })
            .await?;

        match self.conversation_repo.update_summary(&conversation_id, &preview(text)).await {
            Ok(true) => {}
            Ok(false) => log::warn!("Conversation {} vanished before summary update", conversation_id),
            Err(e) => log::warn!("Summary update failed for conversation {}: {}", conversation_id, e),
        }

        log::info!("Message {} appended to conversation {}", message.id, conversation_id);
        Ok(message)
    }

    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        self.conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        self.message_repo.find_by_conversation(&conversation_id).await
    }

    /// Live, ordered message snapshots for one conversation.
    pub async fn subscribe(
        &self,
        conversation_id: Uuid,
    ) -> Result<Subscription<MessageEntity>, error::SystemError> {
        self.conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        Ok(message_snapshots(self.message_repo.clone(), &self.hub, conversation_id, &self.settings))
    }
}

/// Live message feed for a conversation known to exist.
pub fn message_snapshots<M>(
    message_repo: Arc<M>,
    hub: &ChangeHub,
    conversation_id: Uuid,
    settings: &SubscriptionSettings,
) -> Subscription<MessageEntity>
where
    M: MessageRepository + Send + Sync + 'static,
{
    spawn_snapshot(
        hub.subscribe(),
        settings.clone(),
        move |event| event.touches_conversation(&conversation_id),
        move || {
            let repo = message_repo.clone();
            async move { repo.find_by_conversation(&conversation_id).await }
        },
    )
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::realtime::SubscriptionEvent;
    use crate::test::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_send_appends_and_updates_summary() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();

        let message = fx.message_service.send(conversation.id, "C1", "hello").await.unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(message.sender_id, "C1");

        let messages = fx.message_service.get_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!((messages[0].sender_id.as_str(), messages[0].text.as_str()), ("C1", "hello"));

        let stored = fx.conversation_service.get_by_id(conversation.id).await.unwrap();
        assert_eq!(stored.last_message, "hello");
        assert!(stored.updated_at >= conversation.updated_at);
    }

    #[tokio::test]
    async fn test_send_trims_text_and_grows_sequence_by_one() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        fx.message_service.send(conversation.id, "C1", "first").await.unwrap();

        let message = fx.message_service.send(conversation.id, "A1", "  sure thing \n").await.unwrap();
        assert_eq!(message.text, "sure thing");

        let messages = fx.message_service.get_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "sure thing");
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_and_sequence_unchanged() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        fx.message_service.send(conversation.id, "C1", "hello").await.unwrap();

        for text in ["", "   ", "\n\t "] {
            let err = fx.message_service.send(conversation.id, "C1", text).await.unwrap_err();
            assert!(matches!(err, error::SystemError::InvalidArgument(_)));
        }

        assert_eq!(fx.message_service.get_messages(conversation.id).await.unwrap().len(), 1);
        let stored = fx.conversation_service.get_by_id(conversation.id).await.unwrap();
        assert_eq!(stored.last_message, "hello");
    }

    #[tokio::test]
    async fn test_blank_sender_is_rejected() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();

        let err = fx.message_service.send(conversation.id, " ", "hello").await.unwrap_err();
        assert!(matches!(err, error::SystemError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_send_to_unknown_conversation_is_not_found() {
        let fx = Fixture::new();
        let err = fx.message_service.send(Uuid::now_v7(), "C1", "hello").await.unwrap_err();
        assert!(matches!(err, error::SystemError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_store_unavailable() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        fx.messages.set_unavailable(true);

        let err = fx.message_service.send(conversation.id, "C1", "hello").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_failed_summary_update_keeps_message() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        fx.message_service.send(conversation.id, "C1", "hello").await.unwrap();

        let store = fx.conversations.clone();
        // let the existence check pass, then fail the summary write
        let message_service = MessageService::with_dependencies(
            fx.messages.clone(),
            Arc::new(FailingSummary(store)),
            fx.hub.clone(),
            fast_settings(),
        );
        message_service.send(conversation.id, "A1", "second").await.unwrap();

        let messages = fx.message_service.get_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        let stored = fx.conversation_service.get_by_id(conversation.id).await.unwrap();
        assert_eq!(stored.last_message, "hello");
    }

    #[tokio::test]
    async fn test_preview_is_truncated() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        let long = "é".repeat(PREVIEW_MAX_CHARS + 30);

        let message = fx.message_service.send(conversation.id, "C1", &long).await.unwrap();
        assert_eq!(message.text, long);

        let stored = fx.conversation_service.get_by_id(conversation.id).await.unwrap();
        assert_eq!(stored.last_message.chars().count(), PREVIEW_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_snapshots_stay_sorted_with_equal_timestamps() {
        let fx = Fixture::with_clock(StoreClock::frozen());
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        let mut sub = fx.message_service.subscribe(conversation.id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        let texts = ["one", "two", "three", "four"];
        for (i, text) in texts.iter().enumerate() {
            let sender = if i % 2 == 0 { "C1" } else { "A1" };
            fx.message_service.send(conversation.id, sender, text).await.unwrap();
        }

        let mut latest = Vec::new();
        while latest.len() < texts.len() {
            latest = next_snapshot(&mut sub).await;
            assert!(latest
                .windows(2)
                .all(|w| (w[0].created_at, w[0].seq) <= (w[1].created_at, w[1].seq)));
        }
        let delivered: Vec<&str> = latest.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(delivered, texts);
    }

    #[tokio::test]
    async fn test_subscription_ignores_other_conversations() {
        let fx = Fixture::new();
        let mine = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        let other = fx.conversation_service.resolve("A1", "C2").await.unwrap();
        let mut sub = fx.message_service.subscribe(mine.id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());

        fx.message_service.send(other.id, "C2", "not for you").await.unwrap();
        assert!(timeout(Duration::from_millis(100), sub.next()).await.is_err());

        fx.message_service.send(mine.id, "C1", "for you").await.unwrap();
        assert_eq!(next_snapshot(&mut sub).await[0].text, "for you");
    }

    #[tokio::test]
    async fn test_cancelled_subscription_receives_nothing_more() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        let mut sub = fx.message_service.subscribe(conversation.id).await.unwrap();
        next_snapshot(&mut sub).await;

        sub.cancel();
        fx.message_service.send(conversation.id, "A1", "anyone there?").await.unwrap();

        assert!(timeout(Duration::from_secs(1), sub.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrecoverable_outage_ends_subscription_with_one_error() {
        let fx = Fixture::new();
        let conversation = fx.conversation_service.resolve("A1", "C1").await.unwrap();
        let mut sub = fx.message_service.subscribe(conversation.id).await.unwrap();
        next_snapshot(&mut sub).await;

        fx.messages.set_unavailable(true);
        fx.hub.publish(crate::modules::realtime::ChangeEvent::Message {
            conversation_id: conversation.id,
        });

        match timeout(Duration::from_secs(2), sub.next()).await.unwrap() {
            Some(SubscriptionEvent::Failed(e)) => assert!(e.is_transient()),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(timeout(Duration::from_secs(1), sub.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_to_unknown_conversation_is_not_found() {
        let fx = Fixture::new();
        let result = fx.message_service.subscribe(Uuid::now_v7()).await;
        assert!(matches!(result, Err(error::SystemError::NotFound(_))));
    }
}
