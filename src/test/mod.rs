//! Shared fixtures for service tests: in-memory stores wired to one change hub.
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::NewConversation, repository::ConversationRepository,
            repository_memory::ConversationMemoryRepository, schema::ConversationEntity,
            service::ConversationService,
        },
        message::{repository_memory::MessageMemoryRepository, service::MessageService},
        profile::{repository_memory::ProfileMemoryRepository, service::ProfileService},
        realtime::{ChangeHub, Subscription, SubscriptionEvent, SubscriptionSettings},
    },
    utils::Identity,
};

/// Timestamp source for the in-memory stores.
///
/// A running clock never repeats a value, so `updated_at` ordering is stable
/// in tests. A frozen clock returns the same instant forever.
pub struct StoreClock {
    last: Mutex<DateTime<Utc>>,
    frozen: bool,
}

impl StoreClock {
    pub fn new() -> Self {
        Self { last: Mutex::new(DateTime::<Utc>::MIN_UTC), frozen: false }
    }

    pub fn frozen() -> Self {
        Self { last: Mutex::new(Utc::now()), frozen: true }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap();
        if !self.frozen {
            let now = Utc::now();
            *last = if now > *last { now } else { *last + ChronoDuration::microseconds(1) };
        }
        *last
    }
}

pub type TestConversationService =
    ConversationService<ConversationMemoryRepository, MessageMemoryRepository, ProfileMemoryRepository>;
pub type TestMessageService = MessageService<MessageMemoryRepository, ConversationMemoryRepository>;

pub struct Fixture {
    pub hub: ChangeHub,
    pub conversations: Arc<ConversationMemoryRepository>,
    pub messages: Arc<MessageMemoryRepository>,
    pub profiles: Arc<ProfileMemoryRepository>,
    pub conversation_service: TestConversationService,
    pub message_service: TestMessageService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_clock(StoreClock::new())
    }

    pub fn with_clock(clock: StoreClock) -> Self {
        let clock = Arc::new(clock);
        let hub = ChangeHub::new(64);

        let conversations = Arc::new(ConversationMemoryRepository::new(hub.clone(), clock.clone()));
        let messages = Arc::new(MessageMemoryRepository::new(hub.clone(), clock));
        let profiles = Arc::new(ProfileMemoryRepository::default());

        let profile_service = ProfileService::with_dependencies(profiles.clone(), None, 60);
        let conversation_service = ConversationService::with_dependencies(
            conversations.clone(),
            messages.clone(),
            profile_service,
            hub.clone(),
            fast_settings(),
        );
        let message_service = MessageService::with_dependencies(
            messages.clone(),
            conversations.clone(),
            hub.clone(),
            fast_settings(),
        );

        Self { hub, conversations, messages, profiles, conversation_service, message_service }
    }
}

pub fn fast_settings() -> SubscriptionSettings {
    SubscriptionSettings { buffer: 16, max_retries: 2, retry_backoff: Duration::from_millis(1) }
}

pub fn identity(id: &str) -> Identity {
    Identity { id: id.to_string(), email: None, display_name: None }
}

/// Next delivery, which must be a snapshot.
pub async fn next_snapshot<T: Debug>(sub: &mut Subscription<T>) -> Vec<T> {
    match tokio::time::timeout(Duration::from_secs(2), sub.next()).await {
        Ok(Some(SubscriptionEvent::Snapshot(items))) => items,
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

/// Conversation store whose summary writes always fail.
pub struct FailingSummary(pub Arc<ConversationMemoryRepository>);

#[async_trait::async_trait]
impl ConversationRepository for FailingSummary {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.0.find_by_id(conversation_id).await
    }

    async fn create_if_absent(
        &self,
        conversation: &NewConversation,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.0.create_if_absent(conversation).await
    }

    async fn update_summary(
        &self,
        _conversation_id: &Uuid,
        _last_message: &str,
    ) -> Result<bool, error::SystemError> {
        Err(error::SystemError::store_unavailable("summary write rejected"))
    }

    async fn find_by_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        self.0.find_by_artist(artist_id).await
    }
}

/// Conversation store where every conditional insert loses to a concurrent
/// writer: the row gets stored, but the inserting statement does not see it.
pub struct LostInsertRace(pub Arc<ConversationMemoryRepository>);

#[async_trait::async_trait]
impl ConversationRepository for LostInsertRace {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.0.find_by_id(conversation_id).await
    }

    async fn create_if_absent(
        &self,
        conversation: &NewConversation,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.0.create_if_absent(conversation).await?;
        Ok(None)
    }

    async fn update_summary(
        &self,
        conversation_id: &Uuid,
        last_message: &str,
    ) -> Result<bool, error::SystemError> {
        self.0.update_summary(conversation_id, last_message).await
    }

    async fn find_by_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        self.0.find_by_artist(artist_id).await
    }
}
