use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::NewConversation, repository::ConversationRepository, schema::ConversationEntity,
        },
        realtime::{ChangeEvent, ChangeHub},
    },
    test::StoreClock,
};

/// In-process conversation store. Publishes the same change events the
/// Postgres triggers emit.
pub struct ConversationMemoryRepository {
    rows: Mutex<HashMap<Uuid, ConversationEntity>>,
    hub: ChangeHub,
    clock: Arc<StoreClock>,
    unavailable: AtomicBool,
    inserts: AtomicUsize,
}

impl ConversationMemoryRepository {
    pub fn new(hub: ChangeHub, clock: Arc<StoreClock>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            hub,
            clock,
            unavailable: AtomicBool::new(false),
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of records ever inserted.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), error::SystemError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(error::SystemError::store_unavailable("conversation store offline"));
        }
        Ok(())
    }

    fn notify(&self, conversation: &ConversationEntity) {
        self.hub.publish(ChangeEvent::Conversation {
            conversation_id: conversation.id,
            artist_id: conversation.artist_id.clone(),
        });
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationMemoryRepository {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.check_available()?;
        Ok(self.rows.lock().unwrap().get(conversation_id).cloned())
    }

    async fn create_if_absent(
        &self,
        conversation: &NewConversation,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        self.check_available()?;
        let (entity, inserted) = {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&conversation.id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let now = self.clock.now();
                    let entity = ConversationEntity {
                        id: conversation.id,
                        artist_id: conversation.artist_id.clone(),
                        customer_id: conversation.customer_id.clone(),
                        last_message: String::new(),
                        created_at: now,
                        updated_at: now,
                    };
                    rows.insert(entity.id, entity.clone());
                    (entity, true)
                }
            }
        };

        if inserted {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.notify(&entity);
        }
        Ok(Some(entity))
    }

    async fn update_summary(
        &self,
        conversation_id: &Uuid,
        last_message: &str,
    ) -> Result<bool, error::SystemError> {
        self.check_available()?;
        let updated = {
            let mut rows = self.rows.lock().unwrap();
            rows.get_mut(conversation_id).map(|row| {
                row.last_message = last_message.to_string();
                row.updated_at = self.clock.now();
                row.clone()
            })
        };

        match updated {
            Some(entity) => {
                self.notify(&entity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<ConversationEntity>, error::SystemError> {
        self.check_available()?;
        let mut conversations: Vec<ConversationEntity> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.artist_id == artist_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(conversations)
    }
}
