use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        message::{model::InsertMessage, repository::MessageRepository, schema::MessageEntity},
        realtime::{ChangeEvent, ChangeHub},
    },
    test::StoreClock,
};

/// In-process message store. `seq` mirrors the BIGSERIAL column.
pub struct MessageMemoryRepository {
    rows: Mutex<Vec<MessageEntity>>,
    hub: ChangeHub,
    clock: Arc<StoreClock>,
    unavailable: AtomicBool,
}

impl MessageMemoryRepository {
    pub fn new(hub: ChangeHub, clock: Arc<StoreClock>) -> Self {
        Self { rows: Mutex::new(Vec::new()), hub, clock, unavailable: AtomicBool::new(false) }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), error::SystemError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(error::SystemError::store_unavailable("message store offline"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageMemoryRepository {
    async fn create(&self, message: &InsertMessage) -> Result<MessageEntity, error::SystemError> {
        self.check_available()?;
        let entity = {
            let mut rows = self.rows.lock().unwrap();
            let entity = MessageEntity {
                id: message.id,
                seq: rows.len() as i64 + 1,
                conversation_id: message.conversation_id,
                sender_id: message.sender_id.clone(),
                text: message.text.clone(),
                created_at: self.clock.now(),
            };
            rows.push(entity.clone());
            entity
        };

        self.hub.publish(ChangeEvent::Message { conversation_id: entity.conversation_id });
        Ok(entity)
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        self.check_available()?;
        let mut messages: Vec<MessageEntity> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        Ok(messages)
    }
}
