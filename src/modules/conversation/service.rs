use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::{InboxEntry, NewConversation, OpenConversation, OpenTarget},
            repository::ConversationRepository,
            schema::ConversationEntity,
        },
        message::{repository::MessageRepository, service::message_snapshots},
        profile::{repository::ProfileRepository, service::ProfileService},
        realtime::{spawn_snapshot, ChangeHub, Subscription, SubscriptionSettings},
    },
    utils::{require_id, require_identity, Identity},
};

pub struct ConversationService<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    conversation_repo: Arc<C>,
    message_repo: Arc<M>,
    profile_service: ProfileService<P>,
    hub: ChangeHub,
    settings: SubscriptionSettings,
}

impl<C, M, P> Clone for ConversationService<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            conversation_repo: self.conversation_repo.clone(),
            message_repo: self.message_repo.clone(),
            profile_service: self.profile_service.clone(),
            hub: self.hub.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<C, M, P> ConversationService<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        conversation_repo: Arc<C>,
        message_repo: Arc<M>,
        profile_service: ProfileService<P>,
        hub: ChangeHub,
        settings: SubscriptionSettings,
    ) -> Self {
        ConversationService { conversation_repo, message_repo, profile_service, hub, settings }
    }

    /// Get-or-create the conversation between an artist and a customer.
    ///
    /// The record id is derived from the participant pair, so the lookup and
    /// the conditional insert agree on a single record even when two callers
    /// race.
    pub async fn resolve(
        &self,
        artist_id: &str,
        customer_id: &str,
    ) -> Result<ConversationEntity, error::SystemError> {
        let artist_id = require_id(artist_id, "artistId")?;
        let customer_id = require_id(customer_id, "customerId")?;
        if artist_id == customer_id {
            return Err(error::SystemError::invalid_argument(
                "A conversation needs two different participants",
            ));
        }

        let id = ConversationEntity::key_for(artist_id, customer_id);

        if let Some(existing) = self.conversation_repo.find_by_id(&id).await? {
            return Ok(existing);
        }

        let created = self
            .conversation_repo
            .create_if_absent(&NewConversation {
                id,
                artist_id: artist_id.to_string(),
                customer_id: customer_id.to_string(),
            })
            .await?;

        let conversation = match created {
            Some(conversation) => conversation,
            // lost the insert race; the winner's row is visible to a new read
            None => self.conversation_repo.find_by_id(&id).await?.ok_or_else(|| {
                log::error!("Conversation {} missing after conflicting insert", id);
                error::SystemError::store_unavailable("Conversation not yet visible")
            })?,
        };

        log::info!("Conversation {} ready for artist {} and customer {}", id, artist_id, customer_id);
        Ok(conversation)
    }

    pub async fn get_by_id(
        &self,
        conversation_id: Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        self.conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))
    }

    /// Resolve the target and attach a live message feed to it.
    pub async fn open(
        &self,
        actor: Option<&Identity>,
        target: OpenTarget,
    ) -> Result<OpenConversation, error::SystemError> {
        let actor = require_identity(actor)?;

        let conversation = match target {
            OpenTarget::Artist(artist_id) => self.resolve(&artist_id, &actor.id).await?,
            OpenTarget::Existing(conversation_id) => self.get_by_id(conversation_id).await?,
        };

        let messages = message_snapshots(
            self.message_repo.clone(),
            &self.hub,
            conversation.id,
            &self.settings,
        );

        Ok(OpenConversation { conversation, messages })
    }

    /// An artist's conversations with customer display names, newest first.
    pub async fn inbox(&self, artist_id: &str) -> Result<Vec<InboxEntry>, error::SystemError> {
        let artist_id = require_id(artist_id, "artistId")?;
        load_inbox(&*self.conversation_repo, &self.profile_service, artist_id).await
    }

    /// Live version of [`Self::inbox`].
    pub fn subscribe_inbox(
        &self,
        artist_id: &str,
    ) -> Result<Subscription<InboxEntry>, error::SystemError> {
        let artist_id = require_id(artist_id, "artistId")?.to_string();

        let repo = self.conversation_repo.clone();
        let profiles = self.profile_service.clone();
        let filter_artist = artist_id.clone();

        Ok(spawn_snapshot(
            self.hub.subscribe(),
            self.settings.clone(),
            move |event| event.touches_artist(&filter_artist),
            move || {
                let repo = repo.clone();
                let profiles = profiles.clone();
                let artist_id = artist_id.clone();
                async move { load_inbox(&*repo, &profiles, &artist_id).await }
            },
        ))
    }
}

async fn load_inbox<C, P>(
    conversation_repo: &C,
    profiles: &ProfileService<P>,
    artist_id: &str,
) -> Result<Vec<InboxEntry>, error::SystemError>
where
    C: ConversationRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    let conversations = conversation_repo.find_by_artist(artist_id).await?;

    let customer_ids: Vec<String> = conversations.iter().map(|c| c.customer_id.clone()).collect();
    let names = profiles.display_names(&customer_ids).await;

    Ok(conversations
        .into_iter()
        .map(|conversation| {
            let customer_name = names
                .get(&conversation.customer_id)
                .cloned()
                .unwrap_or_else(|| conversation.customer_id.clone());
            InboxEntry { conversation, customer_name }
        })
        .collect())
}
