/// WebSocket Session Actor
///
/// One actor per connection. It owns the connection's identity and its live
/// watches; every watch is a future spawned on the actor context, so closing
/// a watch, replacing it, or stopping the actor drops the underlying
/// subscription.
use actix::prelude::*;
use actix_web::web;
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::{
    model::{OpenConversation, OpenTarget},
    repository::ConversationRepository,
    service::ConversationService,
};
use crate::modules::message::{repository::MessageRepository, service::MessageService};
use crate::modules::profile::repository::ProfileRepository;
use crate::modules::realtime::{Subscription, SubscriptionEvent};
use crate::utils::{Claims, Identity};
use crate::ENV;

use super::message::{ClientMessage, ServerMessage, WatchKey};

/// Frames a session may queue ahead of the socket writer. Watches wait for
/// room, so a slow client slows its own subscriptions down.
pub const OUTBOUND_FRAMES: usize = 64;

pub struct WebSocketSession<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub id: Uuid,

    /// Set after a successful `auth` frame
    pub identity: Option<Identity>,

    /// Outbound JSON frames (bridged to the socket by handler.rs)
    pub tx: mpsc::Sender<String>,

    conversation_service: web::Data<ConversationService<C, M, P>>,
    message_service: web::Data<MessageService<M, C>>,

    watches: HashMap<WatchKey, SpawnHandle>,
}

impl<C, M, P> WebSocketSession<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub fn new(
        tx: mpsc::Sender<String>,
        conversation_service: web::Data<ConversationService<C, M, P>>,
        message_service: web::Data<MessageService<M, C>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity: None,
            tx,
            conversation_service,
            message_service,
            watches: HashMap::new(),
        }
    }

    /// Queue a direct reply. Dropped with a warning when the client is
    /// `OUTBOUND_FRAMES` behind; live snapshots are never dropped this way.
    fn send_to_client(&self, msg: &ServerMessage) {
        let Some(json) = encode_frame(msg, self.id) else {
            return;
        };
        match self.tx.try_send(json) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Session {} outbound queue full, reply dropped", self.id);
            }
        }
    }

    fn send_error(&self, err: error::SystemError) {
        tracing::debug!("Session {} request failed: {}", self.id, err);
        self.send_to_client(&ServerMessage::Error { message: client_message(err) });
    }

    fn require_auth(&self) -> Option<Identity> {
        if self.identity.is_none() {
            self.send_error(error::SystemError::NotAuthenticated);
        }
        self.identity.clone()
    }

    fn handle_client_message(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        match msg {
            ClientMessage::Auth { token } => self.handle_auth(&token),

            ClientMessage::OpenConversation { artist_id, conversation_id } => {
                let target = match (artist_id, conversation_id) {
                    (Some(artist_id), None) => OpenTarget::Artist(artist_id),
                    (None, Some(conversation_id)) => OpenTarget::Existing(conversation_id),
                    _ => {
                        self.send_error(error::SystemError::invalid_argument(
                            "Provide either artistId or conversationId",
                        ));
                        return;
                    }
                };
                self.handle_open_conversation(target, ctx);
            }

            ClientMessage::CloseConversation { conversation_id } => {
                self.unwatch(WatchKey::Conversation { conversation_id }, ctx);
            }

            ClientMessage::SendMessage { conversation_id, text } => {
                self.handle_send_message(conversation_id, text, ctx);
            }

            ClientMessage::WatchInbox => self.handle_watch_inbox(ctx),

            ClientMessage::UnwatchInbox => self.unwatch(WatchKey::Inbox, ctx),

            ClientMessage::Ping => self.send_to_client(&ServerMessage::Pong),
        }
    }

    fn handle_auth(&mut self, token: &str) {
        if self.identity.is_some() {
            self.send_error(error::SystemError::invalid_argument("Session already authenticated"));
            return;
        }

        let identity = Claims::decode(token, ENV.jwt_secret.as_ref())
            .ok()
            .and_then(Identity::from_claims);

        let Some(identity) = identity else {
            tracing::warn!("Token verification failed on session {}", self.id);
            self.send_to_client(&ServerMessage::AuthFailed {
                reason: "Token Invalid or Expired".to_string(),
            });
            return;
        };

        tracing::info!("User {} authenticated on session {}", identity.id, self.id);
        self.send_to_client(&ServerMessage::AuthSuccess { user_id: identity.id.clone() });
        self.identity = Some(identity);
    }

    fn handle_open_conversation(&mut self, target: OpenTarget, ctx: &mut Context<Self>) {
        let service = self.conversation_service.clone();
        let actor = self.identity.clone();

        ctx.spawn(
            async move { service.open(actor.as_ref(), target).await }.into_actor(self).map(
                |result, act, ctx| match result {
                    Ok(OpenConversation { conversation, messages }) => {
                        let conversation_id = conversation.id;
                        act.send_to_client(&ServerMessage::ConversationOpened { conversation });
                        act.watch(
                            WatchKey::Conversation { conversation_id },
                            messages,
                            move |messages| ServerMessage::MessagesSnapshot {
                                conversation_id,
                                messages,
                            },
                            ctx,
                        );
                    }
                    Err(e) => act.send_error(e),
                },
            ),
        );
    }

    fn handle_send_message(&self, conversation_id: Uuid, text: String, ctx: &mut Context<Self>) {
        let Some(identity) = self.require_auth() else {
            return;
        };

        let service = self.message_service.clone();
        let tx = self.tx.clone();
        let session_id = self.id;

        ctx.spawn(
            async move {
                let frame = match service.send(conversation_id, &identity.id, &text).await {
                    Ok(message) => ServerMessage::MessageSent { message },
                    Err(e) => {
                        tracing::warn!(
                            "Send failed (session {}, conversation {}): {}",
                            session_id,
                            conversation_id,
                            e
                        );
                        ServerMessage::Error { message: client_message(e) }
                    }
                };
                send_frame(&tx, &frame, session_id).await;
            }
            .into_actor(self),
        );
    }

    fn handle_watch_inbox(&mut self, ctx: &mut Context<Self>) {
        let Some(identity) = self.require_auth() else {
            return;
        };

        match self.conversation_service.subscribe_inbox(&identity.id) {
            Ok(subscription) => self.watch(
                WatchKey::Inbox,
                subscription,
                |conversations| ServerMessage::InboxSnapshot { conversations },
                ctx,
            ),
            Err(e) => self.send_error(e),
        }
    }

    /// Forward a subscription to the client under `key`, replacing any
    /// earlier watch with the same key.
    fn watch<T, F>(
        &mut self,
        key: WatchKey,
        mut subscription: Subscription<T>,
        to_frame: F,
        ctx: &mut Context<Self>,
    ) where
        T: 'static,
        F: Fn(Vec<T>) -> ServerMessage + 'static,
    {
        self.unwatch(key, ctx);

        let tx = self.tx.clone();
        let session_id = self.id;

        let handle = ctx.spawn(
            async move {
                while let Some(event) = subscription.next().await {
                    let frame = match event {
                        SubscriptionEvent::Snapshot(items) => to_frame(items),
                        SubscriptionEvent::Failed(e) => {
                            tracing::warn!("Watch {:?} failed on session {}: {}", key, session_id, e);
                            ServerMessage::SubscriptionFailed {
                                watch: key,
                                message: client_message(e),
                            }
                        }
                    };
                    if !send_frame(&tx, &frame, session_id).await {
                        break;
                    }
                }
            }
            .into_actor(self),
        );

        self.watches.insert(key, handle);
        tracing::debug!("Session {} watching {:?}", self.id, key);
    }

    fn unwatch(&mut self, key: WatchKey, ctx: &mut Context<Self>) {
        if let Some(handle) = self.watches.remove(&key) {
            ctx.cancel_future(handle);
            tracing::debug!("Session {} stopped watching {:?}", self.id, key);
        }
    }
}

fn encode_frame(msg: &ServerMessage, session_id: Uuid) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Cannot serialize ServerMessage (session {}): {}", session_id, e);
            None
        }
    }
}

/// Queue a frame, waiting for room. Returns false once the client is gone.
async fn send_frame(tx: &mpsc::Sender<String>, msg: &ServerMessage, session_id: Uuid) -> bool {
    match encode_frame(msg, session_id) {
        Some(json) => tx.send(json).await.is_ok(),
        None => true,
    }
}

fn client_message(err: error::SystemError) -> String {
    error::Error::from(err).to_string()
}

impl<C, M, P> Actor for WebSocketSession<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session started: {}", self.id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // spawned watches are dropped with the context
        tracing::debug!("WebSocket session stopped: {} ({} watches)", self.id, self.watches.len());
    }
}

impl Message for ClientMessage {
    type Result = ();
}

/// The socket is gone; stop the actor and everything it watches.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect;

impl<C, M, P> Handler<Disconnect> for WebSocketSession<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    type Result = ();

    fn handle(&mut self, _msg: Disconnect, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}

impl<C, M, P> Handler<ClientMessage> for WebSocketSession<C, M, P>
where
    C: ConversationRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    type Result = ();

    fn handle(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        self.handle_client_message(msg, ctx);
    }
}
