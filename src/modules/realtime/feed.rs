//! Change feed
//!
//! Every write to a conversation or message produces a [`ChangeEvent`] on the
//! [`ChangeHub`]. Subscriptions listen on the hub and reload their snapshot
//! when an event concerns them. In production the events originate from
//! Postgres triggers (`pg_notify`) relayed by [`relay_pg_notifications`].
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::error;

const RELAY_BACKOFF_MIN: Duration = Duration::from_millis(250);
const RELAY_BACKOFF_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A conversation was created or its summary changed
    Conversation { conversation_id: Uuid, artist_id: String },
    /// A message was appended to a conversation
    Message { conversation_id: Uuid },
    /// State may have changed in ways the feed could not describe; reload everything
    Resync,
}

impl ChangeEvent {
    /// Decode a NOTIFY payload. Unknown or malformed payloads become `Resync`
    /// so subscribers never miss a change because of a bad record.
    pub fn from_payload(payload: &str) -> Self {
        match serde_json::from_str::<ChangeEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Malformed change payload ({}): {}", e, payload);
                ChangeEvent::Resync
            }
        }
    }

    pub fn touches_conversation(&self, id: &Uuid) -> bool {
        match self {
            ChangeEvent::Message { conversation_id } => conversation_id == id,
            ChangeEvent::Conversation { .. } => false,
            ChangeEvent::Resync => true,
        }
    }

    pub fn touches_artist(&self, artist: &str) -> bool {
        match self {
            ChangeEvent::Conversation { artist_id, .. } => artist_id == artist,
            ChangeEvent::Message { .. } => false,
            ChangeEvent::Resync => true,
        }
    }
}

/// Fan-out point for change events. Cheap to clone.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // no receivers is fine: nobody is watching
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::trace!("Change event delivered to {} receivers", receivers);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Live listeners, including subscriptions that have not yet been dropped.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A connection that yields raw change payloads.
#[async_trait::async_trait]
pub trait NotificationSource: Send {
    /// `Ok(None)` when the connection dropped; the next call reconnects.
    async fn next_payload(&mut self) -> Result<Option<String>, error::SystemError>;
}

#[async_trait::async_trait]
impl NotificationSource for PgListener {
    async fn next_payload(&mut self) -> Result<Option<String>, error::SystemError> {
        let notification = self.try_recv().await?;
        Ok(notification.map(|n| n.payload().to_string()))
    }
}

/// Relay Postgres notifications on `channel` into `hub` until the process stops.
pub async fn relay_pg_notifications(pool: sqlx::PgPool, hub: ChangeHub, channel: &'static str) {
    let connect = move || {
        let pool = pool.clone();
        async move {
            let mut listener = PgListener::connect_with(&pool).await?;
            listener.listen(channel).await?;
            tracing::info!("Listening for store changes on channel {}", channel);
            Ok::<_, error::SystemError>(listener)
        }
    };
    relay_changes(connect, hub, RELAY_BACKOFF_MIN).await
}

/// Pump a [`NotificationSource`] into `hub`, forever.
///
/// Establishing the source is retried with exponential backoff. Every failed
/// attempt, every transport loss and every (re)connect publishes `Resync`, so
/// live snapshots reload and surface a store outage through their own loads.
pub async fn relay_changes<S, C, Fut>(mut connect: C, hub: ChangeHub, min_backoff: Duration)
where
    S: NotificationSource,
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<S, error::SystemError>>,
{
    let mut backoff = min_backoff;

    let mut source = loop {
        match connect().await {
            Ok(source) => break source,
            Err(e) => {
                tracing::error!("Change feed connect failed: {}. Retrying in {:?}", e, backoff);
                hub.publish(ChangeEvent::Resync);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RELAY_BACKOFF_MAX);
            }
        }
    };
    // changes made before the listener was up were never announced
    hub.publish(ChangeEvent::Resync);
    backoff = min_backoff;

    loop {
        match source.next_payload().await {
            Ok(Some(payload)) => {
                backoff = min_backoff;
                hub.publish(ChangeEvent::from_payload(&payload));
            }
            Ok(None) => {
                tracing::warn!("Change feed connection lost, reconnecting");
                hub.publish(ChangeEvent::Resync);
            }
            Err(e) => {
                tracing::error!("Change feed error: {}. Retrying in {:?}", e, backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RELAY_BACKOFF_MAX);
                hub.publish(ChangeEvent::Resync);
            }
        }
    }
}
