/// Realtime Module
///
/// Change feed and live snapshot subscriptions shared by the conversation
/// and message modules.
pub mod feed;
pub mod subscription;

pub use feed::{relay_pg_notifications, ChangeEvent, ChangeHub};
pub use subscription::{spawn_snapshot, Subscription, SubscriptionEvent, SubscriptionSettings};
