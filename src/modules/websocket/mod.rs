/// WebSocket Module
///
/// Live channel for the chat UI:
///
/// - Frame protocol (ClientMessage & ServerMessage)
/// - Session actor (one per connection, owns the connection's watches)
/// - HTTP handler (upgrade and socket pump)
pub mod handler;
pub mod message;
pub mod session;
