/// WebSocket HTTP Handler
///
/// Upgrades the request and pumps frames in both directions:
/// - Inbound:  client → socket → parse ClientMessage → session actor
/// - Outbound: session actor → mpsc channel → socket → client
use actix::Actor;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use tokio::sync::mpsc;

use super::message::{ClientMessage, ServerMessage};
use super::session::{Disconnect, WebSocketSession, OUTBOUND_FRAMES};
use crate::modules::{conversation::handle::ConversationSvc, message::handle::MessageSvc};

/// Endpoint: GET /ws
///
/// The connection starts anonymous; the client sends an `auth` frame first.
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    conversation_service: web::Data<ConversationSvc>,
    message_service: web::Data<MessageSvc>,
) -> Result<HttpResponse, Error> {
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_FRAMES);
    let parse_errors = tx.clone();

    let addr = WebSocketSession::new(tx, conversation_service, message_service).start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(client_msg) => addr.do_send(client_msg),
                                Err(e) => {
                                    tracing::warn!(
                                        "Cannot parse client frame: {} - raw: {}",
                                        e,
                                        text.chars().take(100).collect::<String>()
                                    );
                                    let frame = ServerMessage::Error {
                                        message: format!("Bad Request: {}", e),
                                    };
                                    if let Ok(json) = serde_json::to_string(&frame) {
                                        let _ = parse_errors.try_send(json);
                                    }
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Cannot send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {}

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary frames are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Cannot write to WebSocket client");
                        break;
                    }
                }
            }
        }

        // stopping the actor cancels every watch it holds
        addr.do_send(Disconnect);
        let _ = ws_session.close(None).await;
        tracing::debug!("WebSocket message loop ended");
    });

    tracing::info!("WebSocket connection established");
    Ok(response)
}
