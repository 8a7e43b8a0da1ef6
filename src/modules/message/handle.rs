use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_identity,
    modules::{
        conversation::repository_pg::ConversationPgRepository,
        message::{
            model::SendMessageBody, repository_pg::MessageRepositoryPg, schema::MessageEntity,
            service::MessageService,
        },
    },
    utils::ValidatedJson,
};

pub type MessageSvc = MessageService<MessageRepositoryPg, ConversationPgRepository>;

#[get("/{conversation_id}")]
pub async fn get_messages(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<Vec<MessageEntity>>, error::Error> {
    get_identity(&req)?;
    let messages = message_service.get_messages(*conversation_id).await?;

    Ok(success::Success::ok(Some(messages)).message("Messages retrieved successfully"))
}

#[post("/{conversation_id}")]
pub async fn send_message(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    body: ValidatedJson<SendMessageBody>,
    req: HttpRequest,
) -> Result<success::Success<MessageEntity>, error::Error> {
    let identity = get_identity(&req)?;
    let message = message_service.send(*conversation_id, &identity.id, &body.0.text).await?;

    Ok(success::Success::created(Some(message)).message("Message sent successfully"))
}
