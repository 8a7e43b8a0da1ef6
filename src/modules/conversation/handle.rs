use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_identity,
    modules::{
        conversation::{
            model::{InboxEntry, OpenConversationBody},
            repository_pg::ConversationPgRepository,
            schema::ConversationEntity,
            service::ConversationService,
        },
        message::repository_pg::MessageRepositoryPg,
        profile::repository_pg::ProfileRepositoryPg,
    },
    utils::ValidatedJson,
};

pub type ConversationSvc =
    ConversationService<ConversationPgRepository, MessageRepositoryPg, ProfileRepositoryPg>;

/// Start or resume a chat with an artist. The caller is the customer.
#[post("/")]
pub async fn open_conversation(
    conversation_service: web::Data<ConversationSvc>,
    body: ValidatedJson<OpenConversationBody>,
    req: HttpRequest,
) -> Result<success::Success<ConversationEntity>, error::Error> {
    let identity = get_identity(&req)?;
    let conversation = conversation_service.resolve(&body.0.artist_id, &identity.id).await?;

    Ok(success::Success::ok(Some(conversation)).message("Conversation ready"))
}

#[get("/inbox")]
pub async fn get_inbox(
    conversation_service: web::Data<ConversationSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<InboxEntry>>, error::Error> {
    let identity = get_identity(&req)?;
    let inbox = conversation_service.inbox(&identity.id).await?;

    Ok(success::Success::ok(Some(inbox)).message("Inbox retrieved successfully"))
}

#[get("/{conversation_id}")]
pub async fn get_conversation(
    conversation_service: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ConversationEntity>, error::Error> {
    get_identity(&req)?;
    let conversation = conversation_service.get_by_id(*conversation_id).await?;

    Ok(success::Success::ok(Some(conversation)))
}
