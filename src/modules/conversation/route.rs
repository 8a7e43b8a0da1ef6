use crate::modules::conversation::handle::*;
use actix_web::web::{scope, ServiceConfig};

pub fn configure(cfg: &mut ServiceConfig) {
    // /inbox must be registered before /{conversation_id}
    cfg.service(
        scope("/conversations")
            .service(open_conversation)
            .service(get_inbox)
            .service(get_conversation),
    );
}
