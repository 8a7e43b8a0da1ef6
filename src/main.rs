use actix_cors::Cors;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::{
    configs::{RedisCache, connect_database, run_migrations},
    constants::CHANGE_CHANNEL,
    middlewares::authentication,
    modules::{
        conversation::{repository_pg::ConversationPgRepository, service::ConversationService},
        message::{repository_pg::MessageRepositoryPg, service::MessageService},
        profile::{repository_pg::ProfileRepositoryPg, service::ProfileService},
        realtime::{ChangeHub, SubscriptionSettings, relay_pg_notifications},
        websocket::handler::websocket_handler,
    },
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
#[cfg(test)]
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

fn cors() -> Cors {
    Cors::default()
        .supports_credentials()
        .allow_any_header()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_origin(ENV.frontend_url.as_str())
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    if let Err(e) = tracing::subscriber::set_global_default(tracing_subscriber::fmt().finish()) {
        log::warn!("Tracing subscriber already set: {}", e);
    }
    log::info!("Environment variables loaded");

    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;
    run_migrations(&db_pool).await.map_err(|_| std::io::Error::other("Database migration error"))?;

    let hub = ChangeHub::new(1024);
    actix_web::rt::spawn(relay_pg_notifications(db_pool.clone(), hub.clone(), CHANGE_CHANNEL));

    let redis_cache = match ENV.redis_url.as_deref() {
        Some(url) => match RedisCache::new(url).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                log::warn!("Redis unavailable, display names will not be cached: {}", e);
                None
            }
        },
        None => None,
    };

    let settings = SubscriptionSettings {
        buffer: ENV.subscription_buffer,
        max_retries: ENV.subscription_max_retries,
        retry_backoff: Duration::from_millis(ENV.subscription_retry_backoff_ms),
    };

    let conversation_repo = Arc::new(ConversationPgRepository::new(db_pool.clone()));
    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let profile_repo = Arc::new(ProfileRepositoryPg::new(db_pool.clone()));

    let profile_service =
        ProfileService::with_dependencies(profile_repo, redis_cache, ENV.display_name_cache_ttl);
    let conversation_service = ConversationService::with_dependencies(
        conversation_repo.clone(),
        message_repo.clone(),
        profile_service,
        hub.clone(),
        settings.clone(),
    );
    let message_service =
        MessageService::with_dependencies(message_repo, conversation_repo, hub, settings);

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(conversation_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .service(health_check)
            .route("/ws", web::get().to(websocket_handler))
            .service(
                web::scope("/api")
                    .wrap(from_fn(authentication))
                    .configure(modules::conversation::route::configure)
                    .configure(modules::message::route::configure),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
