pub struct Env {
    pub jwt_secret: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: Option<String>,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub subscription_buffer: usize,
    pub subscription_max_retries: u32,
    pub subscription_retry_backoff_ms: u64,
    pub display_name_cache_ttl: u64,
}

/// Longest `last_message` preview kept on a conversation, in characters.
pub const PREVIEW_MAX_CHARS: usize = 120;

/// Postgres NOTIFY channel the chat triggers publish to.
pub const CHANGE_CHANNEL: &str = "chat_changes";

impl Env {
    fn new() -> Self {
        let jwt_secret = std::env::var("SECRET_KEY")
            .expect("SECRET_KEY must be set in .env file or environment variable");

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .expect("DB_MAX_CONNECTIONS must be a valid u32 integer");
        let redis_url = std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");

        let subscription_buffer = std::env::var("SUBSCRIPTION_BUFFER")
            .unwrap_or_else(|_| "16".to_string())
            .parse::<usize>()
            .expect("SUBSCRIPTION_BUFFER must be a valid usize integer");
        let subscription_max_retries = std::env::var("SUBSCRIPTION_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .expect("SUBSCRIPTION_MAX_RETRIES must be a valid u32 integer");
        let subscription_retry_backoff_ms = std::env::var("SUBSCRIPTION_RETRY_BACKOFF_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse::<u64>()
            .expect("SUBSCRIPTION_RETRY_BACKOFF_MS must be a valid u64 integer");
        let display_name_cache_ttl = std::env::var("DISPLAY_NAME_CACHE_TTL")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .expect("DISPLAY_NAME_CACHE_TTL must be a valid u64 integer");

        Env {
            jwt_secret,
            database_url,
            db_max_connections,
            redis_url,
            frontend_url,
            ip,
            port,
            subscription_buffer,
            subscription_max_retries,
            subscription_retry_backoff_ms,
            display_name_cache_ttl,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
