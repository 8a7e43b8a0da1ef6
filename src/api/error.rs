use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use deadpool_redis::{redis::RedisError, CreatePoolError, PoolError};
use std::borrow::Cow;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Unauthorized: {0}")]
    Unauthorized(Cow<'static, str>),
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(Cow<'static, str>),
    #[error("Internal Server Error")]
    InternalServer,
}

#[derive(serde::Serialize)]
pub struct ErrorBody {
    pub message: Cow<'static, str>,
}

impl Error {
    pub fn unauthorized(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Unauthorized(msg.into())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match *self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InternalServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());

        match self {
            // Has Message
            Error::BadRequest(msg)
            | Error::Unauthorized(msg)
            | Error::NotFound(msg)
            | Error::ServiceUnavailable(msg) => res.json(ErrorBody { message: msg.clone() }),
            // No Message
            Error::InternalServer => {
                res.json(ErrorBody { message: "Internal Server Error".into() })
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SystemError {
    // identity provider token errors
    #[error("JWT Error")]
    JwtError(#[from] jsonwebtoken::errors::Error),
    // sqlx errors that are not transport failures
    #[error("Database Error : {0}")]
    DatabaseError(Cow<'static, str>),
    // serde errors
    #[error("JSON Serialization/Deserialization Error")]
    JsonError(#[from] serde_json::Error),
    // redis errors
    #[error(transparent)]
    PoolInit(#[from] CreatePoolError),
    #[error("Redis pool error: {0}")]
    PoolGet(#[from] PoolError),
    #[error("Redis error")]
    RedisError(#[from] RedisError),
    // Conversation service taxonomy
    #[error("Invalid Argument: {0}")]
    InvalidArgument(Cow<'static, str>),
    #[error("Not Authenticated")]
    NotAuthenticated,
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Store Unavailable: {0}")]
    StoreUnavailable(Cow<'static, str>),
    #[error("Internal System Error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl From<SystemError> for Error {
    fn from(value: SystemError) -> Self {
        match value {
            SystemError::InvalidArgument(msg) => Error::BadRequest(msg),
            SystemError::NotAuthenticated => Error::Unauthorized("Sign in to continue".into()),
            SystemError::NotFound(msg) => Error::NotFound(msg),
            SystemError::StoreUnavailable(msg) => Error::ServiceUnavailable(msg),
            _ => {
                log::error!("Internal Server Error: {:?}", value);
                Error::InternalServer
            }
        }
    }
}

impl From<sqlx::Error> for SystemError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                log::warn!("Store unreachable: {:?}", err);
                SystemError::StoreUnavailable(err.to_string().into())
            }
            sqlx::Error::RowNotFound => SystemError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_err) => {
                log::error!("Unhandled DB error: {:?}", db_err);
                SystemError::DatabaseError(db_err.message().to_string().into())
            }
            _ => {
                log::error!("{:?}", err);
                SystemError::InternalError(Box::new(err))
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for SystemError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        log::error!("Migration failed: {:?}", err);
        SystemError::InternalError(Box::new(err))
    }
}

impl SystemError {
    pub fn invalid_argument(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Transient failures the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, SystemError::StoreUnavailable(_))
    }
}
