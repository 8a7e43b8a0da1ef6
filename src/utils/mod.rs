use actix_web::{web, FromRequest};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::error;

/// Claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Claims {
    pub fn decode(token: &str, secret: &[u8]) -> Result<Self, error::SystemError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        let token_data = decode::<Self>(token, &DecodingKey::from_secret(secret), &validation)?;
        Ok(token_data.claims)
    }

    #[cfg(test)]
    pub fn new(sub: &str, exp: u64) -> Self {
        let now = chrono::Utc::now().timestamp() as u64;
        Claims { sub: sub.to_string(), iat: now, exp: now + exp, email: None, name: None }
    }

    #[cfg(test)]
    pub fn encode(&self, secret: &[u8]) -> Result<String, error::SystemError> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let token = encode(&Header::new(Algorithm::HS256), self, &EncodingKey::from_secret(secret))?;
        Ok(token)
    }
}

/// The live actor behind a request or websocket session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Identity {
    /// Identity for a verified token. Tokens without a subject carry no identity.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.sub.trim().is_empty() {
            return None;
        }
        Some(Identity { id: claims.sub, email: claims.email, display_name: claims.name })
    }
}

/// Require a live identity for an operation.
pub fn require_identity(actor: Option<&Identity>) -> Result<&Identity, error::SystemError> {
    actor.ok_or(error::SystemError::NotAuthenticated)
}

/// Participant ids are opaque, but never blank.
pub fn require_id<'a>(value: &'a str, field: &'static str) -> Result<&'a str, error::SystemError> {
    if value.trim().is_empty() {
        return Err(error::SystemError::invalid_argument(format!("{field} must not be empty")));
    }
    Ok(value)
}

pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest for ValidatedJson<T>
where
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Error = error::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let fut = web::Json::<T>::from_request(req, payload);

        Box::pin(async move {
            let json = fut.await.map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            let model = json.into_inner();
            model.validate().map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            Ok(ValidatedJson(model))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_claims_roundtrip_through_token() {
        let mut claims = Claims::new("C1", 900);
        claims.email = Some("c1@example.com".to_string());
        let token = claims.encode(SECRET).unwrap();

        let decoded = Claims::decode(&token, SECRET).unwrap();
        let identity = Identity::from_claims(decoded).unwrap();
        assert_eq!(identity.id, "C1");
        assert_eq!(identity.email.as_deref(), Some("c1@example.com"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = Claims::new("C1", 900).encode(SECRET).unwrap();
        assert!(Claims::decode(&token, b"other-secret").is_err());
    }

    #[test]
    fn test_blank_subject_has_no_identity() {
        assert!(Identity::from_claims(Claims::new("  ", 900)).is_none());
    }

    #[test]
    fn test_require_identity() {
        assert!(matches!(require_identity(None), Err(error::SystemError::NotAuthenticated)));
    }

    #[test]
    fn test_require_id_rejects_blank() {
        assert!(matches!(require_id("", "artistId"), Err(error::SystemError::InvalidArgument(_))));
        assert!(matches!(require_id(" \t", "artistId"), Err(error::SystemError::InvalidArgument(_))));
        assert_eq!(require_id("A1", "artistId").unwrap(), "A1");
    }
}
