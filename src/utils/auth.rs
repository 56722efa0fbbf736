use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::models::Session;

/// Session cookie payload. The signature proves we issued it; the `sid`
/// still has to resolve to a live row in the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub sid: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(session: &Session, issued_at: DateTime<Utc>) -> Self {
        Self {
            sub: session.user_id.to_string(),
            sid: session.id,
            exp: session.expires_at.timestamp(),
            iat: issued_at.timestamp(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

pub fn create_token(session: &Session, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(session, Utc::now());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
