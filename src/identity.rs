//! Verification of ID tokens issued by the external identity provider.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const KEY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Claims we trust once a token has passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Option<String>,
    /// Whether the provider has confirmed the holder owns `email`.
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("malformed identity token: {0}")]
    Malformed(String),
    #[error("identity token failed verification: {0}")]
    Rejected(String),
    #[error("identity provider is not configured")]
    NotConfigured,
    #[error("failed to fetch identity provider keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Used when no Firebase project is configured; every token is refused.
#[derive(Debug, Default)]
pub struct DisabledVerifier;

#[async_trait]
impl IdentityVerifier for DisabledVerifier {
    async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, IdentityError> {
        Err(IdentityError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Checks Firebase ID tokens: RS256 signature against Google's published key
/// set, audience = project id, issuer = `https://securetoken.google.com/<project>`.
pub struct FirebaseVerifier {
    project_id: String,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            client: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn keys(&self, force_refresh: bool) -> Result<Arc<JwkSet>, IdentityError> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < KEY_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys: JwkSet = self
            .client
            .get(FIREBASE_JWKS_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let keys = Arc::new(keys);

        log::debug!("Refreshed {} identity provider signing keys", keys.keys.len());
        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(token).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Malformed("missing key id".to_string()))?;

        let mut keys = self.keys(false).await?;
        if keys.find(&kid).is_none() {
            // keys rotate; retry once with a fresh set
            keys = self.keys(true).await?;
        }
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| IdentityError::Rejected(format!("unknown key id {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| IdentityError::Rejected(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::Rejected(e.to_string()))?
            .claims;

        if claims.sub.is_empty() {
            return Err(IdentityError::Rejected("empty subject".to_string()));
        }

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email.filter(|email| !email.is_empty()),
            email_verified: claims.email_verified,
            name: claims.name.filter(|name| !name.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let verifier = FirebaseVerifier::new("demo-project");
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, IdentityError::Malformed(_)));
    }

    #[tokio::test]
    async fn hs256_token_is_rejected_before_key_lookup() {
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &serde_json::json!({ "sub": "abc", "exp": 4_000_000_000i64 }),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let verifier = FirebaseVerifier::new("demo-project");
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn disabled_verifier_refuses_everything() {
        let err = DisabledVerifier.verify("anything").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured));
    }
}
