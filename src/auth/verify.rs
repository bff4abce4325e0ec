use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, Validation};

use super::claims::Claims;
use super::jwks::JwksKeys;

/// Token verification capability. Injected so the rest of identity resolution
/// can be exercised without a live issuer.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims>;
}

/// Production verifier: RS256 signature against the issuer's JWKS, with
/// issuer, audience and expiry validation.
pub struct JwksVerifier {
    keys: JwksKeys,
    issuer: String,
    audience: String,
}

impl JwksVerifier {
    pub fn new(http: reqwest::Client, issuer: String, audience: String, ttl: Duration) -> Self {
        let keys = JwksKeys::new(http, &issuer, ttl);
        Self {
            keys,
            issuer,
            audience,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let header = jsonwebtoken::decode_header(token).context("malformed token header")?;
        let kid = header.kid.context("token header missing kid")?;
        let key = self.keys.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)
            .context("token verification failed")?;

        Ok(data.claims)
    }
}
