use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;

/// Cached view of the issuer's published key set.
///
/// Keys are fetched once and reused across requests until the TTL lapses; a
/// kid that is not in the cache forces a single refresh before the lookup
/// fails, which covers issuer-side key rotation.
pub struct JwksKeys {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    cached: RwLock<Option<Cached>>,
}

struct Cached {
    fetched_at: Instant,
    keys: HashMap<String, DecodingKey>,
}

impl JwksKeys {
    pub fn new(http: reqwest::Client, issuer: &str, ttl: Duration) -> Self {
        let url = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
        Self {
            http,
            url,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// The decoding key for `kid`, refreshing the set at most once.
    pub async fn decoding_key(&self, kid: &str) -> anyhow::Result<DecodingKey> {
        if let Some(key) = self.lookup(kid).await {
            return Ok(key);
        }

        self.refresh().await?;

        self.lookup(kid)
            .await
            .with_context(|| format!("no key with kid {kid} in the issuer key set"))
    }

    async fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.cached.read().await;
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() > self.ttl {
            return None;
        }
        cached.keys.get(kid).cloned()
    }

    async fn refresh(&self) -> anyhow::Result<()> {
        let set: JwkSet = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("failed to fetch jwks")?
            .error_for_status()
            .context("jwks endpoint returned an error status")?
            .json()
            .await
            .context("failed to parse jwks")?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => {
                    tracing::warn!(kid = %kid, error = %err, "skipping unusable jwk");
                }
            }
        }

        tracing::debug!(count = keys.len(), url = %self.url, "refreshed jwks cache");

        let mut guard = self.cached.write().await;
        *guard = Some(Cached {
            fetched_at: Instant::now(),
            keys,
        });

        Ok(())
    }
}
