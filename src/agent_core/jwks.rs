//! JWKS caching for remote JWT validation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use super::http_client::{BackchannelHttpClient, HttpMethod, HttpRequest};
use super::types::TokenValidationError;

/// A key as represented in a JWKS document. Only RSA keys are cached;
/// other key types deserialize and are skipped.
#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    #[serde(rename = "use")]
    use_: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// A JWKS response containing multiple keys.
#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

/// Cache of the authorization server's signing keys by `kid`.
///
/// Construction never touches the network; the first lookup fetches the
/// document, and a refetch happens when the TTL lapses or an unknown
/// `kid` appears (key rotation). Concurrent misses may fetch redundantly,
/// which is acceptable; serving a stale key as valid is not.
#[derive(Clone)]
pub struct JwksCache<C: BackchannelHttpClient> {
    client: C,
    uri: String,
    keys: Arc<DashMap<String, (String, String)>>,
    ttl: Duration,
    request_timeout: Duration,
    last_refresh: Arc<RwLock<Option<Instant>>>,
}

impl<C: BackchannelHttpClient> JwksCache<C> {
    /// Create a cache bound to a JWKS endpoint.
    pub fn new(
        client: C,
        uri: impl Into<String>,
        ttl: Duration,
        request_timeout: Duration,
    ) -> Self {
        JwksCache {
            client,
            uri: uri.into(),
            keys: Arc::new(DashMap::new()),
            ttl,
            request_timeout,
            last_refresh: Arc::new(RwLock::new(None)),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_and_store(&self) -> Result<(), TokenValidationError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.uri.clone(),
            headers: Vec::new(),
            body: None,
            timeout: Some(self.request_timeout),
        };
        let response = self
            .client
            .execute(request)
            .await
            .map_err(TokenValidationError::KeySetUnavailable)?;
        if response.status != 200 {
            return Err(TokenValidationError::KeySetUnavailable(
                format!("unexpected status {}", response.status).into(),
            ));
        }
        let jwks: JwkSet = serde_json::from_slice(&response.body)
            .map_err(|err| TokenValidationError::KeySetUnavailable(Box::new(err)))?;

        self.keys.clear();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) {
                self.keys.insert(kid, (n, e));
            }
        }
        let mut last_refresh = self.last_refresh.write().await;
        *last_refresh = Some(Instant::now());
        Ok(())
    }

    /// Get the DecodingKey for a JWK key id, refreshing the cache when it
    /// is stale or the key id is unknown.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, kid: &str) -> Result<DecodingKey, TokenValidationError> {
        if self.needs_refresh(kid).await {
            self.fetch_and_store().await?;
        }
        match self.keys.get(kid) {
            Some(entry) => {
                let (n, e) = entry.value();
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| TokenValidationError::KeySetUnavailable(Box::new(err)))
            }
            None => {
                warn!(kid = %kid, "key id not present after JWKS refresh");
                Err(TokenValidationError::UnknownKey(kid.to_string()))
            }
        }
    }

    async fn needs_refresh(&self, kid: &str) -> bool {
        if !self.keys.contains_key(kid) {
            return true;
        }
        match *self.last_refresh.read().await {
            Some(refreshed) => refreshed.elapsed() > self.ttl,
            None => true,
        }
    }
}
