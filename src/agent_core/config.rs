//! Configuration contract filled in by the embedding application's loader.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use super::cookie::CookieSerializeOptions;
use super::crypto::{self, KeyDerivation};
use super::types::{ConfigurationError, SameSite};

/// Everything the agent needs for one protected application.
///
/// Loading is the embedding application's job; this type only defines the
/// shape and validates it at startup. `trusted_web_origins` is carried for
/// the CORS layer sitting in front of the agent.
#[derive(Clone, Deserialize)]
pub struct AgentConfiguration {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub par_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
    pub issuer: String,
    /// Expected `aud` claim; the client id when absent.
    #[serde(default)]
    pub audience: Option<String>,
    pub jwks_uri: String,
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,
    #[serde(default = "default_clock_skew")]
    pub allowed_clock_skew_seconds: u64,
    #[serde(default = "default_jwks_ttl")]
    pub jwks_cache_ttl_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    pub enc_key: String,
    #[serde(default)]
    pub key_derivation: KeyDerivation,
    pub cookie_name_prefix: String,
    pub cookie_domain: String,
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
    #[serde(default = "default_same_site")]
    pub cookie_same_site: Option<SameSite>,
    #[serde(default)]
    pub trusted_web_origins: Vec<String>,
}

fn default_allowed_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_clock_skew() -> u64 {
    30
}

fn default_jwks_ttl() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    10
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> Option<SameSite> {
    Some(SameSite::Strict)
}

impl AgentConfiguration {
    /// Check the contract. Runs once at startup; the process must not come
    /// up on an error.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let required = [
            ("client_id", &self.client_id),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("par_endpoint", &self.par_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("redirect_uri", &self.redirect_uri),
            ("issuer", &self.issuer),
            ("jwks_uri", &self.jwks_uri),
            ("enc_key", &self.enc_key),
            ("cookie_name_prefix", &self.cookie_name_prefix),
            ("cookie_domain", &self.cookie_domain),
            ("cookie_path", &self.cookie_path),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigurationError::MissingField(field));
            }
        }

        let urls = [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("par_endpoint", &self.par_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("redirect_uri", &self.redirect_uri),
            ("jwks_uri", &self.jwks_uri),
        ];
        for (field, url) in urls {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ConfigurationError::InvalidUrl(field));
            }
        }

        if self.allowed_algorithms.is_empty() {
            return Err(ConfigurationError::EmptyAlgorithmList);
        }
        // The validator's key cache serves only RSA keys.
        for name in &self.allowed_algorithms {
            let algorithm = Algorithm::from_str(name)
                .map_err(|_| ConfigurationError::UnsupportedAlgorithm(name.clone()))?;
            if !matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) {
                return Err(ConfigurationError::UnsupportedAlgorithm(name.clone()));
            }
        }

        crypto::derive_cookie_key(&self.enc_key, &self.key_derivation)?;
        Ok(())
    }

    /// Default serialization options for issued cookies.
    pub fn cookie_serialize_options(&self) -> CookieSerializeOptions {
        CookieSerializeOptions {
            domain: self.cookie_domain.clone(),
            path: self.cookie_path.clone(),
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
            expires_in_seconds: None,
        }
    }
}

// Secrets stay out of logs; everything else prints normally.
impl fmt::Debug for AgentConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfiguration")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_deref().map(|_| "<redacted>"))
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("par_endpoint", &self.par_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jwks_uri", &self.jwks_uri)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("allowed_clock_skew_seconds", &self.allowed_clock_skew_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("enc_key", &"<redacted>")
            .field("key_derivation", &self.key_derivation)
            .field("cookie_name_prefix", &self.cookie_name_prefix)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("trusted_web_origins", &self.trusted_web_origins)
            .finish()
    }
}
