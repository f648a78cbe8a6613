//! Remote-JWKS-backed JWT validation.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{instrument, warn};

use super::config::AgentConfiguration;
use super::http_client::BackchannelHttpClient;
use super::jwks::JwksCache;
use super::types::{ConfigurationError, TokenClaims, TokenValidationError};

/// Validates JWTs issued by the configured authorization server.
///
/// Checks run in a fixed order: algorithm allow-list, key resolution by
/// `kid`, signature, then `exp`/`iss`/`aud`. The first failure wins.
/// Callers collapse every failure into one generic unauthenticated
/// response at the HTTP boundary.
#[derive(Clone)]
pub struct TokenValidator<C: BackchannelHttpClient> {
    jwks: JwksCache<C>,
    issuer: String,
    audience: String,
    allowed_algorithms: Vec<Algorithm>,
    clock_skew_seconds: u64,
}

impl<C: BackchannelHttpClient> TokenValidator<C> {
    /// Fix the verification context from configuration. The allow-list
    /// is constrained to RSA-family algorithms (RS*/PS*): the key cache
    /// serves RSA JWKS keys, and a validation list mixing key families
    /// fails every decode against such a key.
    pub fn new(config: &AgentConfiguration, http_client: C) -> Result<Self, ConfigurationError> {
        if config.allowed_algorithms.is_empty() {
            return Err(ConfigurationError::EmptyAlgorithmList);
        }
        let mut allowed_algorithms = Vec::with_capacity(config.allowed_algorithms.len());
        for name in &config.allowed_algorithms {
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
            allowed_algorithms.push(algorithm);
        }

        let jwks = JwksCache::new(
            http_client,
            config.jwks_uri.clone(),
            Duration::from_secs(config.jwks_cache_ttl_seconds),
            Duration::from_secs(config.request_timeout_seconds),
        );
        Ok(TokenValidator {
            jwks,
            issuer: config.issuer.clone(),
            audience: config.audience.clone().unwrap_or_else(|| config.client_id.clone()),
            allowed_algorithms,
            clock_skew_seconds: config.allowed_clock_skew_seconds,
        })
    }

    /// Validate a compact JWT and return its claims.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, TokenValidationError> {
        let header = decode_header(token).map_err(|_| TokenValidationError::Malformed)?;
        if !self.allowed_algorithms.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "token signed with disallowed algorithm");
            return Err(TokenValidationError::DisallowedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header.kid.ok_or(TokenValidationError::MissingKeyId)?;
        let key = self.jwks.get(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = self.allowed_algorithms.clone();
        validation.leeway = self.clock_skew_seconds;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<TokenClaims>(token, &key, &validation).map_err(|err| {
            warn!(error = %err, "JWT rejected");
            map_jwt_error(err)
        })?;
        Ok(data.claims)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenValidationError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenValidationError::Expired,
        ErrorKind::InvalidIssuer => TokenValidationError::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenValidationError::InvalidAudience,
        ErrorKind::MissingRequiredClaim(claim) => {
            TokenValidationError::MissingClaim(claim.clone())
        }
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenValidationError::Malformed,
        // InvalidSignature, InvalidAlgorithm (key/alg family mismatch) and
        // anything else verification-shaped.
        _ => TokenValidationError::InvalidSignature,
    }
}
