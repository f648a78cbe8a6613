//! Shared models and the error taxonomy of the agent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::http_client::HttpClientError;

/// SameSite policy attached to issued cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Attribute value as written into a Set-Cookie header.
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Everything produced for one login attempt: the URL to redirect the
/// browser to, plus the secrets the caller must persist as encrypted
/// cookies until the callback arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequestData {
    /// Front-channel URL for the browser redirect.
    pub request_url: String,
    /// PKCE code verifier, spent at token redemption.
    pub code_verifier: String,
    /// CSRF state parameter echoed back on the callback.
    pub state: String,
}

/// Response from a pushed authorization request.
#[derive(Debug, Clone, Deserialize)]
pub struct ParResponse {
    /// Opaque reference to the pushed request parameters.
    pub request_uri: String,
    /// Lifetime of the reference in seconds.
    pub expires_in: u64,
}

/// Tokens returned by the authorization server when a code is redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// Claims of a validated JWT.
///
/// `aud` keeps its raw JSON shape since the claim may be a string or an
/// array; claims outside the registered set land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    pub iss: Option<String>,
    pub aud: Option<serde_json::Value>,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A cookie value that could not be decrypted back into a session artifact.
///
/// Every variant means the same thing at the HTTP boundary: there is no
/// valid session and the user must authenticate again. None of them are
/// server faults.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The value is not `hex(iv):hex(ciphertext)`.
    #[error("cookie value is not in iv:ciphertext form")]
    MalformedValue,
    /// One of the halves is not valid hex.
    #[error("cookie value contains invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The IV half is not exactly one cipher block.
    #[error("cookie IV is not 16 bytes")]
    InvalidIv,
    /// The ciphertext half is empty or not block-aligned.
    #[error("cookie ciphertext is not block-aligned")]
    Misaligned,
    /// Block decryption ran but the padding is inconsistent.
    #[error("cookie padding check failed")]
    Padding,
    /// The decrypted bytes are not UTF-8.
    #[error("decrypted cookie is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// A failure while pushing the authorization request or redeeming a code.
///
/// These are retryable server-side failures. The login attempt is surfaced
/// as failed; there is never a fallback to an un-pushed request.
#[derive(Debug, Error)]
pub enum RequestCreationError {
    /// The back-channel call itself failed (connect, timeout, TLS).
    #[error("authorization server request failed: {0}")]
    Transport(#[source] HttpClientError),
    /// The authorization server answered with an unexpected status.
    #[error("authorization server returned status {0}")]
    ErrorStatus(u16),
    /// The response body was not the expected JSON document.
    #[error("authorization server response could not be parsed: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    /// The response parsed but a required field is absent.
    #[error("authorization server response is missing `{0}`")]
    MissingField(&'static str),
}

/// A JWT that failed validation.
///
/// The variant records which stage failed for logging. At the HTTP boundary
/// every variant collapses into the same generic unauthenticated response,
/// so callers never leak which check tripped.
#[derive(Debug, Error)]
pub enum TokenValidationError {
    #[error("token is not a well-formed JWT")]
    Malformed,
    #[error("token algorithm {0} is not in the allow-list")]
    DisallowedAlgorithm(String),
    #[error("token header carries no key id")]
    MissingKeyId,
    #[error("no key in the JWKS matches key id {0}")]
    UnknownKey(String),
    #[error("JWKS could not be fetched: {0}")]
    KeySetUnavailable(#[source] HttpClientError),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer is not the configured issuer")]
    InvalidIssuer,
    #[error("token audience does not include this client")]
    InvalidAudience,
    #[error("token is missing required claim {0}")]
    MissingClaim(String),
}

/// Invalid configuration detected at startup. Fatal: the process must not
/// come up half-configured.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cookie encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("PBKDF2 salt must not be empty")]
    EmptySalt,
    #[error("configuration field `{0}` must be set")]
    MissingField(&'static str),
    #[error("configuration field `{0}` is not an http(s) URL")]
    InvalidUrl(&'static str),
    #[error("allowed algorithm list must not be empty")]
    EmptyAlgorithmList,
    #[error("algorithm {0} is not a supported RSA-family algorithm")]
    UnsupportedAlgorithm(String),
}
