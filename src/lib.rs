//! Server-side OAuth2/OIDC token handler for browser-facing backends:
//! encrypted cookie sessions, PKCE/PAR login flows and JWKS-backed JWT
//! validation.

pub mod agent_core;

pub use agent_core::agent::OAuthAgent;
pub use agent_core::authorization::{
    AuthorizationRequestHandler, AuthorizationServerClient, ParAuthorizationRequestHandler,
    PlainAuthorizationRequestHandler,
};
pub use agent_core::config::AgentConfiguration;
pub use agent_core::cookie::{CookieEncrypter, CookieName, CookieSerializeOptions};
pub use agent_core::crypto::KeyDerivation;
pub use agent_core::http_client::{
    BackchannelHttpClient, HttpClientError, HttpMethod, HttpRequest, HttpResponse,
    InMemoryHttpClient,
};
pub use agent_core::jwks::JwksCache;
pub use agent_core::pkce::{code_challenge, new_code_verifier, new_state};
pub use agent_core::types::{
    AuthorizationRequestData, ConfigurationError, DecryptionError, ParResponse,
    RequestCreationError, SameSite, TokenClaims, TokenResponse, TokenValidationError,
};
pub use agent_core::validator::TokenValidator;

#[cfg(feature = "reqwest-client")]
pub use agent_core::reqwest_client::ReqwestHttpClient;
