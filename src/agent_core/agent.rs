//! Process-scoped assembly of the agent's collaborators.

use super::authorization::{
    AuthorizationRequestHandler, AuthorizationServerClient, ParAuthorizationRequestHandler,
};
use super::config::AgentConfiguration;
use super::cookie::{CookieEncrypter, CookieName};
use super::http_client::BackchannelHttpClient;
use super::types::{
    AuthorizationRequestData, ConfigurationError, RequestCreationError, TokenClaims,
    TokenResponse, TokenValidationError,
};
use super::validator::TokenValidator;

/// One fully wired agent: cookie encrypter, PAR request handler, server
/// client and token validator, built once from validated configuration
/// and shared for the process lifetime. There is no ambient state; the
/// embedding application passes this context to its request handlers.
pub struct OAuthAgent<C: BackchannelHttpClient> {
    config: AgentConfiguration,
    cookie_encrypter: CookieEncrypter,
    request_handler: ParAuthorizationRequestHandler<C>,
    server_client: AuthorizationServerClient<C>,
    token_validator: TokenValidator<C>,
}

impl<C: BackchannelHttpClient> OAuthAgent<C> {
    /// Validate the configuration and wire the collaborators. Never
    /// touches the network; the JWKS is fetched on first use.
    pub fn new(config: AgentConfiguration, http_client: C) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let cookie_encrypter = CookieEncrypter::new(
            &config.enc_key,
            &config.key_derivation,
            config.cookie_serialize_options(),
            CookieName::new(&config.cookie_name_prefix),
        )?;
        let request_handler = ParAuthorizationRequestHandler::new(&config, http_client.clone());
        let server_client = AuthorizationServerClient::new(&config, http_client.clone());
        let token_validator = TokenValidator::new(&config, http_client)?;
        Ok(OAuthAgent {
            config,
            cookie_encrypter,
            request_handler,
            server_client,
            token_validator,
        })
    }

    /// Begin a login attempt: push the authorization request and return
    /// the front-channel URL plus the secrets to persist as cookies.
    pub async fn start_login(
        &self,
        extra_params: &[(String, String)],
    ) -> Result<AuthorizationRequestData, RequestCreationError> {
        self.request_handler.create_request(extra_params).await
    }

    /// Encrypted Set-Cookie values persisting a login attempt's state and
    /// verifier until the callback arrives.
    pub async fn login_cookies(&self, request: &AuthorizationRequestData) -> Vec<String> {
        let names = self.cookie_encrypter.names();
        vec![
            self.cookie_encrypter.encrypted_cookie(&names.state(), &request.state).await,
            self.cookie_encrypter
                .encrypted_cookie(&names.code_verifier(), &request.code_verifier)
                .await,
        ]
    }

    /// Redeem the callback's authorization code using the attempt's
    /// verifier.
    pub async fn redeem_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, RequestCreationError> {
        self.server_client.redeem_code_for_tokens(code, code_verifier).await
    }

    /// Encrypted Set-Cookie values sealing redeemed tokens into the
    /// browser session.
    pub async fn token_cookies(&self, tokens: &TokenResponse) -> Vec<String> {
        let names = self.cookie_encrypter.names();
        let mut cookies = vec![
            self.cookie_encrypter
                .encrypted_cookie(&names.access_token(), &tokens.access_token)
                .await,
        ];
        if let Some(refresh_token) = &tokens.refresh_token {
            cookies.push(
                self.cookie_encrypter
                    .encrypted_cookie(&names.refresh_token(), refresh_token)
                    .await,
            );
        }
        if let Some(id_token) = &tokens.id_token {
            cookies
                .push(self.cookie_encrypter.encrypted_cookie(&names.id_token(), id_token).await);
        }
        cookies
    }

    /// Validate a JWT taken from the session cookies.
    pub async fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenValidationError> {
        self.token_validator.validate(token).await
    }

    /// Set-Cookie values clearing the whole cookie family on logout.
    pub fn logout_cookies(&self) -> Vec<String> {
        self.cookie_encrypter.cookies_for_unset()
    }

    pub fn cookie_encrypter(&self) -> &CookieEncrypter {
        &self.cookie_encrypter
    }

    pub fn configuration(&self) -> &AgentConfiguration {
        &self.config
    }
}
