//! Authorization request construction: PAR push, front-channel URLs and
//! the final code-for-tokens redemption.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{instrument, warn};

use super::config::AgentConfiguration;
use super::http_client::{BackchannelHttpClient, HttpMethod, HttpRequest, HttpResponse};
use super::pkce;
use super::types::{AuthorizationRequestData, ParResponse, RequestCreationError, TokenResponse};

/// Characters that survive form/query encoding unescaped.
const FORM_URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn form_encode(value: &str) -> String {
    utf8_percent_encode(value, FORM_URLENCODE_SET).to_string()
}

fn encode_pairs(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", form_encode(key), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Strategy for producing the front-channel authorization request.
///
/// Selection between implementations is explicit configuration; a PAR
/// failure never falls back to a plain request.
#[async_trait]
pub trait AuthorizationRequestHandler: Send + Sync {
    /// Create the request data for one login attempt.
    async fn create_request(
        &self,
        extra_params: &[(String, String)],
    ) -> Result<AuthorizationRequestData, RequestCreationError>;
}

/// Back-channel client for the authorization server's PAR and token
/// endpoints.
#[derive(Clone)]
pub struct AuthorizationServerClient<C: BackchannelHttpClient> {
    http_client: C,
    client_id: String,
    client_secret: Option<String>,
    par_endpoint: String,
    token_endpoint: String,
    redirect_uri: String,
    scope: String,
    request_timeout: Duration,
}

impl<C: BackchannelHttpClient> AuthorizationServerClient<C> {
    pub fn new(config: &AgentConfiguration, http_client: C) -> Self {
        AuthorizationServerClient {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            par_endpoint: config.par_endpoint.clone(),
            token_endpoint: config.token_endpoint.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    /// Push the authorization request parameters and obtain the
    /// `request_uri` reference for the front channel.
    #[instrument(skip(self), level = "debug")]
    pub async fn authorization_request_object_uri(
        &self,
        code_challenge: &str,
        state: &str,
        extra_params: &[(String, String)],
    ) -> Result<ParResponse, RequestCreationError> {
        let mut form = vec![
            ("response_type", "code".to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("scope", self.scope.clone()),
            ("code_challenge", code_challenge.to_string()),
            ("code_challenge_method", "S256".to_string()),
            ("state", state.to_string()),
        ];
        for (key, value) in extra_params {
            form.push((key.as_str(), value.clone()));
        }

        let response = self.post_form(&self.par_endpoint, &form).await?;
        if response.status != 200 && response.status != 201 {
            warn!(status = response.status, "pushed authorization request rejected");
            return Err(RequestCreationError::ErrorStatus(response.status));
        }

        let body: serde_json::Value = serde_json::from_slice(&response.body)?;
        let request_uri = body
            .get("request_uri")
            .and_then(|uri| uri.as_str())
            .ok_or(RequestCreationError::MissingField("request_uri"))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(|exp| exp.as_u64()).unwrap_or(0);
        Ok(ParResponse { request_uri, expires_in })
    }

    /// Redeem the callback's authorization code. This is the only call
    /// that transmits the code verifier.
    #[instrument(skip(self, code, code_verifier), level = "debug")]
    pub async fn redeem_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, RequestCreationError> {
        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("client_id", self.client_id.clone()),
            ("code_verifier", code_verifier.to_string()),
        ];

        let response = self.post_form(&self.token_endpoint, &form).await?;
        if response.status != 200 {
            warn!(status = response.status, "authorization code redemption rejected");
            return Err(RequestCreationError::ErrorStatus(response.status));
        }

        let body: serde_json::Value = serde_json::from_slice(&response.body)?;
        let access_token = body
            .get("access_token")
            .and_then(|token| token.as_str())
            .ok_or(RequestCreationError::MissingField("access_token"))?
            .to_string();
        let refresh_token =
            body.get("refresh_token").and_then(|token| token.as_str()).map(|s| s.to_string());
        let id_token = body.get("id_token").and_then(|token| token.as_str()).map(|s| s.to_string());
        let expires_in = body.get("expires_in").and_then(|exp| exp.as_u64());
        let scope = body.get("scope").and_then(|s| s.as_str()).map(|s| s.to_string());
        Ok(TokenResponse { access_token, refresh_token, id_token, expires_in, scope })
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<HttpResponse, RequestCreationError> {
        let mut headers = vec![(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )];
        if let Some(secret) = &self.client_secret {
            let credentials = STANDARD.encode(format!("{}:{}", self.client_id, secret));
            headers.push(("Authorization".to_string(), format!("Basic {}", credentials)));
        }
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers,
            body: Some(encode_pairs(form).into_bytes()),
            timeout: Some(self.request_timeout),
        };
        self.http_client
            .execute(request)
            .await
            .map_err(RequestCreationError::Transport)
    }
}

/// Handler that pushes the request parameters (PAR) and sends the browser
/// a `request_uri` reference instead of the parameters themselves.
#[derive(Clone)]
pub struct ParAuthorizationRequestHandler<C: BackchannelHttpClient> {
    server_client: AuthorizationServerClient<C>,
    authorization_endpoint: String,
    client_id: String,
}

impl<C: BackchannelHttpClient> ParAuthorizationRequestHandler<C> {
    pub fn new(config: &AgentConfiguration, http_client: C) -> Self {
        ParAuthorizationRequestHandler {
            server_client: AuthorizationServerClient::new(config, http_client),
            authorization_endpoint: config.authorization_endpoint.clone(),
            client_id: config.client_id.clone(),
        }
    }
}

#[async_trait]
impl<C: BackchannelHttpClient> AuthorizationRequestHandler for ParAuthorizationRequestHandler<C> {
    async fn create_request(
        &self,
        extra_params: &[(String, String)],
    ) -> Result<AuthorizationRequestData, RequestCreationError> {
        let code_verifier = pkce::new_code_verifier();
        let code_challenge = pkce::code_challenge(&code_verifier);
        let state = pkce::new_state();

        let par = self
            .server_client
            .authorization_request_object_uri(&code_challenge, &state, extra_params)
            .await?;

        let request_url = format!(
            "{}?client_id={}&request_uri={}",
            self.authorization_endpoint,
            form_encode(&self.client_id),
            form_encode(&par.request_uri),
        );
        Ok(AuthorizationRequestData { request_url, code_verifier, state })
    }
}

/// Handler for servers without PAR support: every parameter rides the
/// front-channel URL.
#[derive(Clone)]
pub struct PlainAuthorizationRequestHandler {
    authorization_endpoint: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
}

impl PlainAuthorizationRequestHandler {
    pub fn new(config: &AgentConfiguration) -> Self {
        PlainAuthorizationRequestHandler {
            authorization_endpoint: config.authorization_endpoint.clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
        }
    }
}

#[async_trait]
impl AuthorizationRequestHandler for PlainAuthorizationRequestHandler {
    async fn create_request(
        &self,
        extra_params: &[(String, String)],
    ) -> Result<AuthorizationRequestData, RequestCreationError> {
        let code_verifier = pkce::new_code_verifier();
        let code_challenge = pkce::code_challenge(&code_verifier);
        let state = pkce::new_state();

        let mut params = vec![
            ("response_type", "code".to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("scope", self.scope.clone()),
            ("state", state.clone()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256".to_string()),
        ];
        for (key, value) in extra_params {
            params.push((key.as_str(), value.clone()));
        }

        let request_url =
            format!("{}?{}", self.authorization_endpoint, encode_pairs(&params));
        Ok(AuthorizationRequestData { request_url, code_verifier, state })
    }
}
