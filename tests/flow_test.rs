use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use oauth_agent::{
    code_challenge, AgentConfiguration, AuthorizationRequestHandler, BackchannelHttpClient,
    ConfigurationError, HttpClientError, HttpMethod, HttpRequest, HttpResponse,
    InMemoryHttpClient, OAuthAgent, PlainAuthorizationRequestHandler, RequestCreationError,
};
use serde_json::json;

const AUTHORIZATION_ENDPOINT: &str = "https://idsvr.test/oauth/authorize";
const PAR_ENDPOINT: &str = "https://idsvr.test/oauth/par";
const TOKEN_ENDPOINT: &str = "https://idsvr.test/oauth/token";

fn config_json() -> serde_json::Value {
    json!({
        "client_id": "spa-client",
        "authorization_endpoint": AUTHORIZATION_ENDPOINT,
        "par_endpoint": PAR_ENDPOINT,
        "token_endpoint": TOKEN_ENDPOINT,
        "redirect_uri": "https://www.example.test/callback",
        "scope": "openid profile",
        "issuer": "https://idsvr.test",
        "jwks_uri": "https://idsvr.test/oauth/jwks",
        "enc_key": "aaaabbbbccccddddeeeeffffgggghhhh",
        "cookie_name_prefix": "example",
        "cookie_domain": "api.example.test"
    })
}

fn test_config() -> AgentConfiguration {
    serde_json::from_value(config_json()).unwrap()
}

fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse { status, headers: vec![], body: serde_json::to_vec(&body).unwrap() }
}

fn par_response() -> HttpResponse {
    json_response(
        201,
        json!({
            "request_uri": "urn:ietf:params:oauth:request_uri:abc123",
            "expires_in": 600,
        }),
    )
}

/// The encrypted value of a Set-Cookie string, without attributes.
fn cookie_value(cookie: &str) -> &str {
    let (_, rest) = cookie.split_once('=').unwrap();
    match rest.split_once(';') {
        Some((value, _)) => value,
        None => rest,
    }
}

#[tokio::test]
async fn par_login_round_trips_state_through_cookies() {
    let client = InMemoryHttpClient::new();
    client.insert_response(PAR_ENDPOINT, par_response());
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    let request = agent.start_login(&[]).await.unwrap();

    // The front-channel URL carries only the client id and the reference.
    let expected_prefix = format!("{}?client_id=spa-client&request_uri=", AUTHORIZATION_ENDPOINT);
    assert!(request.request_url.starts_with(&expected_prefix), "{}", request.request_url);
    assert!(request
        .request_url
        .ends_with("urn%3Aietf%3Aparams%3Aoauth%3Arequest_uri%3Aabc123"));
    assert!(!request.request_url.contains("code_challenge"));
    assert_eq!(request.code_verifier.len(), 43);
    assert!(!request.state.is_empty());

    let cookies = agent.login_cookies(&request).await;
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("example-state="));
    assert!(cookies[1].starts_with("example-verifier="));
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"), "{}", cookie);
    }

    // What went into the cookies must come back out byte for byte.
    let encrypter = agent.cookie_encrypter();
    let state = encrypter.decrypt_value_from_cookie(cookie_value(&cookies[0])).await.unwrap();
    assert_eq!(state, request.state);
    let verifier = encrypter.decrypt_value_from_cookie(cookie_value(&cookies[1])).await.unwrap();
    assert_eq!(verifier, request.code_verifier);
}

#[tokio::test]
async fn par_rejection_maps_to_error_status() {
    let client = InMemoryHttpClient::new();
    client.insert_response(PAR_ENDPOINT, json_response(400, json!({"error": "invalid_request"})));
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    assert!(matches!(
        agent.start_login(&[]).await,
        Err(RequestCreationError::ErrorStatus(400))
    ));
}

#[tokio::test]
async fn malformed_par_response_is_reported() {
    let client = InMemoryHttpClient::new();
    client.insert_response(
        PAR_ENDPOINT,
        HttpResponse { status: 201, headers: vec![], body: b"not json".to_vec() },
    );
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    assert!(matches!(
        agent.start_login(&[]).await,
        Err(RequestCreationError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn par_response_without_request_uri_is_reported() {
    let client = InMemoryHttpClient::new();
    client.insert_response(PAR_ENDPOINT, json_response(201, json!({"expires_in": 600})));
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    assert!(matches!(
        agent.start_login(&[]).await,
        Err(RequestCreationError::MissingField("request_uri"))
    ));
}

#[tokio::test]
async fn transport_failure_surfaces_as_transport_error() {
    // No registered response: the stub client fails the call outright.
    let agent = OAuthAgent::new(test_config(), InMemoryHttpClient::new()).unwrap();

    assert!(matches!(
        agent.start_login(&[]).await,
        Err(RequestCreationError::Transport(_))
    ));
}

/// Returns a canned response and remembers the request it answered.
#[derive(Clone)]
struct CapturingHttpClient {
    response: HttpResponse,
    last_request: Arc<Mutex<Option<HttpRequest>>>,
}

impl CapturingHttpClient {
    fn new(response: HttpResponse) -> Self {
        Self { response, last_request: Arc::new(Mutex::new(None)) }
    }

    fn last_request(&self) -> HttpRequest {
        self.last_request.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl BackchannelHttpClient for CapturingHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        *self.last_request.lock().unwrap() = Some(request);
        Ok(self.response.clone())
    }
}

fn form_field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

#[tokio::test]
async fn pushed_request_carries_the_full_parameter_set() {
    let mut value = config_json();
    value["client_secret"] = json!("top-secret");
    let config: AgentConfiguration = serde_json::from_value(value).unwrap();

    let client = CapturingHttpClient::new(par_response());
    let agent = OAuthAgent::new(config, client.clone()).unwrap();

    let request = agent
        .start_login(&[("prompt".to_string(), "login".to_string())])
        .await
        .unwrap();

    let captured = client.last_request();
    assert_eq!(captured.url, PAR_ENDPOINT);
    assert!(matches!(captured.method, HttpMethod::Post));
    assert!(captured
        .headers
        .iter()
        .any(|(name, value)| name == "Content-Type"
            && value == "application/x-www-form-urlencoded"));
    let expected_auth = format!("Basic {}", STANDARD.encode("spa-client:top-secret"));
    assert!(captured
        .headers
        .iter()
        .any(|(name, value)| name == "Authorization" && *value == expected_auth));

    let body = String::from_utf8(captured.body.unwrap()).unwrap();
    assert_eq!(form_field(&body, "response_type"), Some("code"));
    assert_eq!(form_field(&body, "client_id"), Some("spa-client"));
    assert_eq!(
        form_field(&body, "redirect_uri"),
        Some("https%3A%2F%2Fwww.example.test%2Fcallback")
    );
    assert_eq!(form_field(&body, "scope"), Some("openid%20profile"));
    assert_eq!(form_field(&body, "code_challenge_method"), Some("S256"));
    assert_eq!(form_field(&body, "prompt"), Some("login"));
    assert_eq!(form_field(&body, "state"), Some(request.state.as_str()));
    // The pushed challenge must commit to the verifier the cookie holds.
    assert_eq!(
        form_field(&body, "code_challenge"),
        Some(code_challenge(&request.code_verifier).as_str())
    );
}

#[tokio::test]
async fn redeemed_tokens_seal_into_cookies() {
    let client = InMemoryHttpClient::new();
    client.insert_response(
        TOKEN_ENDPOINT,
        json_response(
            200,
            json!({
                "access_token": "at-123",
                "refresh_token": "rt-456",
                "id_token": "id-789",
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "openid profile",
            }),
        ),
    );
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    let tokens = agent.redeem_code("code-abc", "verifier-xyz").await.unwrap();
    assert_eq!(tokens.access_token, "at-123");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-456"));
    assert_eq!(tokens.id_token.as_deref(), Some("id-789"));
    assert_eq!(tokens.expires_in, Some(3600));

    let cookies = agent.token_cookies(&tokens).await;
    assert_eq!(cookies.len(), 3);
    assert!(cookies[0].starts_with("example-at="));
    assert!(cookies[1].starts_with("example-rt="));
    assert!(cookies[2].starts_with("example-id="));

    let access_token = agent
        .cookie_encrypter()
        .decrypt_value_from_cookie(cookie_value(&cookies[0]))
        .await
        .unwrap();
    assert_eq!(access_token, "at-123");
}

#[tokio::test]
async fn token_response_without_optional_fields_yields_one_cookie() {
    let client = InMemoryHttpClient::new();
    client.insert_response(TOKEN_ENDPOINT, json_response(200, json!({"access_token": "at-123"})));
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    let tokens = agent.redeem_code("code-abc", "verifier-xyz").await.unwrap();
    assert!(tokens.refresh_token.is_none());
    assert!(tokens.id_token.is_none());

    let cookies = agent.token_cookies(&tokens).await;
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("example-at="));
}

#[tokio::test]
async fn code_redemption_failure_maps_to_error_status() {
    let client = InMemoryHttpClient::new();
    client.insert_response(TOKEN_ENDPOINT, json_response(400, json!({"error": "invalid_grant"})));
    let agent = OAuthAgent::new(test_config(), client).unwrap();

    assert!(matches!(
        agent.redeem_code("expired-code", "verifier-xyz").await,
        Err(RequestCreationError::ErrorStatus(400))
    ));
}

#[tokio::test]
async fn code_redemption_sends_the_verifier() {
    let client = CapturingHttpClient::new(json_response(200, json!({"access_token": "at-123"})));
    let agent = OAuthAgent::new(test_config(), client.clone()).unwrap();

    agent.redeem_code("code-abc", "verifier-xyz").await.unwrap();

    let captured = client.last_request();
    assert_eq!(captured.url, TOKEN_ENDPOINT);
    let body = String::from_utf8(captured.body.unwrap()).unwrap();
    assert_eq!(form_field(&body, "grant_type"), Some("authorization_code"));
    assert_eq!(form_field(&body, "code"), Some("code-abc"));
    assert_eq!(form_field(&body, "code_verifier"), Some("verifier-xyz"));
    assert_eq!(form_field(&body, "client_id"), Some("spa-client"));
}

#[tokio::test]
async fn plain_handler_puts_parameters_on_the_url() {
    let handler = PlainAuthorizationRequestHandler::new(&test_config());

    let request = handler
        .create_request(&[("ui_locales".to_string(), "sv".to_string())])
        .await
        .unwrap();

    let (base, query) = request.request_url.split_once('?').unwrap();
    assert_eq!(base, AUTHORIZATION_ENDPOINT);
    assert_eq!(form_field(query, "response_type"), Some("code"));
    assert_eq!(form_field(query, "client_id"), Some("spa-client"));
    assert_eq!(form_field(query, "code_challenge_method"), Some("S256"));
    assert_eq!(form_field(query, "ui_locales"), Some("sv"));
    assert_eq!(form_field(query, "state"), Some(request.state.as_str()));
    assert_eq!(
        form_field(query, "code_challenge"),
        Some(code_challenge(&request.code_verifier).as_str())
    );
}

#[tokio::test]
async fn logout_clears_the_whole_cookie_family() {
    let agent = OAuthAgent::new(test_config(), InMemoryHttpClient::new()).unwrap();

    let cookies = agent.logout_cookies();
    assert_eq!(cookies.len(), 5);
    for (cookie, name) in cookies.iter().zip([
        "example-state",
        "example-verifier",
        "example-at",
        "example-rt",
        "example-id",
    ]) {
        assert!(cookie.starts_with(&format!("{}=;", name)), "{}", cookie);
        assert!(cookie.contains("Max-Age=-86400"), "{}", cookie);
        assert!(cookie.contains("HttpOnly"), "{}", cookie);
    }
}

#[tokio::test]
async fn invalid_configuration_fails_agent_construction() {
    let mut value = config_json();
    value["enc_key"] = json!("short");
    let config: AgentConfiguration = serde_json::from_value(value).unwrap();
    assert!(matches!(
        OAuthAgent::new(config, InMemoryHttpClient::new()),
        Err(ConfigurationError::InvalidKeyLength(5))
    ));

    let mut value = config_json();
    value["par_endpoint"] = json!("not a url");
    let config: AgentConfiguration = serde_json::from_value(value).unwrap();
    assert!(matches!(
        OAuthAgent::new(config, InMemoryHttpClient::new()),
        Err(ConfigurationError::InvalidUrl("par_endpoint"))
    ));
}
