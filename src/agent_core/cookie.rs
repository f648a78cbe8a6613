//! Encrypted HttpOnly cookie issuing for session artifacts.
//!
//! Values reach the browser as `hex(iv):hex(ciphertext)`. Cipher work is
//! offloaded to the blocking pool so event-loop threads never stall on it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task;

use super::crypto::{self, KeyDerivation};
use super::types::{ConfigurationError, DecryptionError, SameSite};

/// Expiry applied when unsetting cookies: a full day in the past, so
/// skewed client clocks still drop them immediately.
const MINUS_DAY_IN_SECONDS: i64 = -86_400;

/// Attributes applied when serializing a Set-Cookie value. HttpOnly is not
/// an option; it is always emitted.
#[derive(Debug, Clone)]
pub struct CookieSerializeOptions {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    /// `None` issues a session cookie. `Some(-1)` writes an `Expires` of
    /// now without `Max-Age`. Any other value writes both, with `Some(0)`
    /// pinning `Expires` to the Unix epoch.
    pub expires_in_seconds: Option<i64>,
}

/// The fixed cookie-name family derived from the configured prefix.
#[derive(Debug, Clone)]
pub struct CookieName {
    prefix: String,
}

impl CookieName {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// CSRF state cookie, held between redirect and callback.
    pub fn state(&self) -> String {
        format!("{}-state", self.prefix)
    }

    /// PKCE code verifier cookie, held between redirect and callback.
    pub fn code_verifier(&self) -> String {
        format!("{}-verifier", self.prefix)
    }

    /// Access token cookie.
    pub fn access_token(&self) -> String {
        format!("{}-at", self.prefix)
    }

    /// Refresh token cookie.
    pub fn refresh_token(&self) -> String {
        format!("{}-rt", self.prefix)
    }

    /// ID token cookie.
    pub fn id_token(&self) -> String {
        format!("{}-id", self.prefix)
    }

    /// Every cookie the agent may have issued, for logout clearing.
    pub fn cookies_for_unset(&self) -> Vec<String> {
        vec![
            self.state(),
            self.code_verifier(),
            self.access_token(),
            self.refresh_token(),
            self.id_token(),
        ]
    }
}

/// Encrypts session artifacts into cookie values and serializes Set-Cookie
/// strings. Built once per process; the key never rotates.
#[derive(Clone)]
pub struct CookieEncrypter {
    key: Arc<[u8; crypto::KEY_LEN]>,
    default_options: CookieSerializeOptions,
    names: CookieName,
}

impl CookieEncrypter {
    /// Derive the cookie key and fix the default serialization options.
    pub fn new(
        secret: &str,
        derivation: &KeyDerivation,
        default_options: CookieSerializeOptions,
        names: CookieName,
    ) -> Result<Self, ConfigurationError> {
        let key = crypto::derive_cookie_key(secret, derivation)?;
        Ok(Self { key: Arc::new(key), default_options, names })
    }

    /// Cookie names this encrypter issues under.
    pub fn names(&self) -> &CookieName {
        &self.names
    }

    /// Serialization options taken from configuration.
    pub fn default_options(&self) -> &CookieSerializeOptions {
        &self.default_options
    }

    /// Encrypt a plaintext into the `hex(iv):hex(ciphertext)` wire form
    /// under a fresh IV.
    pub async fn encrypt_value(&self, plaintext: &str) -> String {
        let key = self.key.clone();
        let plaintext = plaintext.to_owned();
        task::spawn_blocking(move || {
            let (iv, ciphertext) = crypto::encrypt(&key, plaintext.as_bytes());
            format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
        })
        .await
        .expect("cookie encryption task panicked")
    }

    /// Decrypt a cookie value back into its plaintext.
    ///
    /// Any malformed input maps to a [`DecryptionError`]; callers treat
    /// all of them as an absent session.
    pub async fn decrypt_value_from_cookie(
        &self,
        cookie_value: &str,
    ) -> Result<String, DecryptionError> {
        let key = self.key.clone();
        let cookie_value = cookie_value.to_owned();
        task::spawn_blocking(move || {
            let (iv_hex, ciphertext_hex) = cookie_value
                .split_once(':')
                .ok_or(DecryptionError::MalformedValue)?;
            let iv = hex::decode(iv_hex)?;
            let ciphertext = hex::decode(ciphertext_hex)?;
            let plaintext = crypto::decrypt(&key, &iv, &ciphertext)?;
            Ok(String::from_utf8(plaintext)?)
        })
        .await
        .expect("cookie decryption task panicked")
    }

    /// Serialize a value into a full Set-Cookie string.
    pub fn serialize_to_cookie(
        &self,
        name: &str,
        value: &str,
        options: &CookieSerializeOptions,
    ) -> String {
        serialize(name, value, options)
    }

    /// Encrypt and serialize under the configured default options.
    pub async fn encrypted_cookie(&self, name: &str, value: &str) -> String {
        let encrypted = self.encrypt_value(value).await;
        serialize(name, &encrypted, &self.default_options)
    }

    /// Encrypt and serialize under explicit options.
    pub async fn encrypted_cookie_with_options(
        &self,
        name: &str,
        value: &str,
        options: &CookieSerializeOptions,
    ) -> String {
        let encrypted = self.encrypt_value(value).await;
        serialize(name, &encrypted, options)
    }

    /// Set-Cookie string clearing one cookie.
    pub fn cookie_for_unset(&self, name: &str) -> String {
        serialize(name, "", &self.unset_options())
    }

    /// Set-Cookie strings clearing every cookie the agent may have issued.
    pub fn cookies_for_unset(&self) -> Vec<String> {
        let options = self.unset_options();
        self.names
            .cookies_for_unset()
            .iter()
            .map(|name| serialize(name, "", &options))
            .collect()
    }

    fn unset_options(&self) -> CookieSerializeOptions {
        let mut options = self.default_options.clone();
        options.expires_in_seconds = Some(MINUS_DAY_IN_SECONDS);
        options
    }
}

fn serialize(name: &str, value: &str, options: &CookieSerializeOptions) -> String {
    let mut cookie = String::new();
    cookie.push_str(name);
    cookie.push('=');
    cookie.push_str(value);

    cookie.push_str("; Domain=");
    cookie.push_str(&options.domain);
    cookie.push_str("; Path=");
    cookie.push_str(&options.path);
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; HttpOnly");
    if let Some(same_site) = options.same_site {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site.as_str());
    }

    if let Some(seconds) = options.expires_in_seconds {
        if seconds != -1 {
            cookie.push_str(&format!("; Max-Age={}", seconds));
        }
        let expires = if seconds == 0 {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            Utc::now() + Duration::seconds(seconds)
        };
        cookie.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }

    cookie
}
