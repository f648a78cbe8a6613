//! Core building blocks: cookie encryption, PKCE, authorization request
//! construction and JWT validation.

pub mod agent;
pub mod authorization;
pub mod config;
pub mod cookie;
pub mod crypto;
pub mod http_client;
pub mod jwks;
pub mod pkce;
pub mod types;
pub mod validator;

#[cfg(feature = "reqwest-client")]
pub mod reqwest_client;
