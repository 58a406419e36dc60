//! Access token verification and the authenticated-account extractors.
//!
//! Tokens are HS256 JWTs carried in a cookie. The `sub` claim has the form
//! `"<role>:<id>"` and the `type` claim must be `"access"`.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use common::{Account, Role, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// Value of the `type` claim on access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// `"<role>:<id>"`
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access token missing")]
    Missing,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unexpected token type: {0}")]
    WrongType(String),

    #[error("malformed subject: {0}")]
    MalformedSubject(String),

    #[error("token generation failed: {0}")]
    GenerationFailed(String),
}

/// Issues and verifies access tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    cookie_name: String,
    ttl: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            cookie_name: cookie_name.into(),
            ttl: Duration::minutes(15),
        }
    }

    /// Signs an access token for `account`.
    pub fn issue(&self, account: Account) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account.to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::GenerationFailed(e.to_string()))
    }

    /// Verifies a token and returns the account it was issued for.
    pub fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthError::WrongType(claims.token_type));
        }
        parse_subject(&claims.sub)
    }

    /// Finds the access token among the request cookies.
    pub fn token_from_headers<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, token)| token)
    }
}

fn parse_subject(sub: &str) -> Result<Account, AuthError> {
    let malformed = || AuthError::MalformedSubject(sub.to_string());
    let (role, id) = sub.split_once(':').ok_or_else(malformed)?;
    let role: Role = role.parse().map_err(|_| malformed())?;
    let id: i64 = id.parse().map_err(|_| malformed())?;
    Ok(Account::new(role, id))
}

/// The account that sent the request, taken from a verified access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedAccount(pub Account);

impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(account) = parts.extensions.get::<AuthenticatedAccount>() {
            return Ok(*account);
        }

        let verifier = TokenVerifier::from_ref(state);
        let result = verifier
            .token_from_headers(&parts.headers)
            .ok_or(AuthError::Missing)
            .and_then(|token| verifier.verify(token));

        match result {
            Ok(account) => {
                tracing::debug!(%account, "request authenticated");
                let account = AuthenticatedAccount(account);
                parts.extensions.insert(account);
                Ok(account)
            }
            Err(AuthError::MalformedSubject(sub)) => {
                tracing::error!(subject = %sub, uri = ?parts.uri, "token with malformed subject");
                Err(ApiError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = ?parts.uri, "authentication failed");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// An authenticated account with the `user` role.
///
/// Business accounts are rejected with 403, since only users own carts.
#[derive(Debug, Clone, Copy)]
pub struct UserAccount(pub UserId);

impl<S> FromRequestParts<S> for UserAccount
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedAccount(account) =
            AuthenticatedAccount::from_request_parts(parts, state).await?;
        match account {
            Account::User(user_id) => Ok(UserAccount(user_id)),
            Account::Business(_) => Err(ApiError::Forbidden(
                "Only users have shopping cart".to_string(),
            )),
        }
    }
}
