//! Authentication middleware and extractors.
//!
//! This module provides:
//! - [`TokenIssuer`] - HS256 session tokens issued at login and registration
//! - [`require_auth`] - middleware resolving the caller from a session token
//! - [`AuthUser`] - extractor for the caller resolved by the middleware
//!
//! A token is accepted from, in order: the `Authorization: Bearer` header,
//! the `token` header, or the `token` field of a JSON body.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use pixio_core::{AccountId, PixioError};

use crate::error::ApiError;
use crate::state::AppState;

/// Lifetime of an issued session token.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Header carrying a bare token.
const TOKEN_HEADER: &str = "token";

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID).
    pub sub: String,
    /// Issued at.
    pub iat: i64,
    /// Expiration time.
    pub exp: i64,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Create an issuer for a shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Issue a token for `account_id`.
    ///
    /// # Errors
    ///
    /// Returns `PixioError::Configuration` if signing fails.
    pub fn issue(&self, account_id: &AccountId) -> Result<String, PixioError> {
        self.issue_at(account_id, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn issue_at(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<String, PixioError> {
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| PixioError::Configuration(format!("failed to sign token: {e}")))
    }

    /// Verify a token and return the account it names.
    ///
    /// # Errors
    ///
    /// Returns `PixioError::InvalidCredential` on a bad signature, an expired
    /// token or a malformed subject.
    pub fn verify(&self, token: &str) -> Result<AccountId, PixioError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token validation failed");
            PixioError::InvalidCredential
        })?;

        data.claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| PixioError::InvalidCredential)
    }
}

/// Pick the presented credential from headers or a JSON body.
///
/// # Errors
///
/// Returns `PixioError::Unauthenticated` if none is present.
pub fn extract_credential(
    headers: &HeaderMap,
    body: Option<&serde_json::Value>,
) -> Result<String, PixioError> {
    if let Some(token) = bearer_token(headers) {
        return Ok(token);
    }

    if let Some(token) = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Ok(token.to_string());
    }

    body.and_then(|b| b.get("token"))
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .ok_or(PixioError::Unauthenticated)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Resolve a token to an account.
fn resolve(tokens: &TokenIssuer, token: &str) -> Result<AccountId, PixioError> {
    // Allow test tokens in testing only.
    // This bypass is gated behind #[cfg(test)] or the "test-auth" feature
    // to ensure it is never active in production builds.
    #[cfg(any(test, feature = "test-auth"))]
    if let Some(id) = token.strip_prefix("test-token:") {
        return id.parse().map_err(|_| PixioError::InvalidCredential);
    }

    tokens.verify(token)
}

/// Middleware that authenticates the caller.
///
/// When the headers carry no credential and the body is JSON, the body is
/// buffered to look for a `token` field and then handed on unchanged.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let (token, body) = match extract_credential(&parts.headers, None) {
        Ok(token) => (token, body),
        Err(err) if is_json(&parts.headers) => {
            let bytes = axum::body::to_bytes(body, state.config.max_body_bytes)
                .await
                .map_err(|e| ApiError::BadRequest {
                    code: "bad_request",
                    message: format!("failed to read body: {e}"),
                })?;
            let json = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
            let token = extract_credential(&parts.headers, json.as_ref()).map_err(|_| err)?;
            (token, Body::from(bytes))
        }
        Err(err) => return Err(err.into()),
    };

    let account_id = resolve(&state.tokens, &token)?;

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(AuthUser { account_id });
    Ok(next.run(request).await)
}

/// An authenticated caller, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The account the token names.
    pub account_id: AccountId,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthUser>()
                .copied()
                .ok_or_else(|| ApiError::from(PixioError::Unauthenticated))
        })
    }
}
