use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;

use crate::auth::htpasswd::HtPasswd;

/// Credential store and realm, stored in request extensions for the
/// [`AuthUser`] extractor (set by the router's middleware layer).
#[derive(Clone)]
pub struct AuthGate {
    pub credentials: Arc<HtPasswd>,
    pub realm: Arc<str>,
}

/// Username verified via HTTP Basic auth.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}

/// Why a request did not get past the auth gate.
#[derive(Debug)]
pub enum AuthRejection {
    /// Bad or missing credentials. Carries the realm for the challenge header.
    Unauthorized(Arc<str>),
    /// The auth gate was not installed on this route.
    MissingGate,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthorized(realm) => {
                let challenge = format!("Basic realm=\"{}\"", realm.replace('"', "'"));
                let challenge = HeaderValue::from_str(&challenge)
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, challenge)],
                    "Unauthorized.\n",
                )
                    .into_response()
            }
            AuthRejection::MissingGate => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
/// Returns `None` for a missing or malformed header.
pub fn parse_basic_auth(value: Option<&HeaderValue>) -> Option<(String, String)> {
    let value = value?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let gate = parts
            .extensions
            .get::<AuthGate>()
            .cloned()
            .ok_or(AuthRejection::MissingGate)?;

        // A missing header still costs one comparison, like a wrong password
        let (username, password) =
            parse_basic_auth(parts.headers.get(header::AUTHORIZATION)).unwrap_or_default();

        let credentials = gate.credentials.clone();
        let user = username.clone();
        let verified =
            tokio::task::spawn_blocking(move || credentials.authenticate(&user, &password))
                .await
                .unwrap_or(false);

        if !verified {
            tracing::warn!("Authentication failed for user {:?}", username);
            return Err(AuthRejection::Unauthorized(gate.realm));
        }

        Ok(AuthUser { username })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(raw))).unwrap()
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth(Some(&basic("alice:pa:ss"))),
            Some(("alice".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_auth_rejects_malformed() {
        assert_eq!(parse_basic_auth(None), None);
        assert_eq!(parse_basic_auth(Some(&basic("no-colon"))), None);
        assert_eq!(
            parse_basic_auth(Some(&HeaderValue::from_static("Bearer abc"))),
            None
        );
        assert_eq!(
            parse_basic_auth(Some(&HeaderValue::from_static("Basic !!!"))),
            None
        );
    }

    #[test]
    fn test_unauthorized_response_has_challenge() {
        let resp = AuthRejection::Unauthorized(Arc::from("c't SESAM")).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"c't SESAM\""
        );
    }
}
