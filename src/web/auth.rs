//! Bearer-token auth and caller identity for the admin gateway.
//!
//! The token guards the transport. Who the caller is comes from the
//! fronting identity layer via `x-actor-id` / `x-actor-role`.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::enterprise::audit::Provenance;
use crate::enterprise::rbac::Actor;
use crate::enterprise::types::Role;
use crate::web::types::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AuthState {
    token: Option<Arc<SecretString>>,
}

impl AuthState {
    /// With no token every protected route answers 401.
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: token.map(Arc::new),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        match &self.token {
            Some(expected) => expected
                .expose_secret()
                .as_bytes()
                .ct_eq(presented.as_bytes())
                .into(),
            None => false,
        }
    }
}

pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if auth.accepts(token.trim()) => next.run(request).await,
        _ => ApiError::unauthenticated("Invalid or missing auth token").into_response(),
    }
}

/// The acting user of a protected request.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Caller)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_str(headers, ACTOR_ID_HEADER)
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| ApiError::unauthenticated("missing or invalid x-actor-id"))?;
    let role = header_str(headers, ACTOR_ROLE_HEADER)
        .and_then(|raw| Role::from_db_value(&raw.to_ascii_uppercase()))
        .ok_or_else(|| ApiError::unauthenticated("missing or unknown x-actor-role"))?;

    Ok(Actor::new(user_id, role).with_provenance(provenance_from_headers(headers)))
}

/// First hop of `x-forwarded-for` plus the user agent.
pub(crate) fn provenance_from_headers(headers: &HeaderMap) -> Provenance {
    Provenance {
        ip_address: header_str(headers, FORWARDED_FOR_HEADER)
            .and_then(|raw| raw.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty()),
        user_agent: header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, StatusCode};

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn token_comparison_requires_exact_match() {
        let auth = AuthState::new(Some(SecretString::from("letmein")));
        assert!(auth.accepts("letmein"));
        assert!(!auth.accepts("letmei"));
        assert!(!auth.accepts("letmein2"));
        assert!(!AuthState::new(None).accepts("letmein"));
    }

    #[test]
    fn actor_is_read_from_identity_headers() {
        let actor = actor_from_headers(&headers(&[
            ("x-actor-id", "42"),
            ("x-actor-role", "senior_lawyer"),
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("user-agent", "portal/2.1"),
        ]))
        .expect("actor");

        assert_eq!(actor.user_id, 42);
        assert_eq!(actor.role, Role::SeniorLawyer);
        assert_eq!(actor.provenance.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(actor.provenance.user_agent.as_deref(), Some("portal/2.1"));
    }

    #[test]
    fn unknown_role_or_bad_id_is_rejected() {
        let err = actor_from_headers(&headers(&[("x-actor-id", "7"), ("x-actor-role", "OWNER")]))
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = actor_from_headers(&headers(&[("x-actor-id", "seven"), ("x-actor-role", "ADMIN")]))
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
