//! Typed extraction of the authenticated principal.
//!
//! Handlers that need an identity take `Authenticated(principal)` as a
//! parameter; the token is verified exactly once, here, and the result is a
//! plain value passed down the call chain.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use beacon_core::Principal;

use crate::error::ApiError;
use crate::server::AppState;

/// A verified bearer principal.
#[derive(Clone, Copy, Debug)]
pub struct Authenticated(pub Principal);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".into()))?;

        let principal = state.keys.verify(token)?;
        Ok(Self(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use beacon_auth::TokenKeys;
    use beacon_core::Role;

    use crate::config::allow_all_origins;
    use crate::hub::{Hub, HubConfig};
    use crate::server::AppState;
    use beacon_store::{Database, UserRepo};

    fn test_state() -> AppState {
        let db = Database::in_memory().unwrap();
        let (hub, _task) = Hub::start(HubConfig::default(), Default::default());
        AppState {
            users: std::sync::Arc::new(UserRepo::new(db)),
            keys: TokenKeys::from_secret(&SecretString::from("extract-test-secret".to_string())),
            hub,
            origin_policy: allow_all_origins(),
            start_time: std::time::Instant::now(),
        }
    }

    async fn whoami(Authenticated(principal): Authenticated) -> String {
        format!("{}:{}", principal.user_id, principal.role)
    }

    fn app(state: AppState) -> Router {
        Router::new().route("/whoami", get(whoami)).with_state(state)
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        let state = test_state();
        let token = state.keys.issue(7, Role::Admin).unwrap();

        let req = Request::builder()
            .uri("/whoami")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"7:admin");
    }

    #[tokio::test]
    async fn missing_header_is_401() {
        let req = Request::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();
        let resp = app(test_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_401() {
        let req = Request::builder()
            .uri("/whoami")
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let resp = app(test_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tampered_token_is_401() {
        let state = test_state();
        let token = state.keys.issue(7, Role::User).unwrap();
        let tampered = format!("{token}x");

        let req = Request::builder()
            .uri("/whoami")
            .header("authorization", format!("Bearer {tampered}"))
            .body(Body::empty())
            .unwrap();
        let resp = app(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
