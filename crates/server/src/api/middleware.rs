//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use reelpipe_core::{AuthError, AuthRequest, Identity, ANONYMOUS_OWNER};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::api_error;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Records request duration, count and in-flight gauge.
///
/// Streaming responses are timed until their headers are ready.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Validates the request with the configured authenticator and stores the
/// resulting `Identity` in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authenticator = state.authenticator();

    if authenticator.method_name() == "none" {
        request.extensions_mut().insert(Identity::anonymous());
        return next.run(request).await;
    }

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["not_authenticated"]).inc();
            api_error(StatusCode::UNAUTHORIZED, "Authentication required").into_response()
        }
        Err(AuthError::InvalidCredentials(reason)) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["invalid_credentials"]).inc();
            warn!(%source_ip, "Rejected credentials: {}", reason);
            api_error(StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL.with_label_values(&["internal_error"]).inc();
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Owner reference of the authenticated caller.
///
/// Falls back to the anonymous owner when no identity was attached.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let owner = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.owner.clone())
            .unwrap_or_else(|| ANONYMOUS_OWNER.to_string());
        std::future::ready(Ok(AuthUser(owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use reelpipe_core::testing::{fixtures, MockEncoder};
    use reelpipe_core::{
        create_authenticator, load_config_from_str, ApiKeyEntry, AuthConfig, AuthMethod,
        IngestCoordinator, SqliteVideoCatalog, StorageLayout,
    };
    use tower::ServiceExt;

    use crate::api::WsBroadcaster;

    async fn user_handler(AuthUser(owner): AuthUser) -> String {
        owner
    }

    fn create_test_state(auth: AuthConfig) -> Arc<AppState> {
        let mut config = load_config_from_str("[auth]\nmethod = \"none\"\n").unwrap();
        config.auth = auth;
        let authenticator = Arc::from(create_authenticator(&config.auth).unwrap());
        let catalog = Arc::new(SqliteVideoCatalog::in_memory().unwrap());
        let coordinator = Arc::new(IngestCoordinator::new(
            Arc::new(MockEncoder::new()),
            catalog.clone(),
            StorageLayout::new(std::env::temp_dir().join("reelpipe-middleware-tests")),
            fixtures::three_tier_ladder(),
            1,
        ));
        Arc::new(AppState::new(
            config,
            authenticator,
            catalog,
            coordinator,
            WsBroadcaster::default(),
        ))
    }

    fn api_key_config() -> AuthConfig {
        AuthConfig {
            method: AuthMethod::ApiKey,
            api_keys: vec![ApiKeyEntry {
                key: "secret-key".to_string(),
                owner: "alice".to_string(),
            }],
        }
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_none_auth_is_anonymous() {
        let state = create_test_state(AuthConfig {
            method: AuthMethod::None,
            api_keys: vec![],
        });

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, ANONYMOUS_OWNER);
    }

    #[tokio::test]
    async fn test_api_key_resolves_owner() {
        let state = create_test_state(api_key_config());

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "alice");
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let state = create_test_state(api_key_config());

        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "secret-key")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_invalid() {
        let state = create_test_state(api_key_config());

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer wrong-key")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_missing() {
        let state = create_test_state(api_key_config());

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Authentication required"));
    }
}
