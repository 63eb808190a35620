//! Bearer token authentication middleware.
//!
//! Validates HS256 tokens from the `Authorization` header, optionally checks a
//! role, and exposes the caller identity to handlers through [`AuthUser`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::utils::jwt::{AuthToken, TokenRoles};

/// Authenticated caller, added to request extensions by [`authenticate`].
///
/// Handlers can take it as an argument directly, or as `Option<AuthUser>`
/// behind [`optional_authenticate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub subject: String,
    pub name: String,
    pub roles: TokenRoles,
}

impl From<AuthToken> for AuthUser {
    fn from(token: AuthToken) -> Self {
        Self {
            subject: token.subject,
            name: token.name,
            roles: token.roles,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Unauthorized"))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}

/// Middleware state: the signing secret plus an optional required role.
#[derive(Clone)]
pub struct AuthGuard {
    secret: Arc<str>,
    required_role: Option<String>,
}

impl std::fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGuard")
            .field("secret", &"[REDACTED]")
            .field("required_role", &self.required_role)
            .finish()
    }
}

impl AuthGuard {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
            required_role: None,
        }
    }

    /// Requires the caller to hold `role` (case-insensitive).
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.required_role = Some(role.into());
        self
    }

    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    /// Decodes the bearer token in `headers` and applies the role check.
    pub fn verify(&self, headers: &HeaderMap) -> AppResult<AuthUser> {
        let token = AuthToken::decode(bearer_token(headers)?, &self.secret)?;

        match &self.required_role {
            Some(role) if !token.roles.check(role) => {
                Err(AppError::unauthorized("Unauthorized"))
            }
            _ => Ok(AuthUser::from(token)),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token)
        .ok_or_else(|| AppError::unauthorized("Invalid token header"))
}

/// Token authentication middleware
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - Authorization header is missing or not a bearer header
/// - Token validation fails or the token has expired
/// - A role is required and the token does not carry it
///
/// # Example
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn_with_state(state.auth_guard(Some("admin")), authenticate))
/// ```
pub async fn authenticate(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = guard.verify(request.headers())?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Like [`authenticate`] but never rejects. A valid token still attaches
/// the caller identity.
pub async fn optional_authenticate(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(user) = guard.verify(request.headers()) {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::ErrorResponse;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    const SECRET: &str = "test_secret_key_at_least_32_characters_long";

    fn token_with(roles: &[&str]) -> String {
        AuthToken::new("42", "Ada", roles.iter().map(|r| r.to_string()).collect())
            .encode(SECRET, 1)
            .unwrap()
    }

    async fn whoami(user: AuthUser) -> String {
        format!("{}:{}", user.subject, user.name)
    }

    async fn own_profile(user: AuthUser) -> Result<String, AppError> {
        if user.subject != "42" {
            return Err(AppError::forbidden("Not the profile owner"));
        }
        Ok(user.name)
    }

    async fn maybe(user: Option<AuthUser>) -> String {
        user.map(|u| u.subject).unwrap_or_else(|| "anonymous".into())
    }

    fn protected(guard: AuthGuard) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .layer(middleware::from_fn_with_state(guard, authenticate))
    }

    fn optional(guard: AuthGuard) -> Router {
        Router::new()
            .route("/maybe", get(maybe))
            .layer(middleware::from_fn_with_state(guard, optional_authenticate))
    }

    fn request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn error_body(response: Response) -> ErrorResponse {
        serde_json::from_str(&text(response).await).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bEaReR abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        match bearer_token(&headers) {
            Err(AppError::Unauthorized { message }) => assert_eq!(message, "Invalid token header"),
            other => panic!("Expected Unauthorized error, got {other:?}"),
        }

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn test_guard_debug_redacts_secret() {
        let debug = format!("{:?}", AuthGuard::new(SECRET).with_role("admin"));
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("admin"));
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let header = format!("Bearer {}", token_with(&[]));
        let response = protected(AuthGuard::new(SECRET))
            .oneshot(request("/me", Some(&header)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "42:Ada");
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let response = protected(AuthGuard::new(SECRET))
            .oneshot(request("/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(response).await.message, "Invalid token header");
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let token = AuthToken::new("42", "Ada", vec![])
            .encode("some_other_secret_that_is_long_enough", 1)
            .unwrap();
        let header = format!("Bearer {token}");
        let response = protected(AuthGuard::new(SECRET))
            .oneshot(request("/me", Some(&header)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let token = AuthToken::new("42", "Ada", vec![]).encode(SECRET, -1).unwrap();
        let header = format!("Bearer {token}");
        let response = protected(AuthGuard::new(SECRET))
            .oneshot(request("/me", Some(&header)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(error_body(response).await.message.contains("expired"));
    }

    #[tokio::test]
    async fn test_role_check() {
        let guard = AuthGuard::new(SECRET).with_role("admin");

        let header = format!("Bearer {}", token_with(&["ADMIN"]));
        let response = protected(guard.clone())
            .oneshot(request("/me", Some(&header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let header = format!("Bearer {}", token_with(&["editor"]));
        let response = protected(guard)
            .oneshot(request("/me", Some(&header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(response).await.message, "Unauthorized");
    }

    #[tokio::test]
    async fn test_handler_level_forbidden() {
        let app = Router::new()
            .route("/profile", get(own_profile))
            .layer(middleware::from_fn_with_state(AuthGuard::new(SECRET), authenticate));

        let header = format!("Bearer {}", token_with(&[]));
        let response = app
            .clone()
            .oneshot(request("/profile", Some(&header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let other = AuthToken::new("7", "Grace", vec![]).encode(SECRET, 1).unwrap();
        let header = format!("Bearer {other}");
        let response = app.oneshot(request("/profile", Some(&header))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(error_body(response).await.code, "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_extractor_without_middleware() {
        let app = Router::new().route("/me", get(whoami));
        let response = app.oneshot(request("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_optional_authentication() {
        let header = format!("Bearer {}", token_with(&[]));
        let response = optional(AuthGuard::new(SECRET))
            .oneshot(request("/maybe", Some(&header)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "42");

        let response = optional(AuthGuard::new(SECRET))
            .oneshot(request("/maybe", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "anonymous");

        let response = optional(AuthGuard::new(SECRET))
            .oneshot(request("/maybe", Some("Bearer garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "anonymous");
    }
}
