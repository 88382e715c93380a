//! HTTP routes
//!
//! | Route           | Body                   | Success                                  |
//! |-----------------|------------------------|------------------------------------------|
//! | `POST /signup`  | `{username, password}` | 200 `{"username"}`                       |
//! | `POST /signin`  | `{username, password}` | 200 `{"username","expires_in"}` + cookie |
//! | `POST /signout` |                        | 200, cookie cleared                      |
//! | `GET /health`   |                        | 200 `OK`                                 |
//!
//! The session token travels in the `session_token` cookie. A signin that
//! resumes an active session does not set the cookie again.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::auth::{AuthService, SignIn};
use crate::config::HttpConfig;
use crate::error::{AuthError, ErrorKind, ErrorResponse, Result};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session_token";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    secure_cookies: bool,
}

impl AppState {
    pub fn new(auth: AuthService, http: &HttpConfig) -> Self {
        Self {
            auth,
            secure_cookies: http.secure_cookies,
        }
    }
}

/// Build the service router. Apply [`SecureRouter`](crate::SecureRouter) on top.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

// ============================================================================
// Request / Response Bodies
// ============================================================================

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub username: String,
    /// Seconds until the new session expires. Absent when resuming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<SignupResponse>> {
    let Json(credentials) = payload.map_err(|e| AuthError::weak_input(e.body_text()))?;

    state
        .auth
        .signup(&credentials.username, &credentials.password)
        .await?;

    Ok(Json(SignupResponse {
        username: credentials.username,
    }))
}

async fn signin(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Response> {
    let token = session_token(&headers);

    // A resumable session does not need a body, so decode errors only
    // matter once the credential path is taken
    let (credentials, rejection) = match payload {
        Ok(Json(credentials)) => (credentials, None),
        Err(rejection) => (
            Credentials {
                username: String::new(),
                password: String::new(),
            },
            Some(rejection),
        ),
    };

    let outcome = state
        .auth
        .signin(&credentials.username, &credentials.password, token.as_deref())
        .await
        .map_err(|err| match (err, rejection) {
            (AuthError::WeakInput(_), Some(rejection)) => {
                AuthError::weak_input(rejection.body_text())
            }
            (err, _) => err,
        })?;

    match outcome {
        SignIn::Resumed { username, .. } => Ok(Json(SigninResponse {
            username,
            expires_in: None,
        })
        .into_response()),
        SignIn::Issued(session) => {
            let cookie = session_cookie(
                &session.token,
                session.ttl,
                session.expires_at(),
                state.secure_cookies,
            )?;
            let body = SigninResponse {
                expires_in: Some(session.ttl.as_secs()),
                username: session.username,
            };
            Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
        }
    }
}

async fn signout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = session_token(&headers);
    state.auth.signout(token.as_deref()).await?;

    let cookie = cleared_cookie(state.secure_cookies)?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response())
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> Response {
    let kind = ErrorKind::NotFound;
    let body = ErrorResponse {
        error: kind.to_string(),
        message: "no such route".to_string(),
        details: None,
    };
    (kind.status_code(), Json(body)).into_response()
}

// ============================================================================
// Cookies
// ============================================================================

/// Extract the session token from the `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn session_cookie(
    token: &str,
    ttl: Duration,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; Expires={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE,
        token,
        ttl.as_secs(),
        http_date(expires_at)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AuthError::Internal(e.to_string()))
}

fn cleared_cookie(secure: bool) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}=; Path=/; Max-Age=0; Expires={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE,
        http_date(DateTime::<Utc>::UNIX_EPOCH)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AuthError::Internal(e.to_string()))
}
