//! Request-scoped session context.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::AppState;
use crate::session::{Session, SessionId};

/// Look up the session named by the request's cookie and attach it to the
/// request extensions. Requests without a live session pass through
/// unchanged.
pub async fn attach_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(session) = session_from_headers(&state, &request) {
        request.extensions_mut().insert(session);
    }
    next.run(request).await
}

/// Gate a handler behind authentication: without a session, redirect the
/// browser into the SAML flow, carrying the original URI as RelayState.
pub async fn require_account(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Session>().is_some() {
        return next.run(request).await;
    }

    let original_uri = request.uri().to_string();
    debug!(uri = %original_uri, "no session, starting SAML flow");

    match state.provider.create_authn_request(Some(&original_uri)) {
        Ok(redirect_url) => {
            (StatusCode::FOUND, [(header::LOCATION, redirect_url)]).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to create SAML authentication request");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn session_from_headers(state: &AppState, request: &Request) -> Option<Session> {
    let cookie_header = request.headers().get(header::COOKIE)?.to_str().ok()?;
    let session_id_str = state
        .provider
        .config()
        .parse_session_cookie(cookie_header)?;
    let session_id = SessionId::from_hex(&session_id_str)?;

    match state.sessions.get(session_id) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "session lookup failed");
            None
        }
    }
}
