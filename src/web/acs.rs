//! Assertion consumer service endpoint.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;

/// HTTP-POST binding form body.
#[derive(Debug, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Consume the IdP's SAML response: validate it, mint a session, set the
/// session cookie and send the browser back to where it started.
pub async fn assertion_consumer_service(
    State(state): State<AppState>,
    Form(form): Form<AcsForm>,
) -> Response {
    let Some(saml_response) = form.saml_response else {
        return (StatusCode::BAD_REQUEST, "missing SAMLResponse").into_response();
    };

    let assertion = match state
        .provider
        .process_response(&saml_response, &state.sessions)
    {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "SAML assertion validation failed");
            return (StatusCode::UNAUTHORIZED, "SAML authentication failed").into_response();
        }
    };

    let session = match state.provider.create_session(assertion, &state.sessions) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to create session");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to create session")
                .into_response();
        }
    };

    info!(
        user_id = %session.user_id,
        session_id = %session.id,
        "SAML authentication successful, session created"
    );

    let cookie = state.provider.config().build_cookie(&session.id.to_hex());
    let location = form.relay_state.unwrap_or_else(|| "/".to_string());

    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, location),
        ],
    )
        .into_response()
}
