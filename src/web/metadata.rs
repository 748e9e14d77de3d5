//! SP metadata endpoint.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use super::AppState;
use crate::saml::sp_metadata_xml;

/// Serve this SP's metadata document for IdPs to consume.
pub async fn sp_metadata(State(state): State<AppState>) -> Response {
    match sp_metadata_xml(state.provider.config()) {
        Ok(xml) => (
            [(header::CONTENT_TYPE, "application/samlmetadata+xml")],
            xml,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to generate SP metadata");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
