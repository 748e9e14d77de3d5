//! HTTP surface.
//!
//! `/` and `/login` render the attribute page; `/login` additionally
//! requires an authenticated session, bouncing the browser to the IdP when
//! there is none. `/saml/metadata` and `/saml/acs` are the SP protocol
//! endpoints.

pub mod acs;
pub mod metadata;
pub mod pages;
pub mod session;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::saml::SamlProvider;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<SamlProvider>,
    pub sessions: Arc<SessionStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(pages::index))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_account,
        ))
        .route("/", get(pages::index))
        .route("/saml/metadata", get(metadata::sp_metadata))
        .route("/saml/acs", post(acs::assertion_consumer_service))
        // Outermost layer: runs before require_account on every route.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::attach_session,
        ))
        .with_state(state)
}
