//! SAML service-provider plumbing.
//!
//! SP-initiated SSO over the HTTP-Redirect binding, assertion validation via
//! `samael`, and SP/IdP metadata handling.

pub mod config;
pub mod keys;
pub mod metadata;
pub mod provider;

pub use config::SamlConfig;
pub use keys::load_key_pair;
pub use metadata::{fetch_idp_metadata, sp_metadata_xml, IdpMetadata};
pub use provider::{ProcessedAssertion, SamlProvider};
