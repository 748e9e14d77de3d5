//! SP and IdP metadata documents.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use samael::key_info::{KeyInfo, X509Data};
use samael::metadata::{
    EntityDescriptor, IndexedEndpoint, KeyDescriptor, SpSsoDescriptor, HTTP_POST_BINDING,
    HTTP_REDIRECT_BINDING,
};
use std::time::Duration;
use tracing::debug;

use super::config::SamlConfig;

/// What this SP needs from the IdP's metadata document.
#[derive(Debug, Clone)]
pub struct IdpMetadata {
    /// Entity ID of the IdP.
    pub entity_id: String,

    /// SingleSignOnService location for the HTTP-Redirect binding.
    pub sso_url: String,
}

/// Fetch and parse the IdP metadata document.
pub async fn fetch_idp_metadata(url: &str) -> Result<IdpMetadata> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to create HTTP client")?;

    debug!(url = %url, "fetching IdP metadata");

    let response = client
        .get(url)
        .send()
        .await
        .context("failed to fetch IdP metadata")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "IdP metadata endpoint returned status {}",
            response.status()
        ));
    }

    let metadata_xml = response
        .text()
        .await
        .context("failed to read IdP metadata response")?;

    let entity: EntityDescriptor = metadata_xml
        .parse()
        .context("failed to parse IdP metadata XML")?;

    extract_idp_metadata(&entity)
}

/// Pull the SSO endpoint out of a parsed EntityDescriptor. Prefers the
/// HTTP-Redirect binding, which is what the authentication request uses.
fn extract_idp_metadata(entity: &EntityDescriptor) -> Result<IdpMetadata> {
    let entity_id = entity
        .entity_id
        .clone()
        .ok_or_else(|| anyhow!("IdP metadata missing entityID"))?;

    let idp_descriptor = entity
        .idp_sso_descriptors
        .as_ref()
        .and_then(|d| d.first())
        .ok_or_else(|| anyhow!("IdP metadata missing IDPSSODescriptor"))?;

    let sso_url = idp_descriptor
        .single_sign_on_services
        .iter()
        .find(|s| s.binding == HTTP_REDIRECT_BINDING)
        .or_else(|| idp_descriptor.single_sign_on_services.first())
        .map(|s| s.location.clone())
        .ok_or_else(|| anyhow!("IdP metadata missing SingleSignOnService"))?;

    Ok(IdpMetadata { entity_id, sso_url })
}

/// Build this SP's EntityDescriptor: the signing certificate and the
/// assertion consumer endpoint.
fn sp_entity_descriptor(config: &SamlConfig) -> EntityDescriptor {
    let key_descriptor = KeyDescriptor {
        key_use: Some("signing".to_string()),
        key_info: KeyInfo {
            id: None,
            x509_data: Some(X509Data {
                certificates: vec![BASE64.encode(&config.certificate_der)],
            }),
        },
        encryption_methods: None,
    };

    let sp_descriptor = SpSsoDescriptor {
        authn_requests_signed: Some(false),
        want_assertions_signed: Some(true),
        protocol_support_enumeration: Some("urn:oasis:names:tc:SAML:2.0:protocol".to_string()),
        key_descriptors: Some(vec![key_descriptor]),
        name_id_formats: Some(vec![
            "urn:oasis:names:tc:SAML:2.0:nameid-format:transient".to_string(),
        ]),
        assertion_consumer_services: vec![IndexedEndpoint {
            binding: HTTP_POST_BINDING.to_string(),
            location: config.acs_url.clone(),
            response_location: None,
            index: 0,
            is_default: Some(true),
        }],
        ..Default::default()
    };

    EntityDescriptor {
        entity_id: Some(config.entity_id.clone()),
        sp_sso_descriptors: Some(vec![sp_descriptor]),
        ..Default::default()
    }
}

/// Serialize the SP metadata document.
pub fn sp_metadata_xml(config: &SamlConfig) -> Result<String> {
    let entity = sp_entity_descriptor(config);
    let xml = entity.to_xml().map_err(|e| anyhow!("{e}"))?;
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDP_METADATA_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://idp.example.com/idp">
  <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://idp.example.com/sso/post"/>
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="https://idp.example.com/sso/redirect"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#;

    fn test_config() -> SamlConfig {
        SamlConfig {
            entity_id: "urn:example:saml-sp".to_string(),
            acs_url: "http://localhost:8000/saml/acs".to_string(),
            certificate_der: vec![0x30, 0x82, 0x01, 0x0a],
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_prefers_redirect_binding() {
        let entity: EntityDescriptor = IDP_METADATA_XML.parse().unwrap();
        let idp = extract_idp_metadata(&entity).unwrap();

        assert_eq!(idp.entity_id, "https://idp.example.com/idp");
        assert_eq!(idp.sso_url, "https://idp.example.com/sso/redirect");
    }

    #[test]
    fn test_extract_rejects_sp_only_metadata() {
        let entity = sp_entity_descriptor(&test_config());
        assert!(extract_idp_metadata(&entity).is_err());
    }

    #[test]
    fn test_sp_metadata_document() {
        let xml = sp_metadata_xml(&test_config()).unwrap();

        assert!(xml.contains("urn:example:saml-sp"));
        assert!(xml.contains("http://localhost:8000/saml/acs"));
        assert!(xml.contains(HTTP_POST_BINDING));
    }
}
