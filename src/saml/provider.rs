//! SAML service provider.
//!
//! Builds authentication requests for the HTTP-Redirect binding and
//! validates responses posted to the assertion consumer endpoint.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::config::SamlConfig;
use super::metadata::IdpMetadata;
use crate::session::{Session, SessionStore};

pub struct SamlProvider {
    config: SamlConfig,
    idp: IdpMetadata,
}

impl SamlProvider {
    pub fn new(config: SamlConfig, idp: IdpMetadata) -> Result<Self> {
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(Self { config, idp })
    }

    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    /// Create an AuthnRequest and return the IdP redirect URL carrying it.
    pub fn create_authn_request(&self, relay_state: Option<&str>) -> Result<String> {
        let request_id = format!("_id{}", uuid::Uuid::new_v4());
        let issue_instant = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let authn_request = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
                xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                ID="{}"
                Version="2.0"
                IssueInstant="{}"
                Destination="{}"
                AssertionConsumerServiceURL="{}">
                <saml:Issuer>{}</saml:Issuer>
            </samlp:AuthnRequest>"#,
            request_id, issue_instant, self.idp.sso_url, self.config.acs_url, self.config.entity_id
        );

        let encoded = deflate_and_encode(&authn_request)?;

        let mut url = format!(
            "{}?SAMLRequest={}",
            self.idp.sso_url,
            urlencoding::encode(&encoded)
        );
        if let Some(state) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(state)));
        }

        debug!(url = %url, "created AuthnRequest redirect");
        Ok(url)
    }

    /// Validate a base64 SAML response from the IdP ACS POST and extract the
    /// subject and attributes.
    ///
    /// IdP-initiated responses are accepted; replayed assertions are not.
    pub fn process_response(
        &self,
        saml_response: &str,
        session_store: &SessionStore,
    ) -> Result<ProcessedAssertion> {
        let response_xml = BASE64
            .decode(saml_response)
            .context("failed to decode SAML response")?;
        let response_str =
            String::from_utf8(response_xml).context("SAML response is not valid UTF-8")?;

        debug!("processing SAML response");

        let response: samael::schema::Response = response_str
            .parse()
            .context("failed to parse SAML response")?;

        if let Some(ref status) = response.status {
            let status_value = status.status_code.value.as_deref();
            if status_value != Some("urn:oasis:names:tc:SAML:2.0:status:Success") {
                let message = status
                    .status_message
                    .as_ref()
                    .and_then(|m| m.value.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(anyhow!("IdP reported authentication failure: {}", message));
            }
        }

        let assertion = response
            .assertion
            .as_ref()
            .ok_or_else(|| anyhow!("SAML response contains no assertion"))?;

        let now = Utc::now();
        let skew = Duration::seconds(self.config.clock_skew_secs);
        if let Some(ref conditions) = assertion.conditions {
            if let Some(not_before) = conditions.not_before {
                if now < not_before - skew {
                    return Err(anyhow!("SAML assertion not yet valid"));
                }
            }
            if let Some(not_on_or_after) = conditions.not_on_or_after {
                if now >= not_on_or_after + skew {
                    return Err(anyhow!("SAML assertion has expired"));
                }
            }
        }

        let assertion_id = assertion.id.clone();
        if session_store.is_assertion_used(&assertion_id)? {
            return Err(anyhow!("SAML assertion replay detected"));
        }

        let subject = assertion
            .subject
            .as_ref()
            .ok_or_else(|| anyhow!("SAML assertion missing subject"))?;
        let name_id = subject
            .name_id
            .as_ref()
            .ok_or_else(|| anyhow!("SAML assertion missing NameID"))?;

        let user_id = name_id.value.clone();
        let name_id_format = name_id.format.clone();

        let session_index = assertion
            .authn_statements
            .as_ref()
            .and_then(|stmts| stmts.first())
            .and_then(|s| s.session_index.clone());

        let idp_entity_id = assertion
            .issuer
            .value
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        // Attribute values keep the order they appear in the assertion.
        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(ref attr_statements) = assertion.attribute_statements {
            for attr_statement in attr_statements {
                for attr in &attr_statement.attributes {
                    if let Some(ref name) = attr.name {
                        let values: Vec<String> = attr
                            .values
                            .iter()
                            .filter_map(|v| v.value.clone())
                            .collect();
                        if !values.is_empty() {
                            attributes.insert(name.clone(), values);
                        }
                    }
                }
            }
        }

        info!(
            user_id = %user_id,
            idp = %idp_entity_id,
            attributes = attributes.len(),
            "SAML assertion validated"
        );

        Ok(ProcessedAssertion {
            user_id,
            name_id_format,
            assertion_id,
            idp_entity_id,
            session_index,
            attributes,
        })
    }

    /// Mint and persist a session from a processed assertion.
    pub fn create_session(
        &self,
        assertion: ProcessedAssertion,
        session_store: &SessionStore,
    ) -> Result<Session> {
        let mut session = Session::new(
            assertion.user_id,
            assertion.assertion_id,
            assertion.idp_entity_id,
            self.config.session_ttl_secs,
        );
        session.name_id_format = assertion.name_id_format;
        session.session_index = assertion.session_index;
        session.attributes = assertion.attributes;

        session_store.create(session.clone())?;

        Ok(session)
    }
}

/// Result of validating one SAML assertion.
#[derive(Debug)]
pub struct ProcessedAssertion {
    pub user_id: String,
    pub name_id_format: Option<String>,
    pub assertion_id: String,
    pub idp_entity_id: String,
    pub session_index: Option<String>,
    pub attributes: HashMap<String, Vec<String>>,
}

/// Deflate and base64 encode per the HTTP-Redirect binding.
fn deflate_and_encode(xml: &str) -> Result<String> {
    use std::io::Write;

    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(xml.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(BASE64.encode(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> SamlProvider {
        let config = SamlConfig {
            entity_id: "urn:example:saml-sp".to_string(),
            acs_url: "https://sp.example.com/saml/acs".to_string(),
            certificate_der: vec![0x30, 0x82],
            ..Default::default()
        };
        let idp = IdpMetadata {
            entity_id: "https://idp.example.com".to_string(),
            sso_url: "https://idp.example.com/sso".to_string(),
        };
        SamlProvider::new(config, idp).unwrap()
    }

    #[test]
    fn test_provider_rejects_incomplete_config() {
        let idp = IdpMetadata {
            entity_id: "https://idp.example.com".to_string(),
            sso_url: "https://idp.example.com/sso".to_string(),
        };
        assert!(SamlProvider::new(SamlConfig::default(), idp).is_err());
    }

    #[test]
    fn test_create_authn_request() {
        let provider = test_provider();

        let url = provider.create_authn_request(Some("/dashboard")).unwrap();
        assert!(url.starts_with("https://idp.example.com/sso?"));
        assert!(url.contains("SAMLRequest="));
        assert!(url.contains("RelayState="));
    }

    #[test]
    fn test_authn_request_without_relay_state() {
        let provider = test_provider();

        let url = provider.create_authn_request(None).unwrap();
        assert!(url.contains("SAMLRequest="));
        assert!(!url.contains("RelayState="));
    }

    #[test]
    fn test_deflate_and_encode_roundtrip() {
        use std::io::Read;

        let encoded = deflate_and_encode("<samlp:AuthnRequest/>").unwrap();
        let compressed = BASE64.decode(encoded).unwrap();

        let mut decoder = flate2::read::DeflateDecoder::new(compressed.as_slice());
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, "<samlp:AuthnRequest/>");
    }
}
