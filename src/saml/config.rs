//! Service-provider configuration.

/// SP configuration, assembled once at startup from the command line and the
/// loaded key pair.
#[derive(Debug, Clone)]
pub struct SamlConfig {
    /// SP Entity ID (unique identifier for this service provider).
    pub entity_id: String,

    /// Assertion Consumer Service URL (where the IdP posts SAML responses).
    pub acs_url: String,

    /// SP certificate, DER bytes, published in SP metadata.
    pub certificate_der: Vec<u8>,

    /// Session TTL in seconds.
    pub session_ttl_secs: u64,

    /// Clock skew tolerance for assertion validity windows, in seconds.
    pub clock_skew_secs: i64,

    /// Cookie name for the session ID.
    pub session_cookie_name: String,

    /// Cookie path.
    pub cookie_path: String,

    /// Set the Secure flag (off for plain-HTTP development listeners).
    pub cookie_secure: bool,

    /// Set the HttpOnly flag.
    pub cookie_http_only: bool,

    /// SameSite attribute value.
    pub cookie_same_site: String,
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            acs_url: String::new(),
            certificate_der: Vec::new(),
            session_ttl_secs: 8 * 60 * 60,
            clock_skew_secs: 300,
            session_cookie_name: "saml_sp_session".to_string(),
            cookie_path: "/".to_string(),
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: "Lax".to_string(),
        }
    }
}

impl SamlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.entity_id.is_empty() {
            return Err("entity_id is required".to_string());
        }
        if self.acs_url.is_empty() {
            return Err("acs_url is required".to_string());
        }
        if self.certificate_der.is_empty() {
            return Err("certificate is required".to_string());
        }
        Ok(())
    }

    /// Build the Set-Cookie value carrying a session ID.
    pub fn build_cookie(&self, session_id: &str) -> String {
        let mut cookie = format!("{}={}", self.session_cookie_name, session_id);

        cookie.push_str(&format!("; Path={}", self.cookie_path));
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str(&format!("; SameSite={}", self.cookie_same_site));
        cookie.push_str(&format!("; Max-Age={}", self.session_ttl_secs));

        cookie
    }

    /// Extract the session ID from a Cookie header, if present.
    pub fn parse_session_cookie(&self, cookie_header: &str) -> Option<String> {
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix(&format!("{}=", self.session_cookie_name)) {
                return Some(value.to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SamlConfig {
        SamlConfig {
            entity_id: "urn:example:saml-sp".to_string(),
            acs_url: "https://sp.example.com/saml/acs".to_string(),
            certificate_der: vec![0x30, 0x82],
            ..Default::default()
        }
    }

    #[test]
    fn test_validation() {
        let mut config = SamlConfig::default();
        assert!(config.validate().is_err());

        config.entity_id = "urn:example:saml-sp".to_string();
        assert!(config.validate().is_err());

        config.acs_url = "https://sp.example.com/saml/acs".to_string();
        assert!(config.validate().is_err());

        config.certificate_der = vec![0x30];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cookie_building() {
        let config = test_config();
        let cookie = config.build_cookie("abc123");

        assert!(cookie.starts_with("saml_sp_session=abc123"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=28800"));
    }

    #[test]
    fn test_insecure_cookie_omits_secure_flag() {
        let mut config = test_config();
        config.cookie_secure = false;
        assert!(!config.build_cookie("abc").contains("Secure"));
    }

    #[test]
    fn test_cookie_parsing() {
        let config = test_config();
        let header = "other=value; saml_sp_session=abc123def456; another=test";
        assert_eq!(
            config.parse_session_cookie(header),
            Some("abc123def456".to_string())
        );
        assert_eq!(config.parse_session_cookie("no_session=here"), None);
    }
}
