//! Session types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::AttributeSource;

/// Session identifier: 16 random bytes, hex-encoded in cookies and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn new() -> Self {
        Self(rand::random())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An authenticated session derived from one validated SAML assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// User identifier from the assertion's NameID.
    pub user_id: String,

    /// NameID format URN, when the IdP supplied one.
    pub name_id_format: Option<String>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Attribute name to ordered values, as asserted by the IdP.
    pub attributes: HashMap<String, Vec<String>>,

    /// ID of the assertion this session was minted from; recorded so the
    /// same assertion cannot mint a second session.
    pub assertion_id: String,

    /// Entity ID of the issuing IdP.
    pub idp_entity_id: String,

    /// SessionIndex from the assertion's AuthnStatement, if present.
    pub session_index: Option<String>,
}

impl Session {
    pub fn new(
        user_id: String,
        assertion_id: String,
        idp_entity_id: String,
        ttl_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            name_id_format: None,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
            attributes: HashMap::new(),
            assertion_id,
            idp_entity_id,
            session_index: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl AttributeSource for Session {
    fn saml_attributes(&self) -> &HashMap<String, Vec<String>> {
        &self.attributes
    }
}
