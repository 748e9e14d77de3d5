//! Attribute extraction and ordering.

use std::collections::HashMap;

/// A named, multi-valued attribute asserted by the IdP.
///
/// Values keep the order the attribute source produced them in; they are
/// never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

/// Capability interface for session types that carry SAML attributes.
///
/// A session type that does not implement this (or the absence of a session
/// altogether) renders the same as an empty attribute set.
pub trait AttributeSource {
    /// Mapping from attribute name to its ordered values.
    fn saml_attributes(&self) -> &HashMap<String, Vec<String>>;
}

impl AttributeSource for HashMap<String, Vec<String>> {
    fn saml_attributes(&self) -> &HashMap<String, Vec<String>> {
        self
    }
}

/// Normalize an optional attribute source into a sorted attribute list.
///
/// Sorted ascending by name, case-insensitively. Names that collide after
/// lowercasing fall back to an exact comparison so the result does not depend
/// on map iteration order.
pub fn collect_attributes(source: Option<&dyn AttributeSource>) -> Vec<Attribute> {
    let Some(source) = source else {
        return Vec::new();
    };

    let mapping = source.saml_attributes();
    let mut result: Vec<Attribute> = mapping
        .iter()
        .map(|(name, values)| Attribute {
            name: name.clone(),
            values: values.clone(),
        })
        .collect();

    result.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    result
}
