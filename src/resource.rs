//! Resource Records
//!
//! The normalized, provider-agnostic representation of one discovered
//! Keycloak entity, plus the explicit attribute schema of every kind.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Kind of discovered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Realm,
    RequiredAction,
    OpenidClient,
    OpenidClientServiceAccountRole,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Realm,
        ResourceKind::RequiredAction,
        ResourceKind::OpenidClient,
        ResourceKind::OpenidClientServiceAccountRole,
    ];

    /// Terraform resource type emitted for this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Realm => "keycloak_realm",
            ResourceKind::RequiredAction => "keycloak_required_action",
            ResourceKind::OpenidClient => "keycloak_openid_client",
            ResourceKind::OpenidClientServiceAccountRole => {
                "keycloak_openid_client_service_account_role"
            }
        }
    }

    /// Prefix of every symbolic name of this kind
    pub fn name_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Realm => "realm",
            ResourceKind::RequiredAction => "required_action",
            ResourceKind::OpenidClient => "openid_client",
            ResourceKind::OpenidClientServiceAccountRole => "openid_client_service_account_role",
        }
    }

    /// Mapped attributes of this kind. Remote fields not listed here are dropped.
    pub fn schema(&self) -> &'static [AttributeSpec] {
        match self {
            ResourceKind::Realm => REALM_SCHEMA,
            ResourceKind::RequiredAction => REQUIRED_ACTION_SCHEMA,
            ResourceKind::OpenidClient => OPENID_CLIENT_SCHEMA,
            ResourceKind::OpenidClientServiceAccountRole => SERVICE_ACCOUNT_ROLE_SCHEMA,
        }
    }

    /// Attributes allowed to serialize as empty values
    pub fn allow_empty_values(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::OpenidClient => &["web_origins"],
            _ => &[],
        }
    }

    /// Look up one attribute of the schema
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeSpec> {
        self.schema().iter().find(|spec| spec.name == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Field of a target record a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceField {
    Id,
    ServiceAccountUserId,
}

impl ReferenceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceField::Id => "id",
            ReferenceField::ServiceAccountUserId => "service_account_user_id",
        }
    }
}

/// Target of a foreign-key attribute: which kind, and which field of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceTarget {
    pub kind: ResourceKind,
    pub field: ReferenceField,
}

/// How the rewrite pass treats an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    /// Copied through untouched
    Plain,
    /// Human-written text; reserved interpolation markers get escaped
    FreeText,
    /// Holds the raw remote ID of another record
    ForeignKey(ReferenceTarget),
}

/// One entry of a kind's attribute schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub role: AttributeRole,
}

impl AttributeSpec {
    const fn plain(name: &'static str) -> Self {
        Self {
            name,
            role: AttributeRole::Plain,
        }
    }

    const fn free_text(name: &'static str) -> Self {
        Self {
            name,
            role: AttributeRole::FreeText,
        }
    }

    const fn foreign_key(name: &'static str, kind: ResourceKind, field: ReferenceField) -> Self {
        Self {
            name,
            role: AttributeRole::ForeignKey(ReferenceTarget { kind, field }),
        }
    }
}

const REALM_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::plain("realm"),
    AttributeSpec::free_text("display_name"),
    AttributeSpec::plain("enabled"),
];

const REQUIRED_ACTION_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::foreign_key("realm_id", ResourceKind::Realm, ReferenceField::Id),
    AttributeSpec::plain("alias"),
    AttributeSpec::free_text("name"),
    AttributeSpec::plain("enabled"),
    AttributeSpec::plain("default_action"),
    AttributeSpec::plain("priority"),
];

const OPENID_CLIENT_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::foreign_key("realm_id", ResourceKind::Realm, ReferenceField::Id),
    AttributeSpec::plain("client_id"),
    AttributeSpec::free_text("name"),
    AttributeSpec::free_text("description"),
    AttributeSpec::plain("enabled"),
    AttributeSpec::plain("access_type"),
    AttributeSpec::plain("service_accounts_enabled"),
    AttributeSpec::plain("valid_redirect_uris"),
    AttributeSpec::plain("web_origins"),
];

const SERVICE_ACCOUNT_ROLE_SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::foreign_key("realm_id", ResourceKind::Realm, ReferenceField::Id),
    AttributeSpec::foreign_key(
        "service_account_user_id",
        ResourceKind::OpenidClient,
        ReferenceField::ServiceAccountUserId,
    ),
    AttributeSpec::foreign_key("client_id", ResourceKind::OpenidClient, ReferenceField::Id),
    AttributeSpec::plain("role"),
];

/// Opaque pointer to another record; the serializer decides its syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolicReference {
    pub kind: ResourceKind,
    pub name: String,
    pub field: ReferenceField,
}

/// Value of one record attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Raw value as read from the remote entity
    Text(String),
    /// Free text with interpolation markers already escaped
    Escaped(String),
    /// Ordered list of raw values
    List(Vec<String>),
    /// Rewritten foreign key
    Reference(SymbolicReference),
}

impl AttributeValue {
    /// Whether the value would serialize as empty
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Text(s) | AttributeValue::Escaped(s) => s.is_empty(),
            AttributeValue::List(items) => items.is_empty(),
            AttributeValue::Reference(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

/// One discovered entity, ready for serialization after the rewrite pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    /// Identifier assigned by Keycloak, unique within `kind`
    pub remote_id: String,
    /// Resource name in the emitted configuration, unique across the run
    pub symbolic_name: String,
    pub kind: ResourceKind,
    pub attributes: BTreeMap<&'static str, AttributeValue>,
    pub allow_empty: BTreeSet<&'static str>,
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

impl ResourceRecord {
    /// Create a record with no attributes yet
    pub fn new(
        kind: ResourceKind,
        remote_id: impl Into<String>,
        symbolic_name: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            symbolic_name: symbolic_name.into(),
            kind,
            attributes: BTreeMap::new(),
            allow_empty: kind.allow_empty_values().iter().copied().collect(),
            extra_fields: BTreeMap::new(),
        }
    }

    /// Set a schema attribute
    ///
    /// Panics in debug builds if `name` is not part of the kind's schema.
    pub fn attribute(mut self, name: &'static str, value: impl Into<AttributeValue>) -> Self {
        debug_assert!(
            self.kind.attribute(name).is_some(),
            "{} has no attribute {}",
            self.kind,
            name
        );
        self.attributes.insert(name, value.into());
        self
    }

    /// Set an optional schema attribute, skipping `None`
    pub fn optional_attribute<V: Into<AttributeValue>>(
        self,
        name: &'static str,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.attribute(name, value),
            None => self,
        }
    }

    /// Add a synthetic field not sourced from the remote entity
    pub fn extra_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Raw text of an attribute, `None` once rewritten or when absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_text)
    }

    /// Symbolic reference pointing at `field` of this record
    pub fn reference(&self, field: ReferenceField) -> SymbolicReference {
        SymbolicReference {
            kind: self.kind,
            name: self.symbolic_name.clone(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_type_names() {
        assert_eq!(ResourceKind::Realm.to_string(), "keycloak_realm");
        assert_eq!(
            ResourceKind::OpenidClientServiceAccountRole.type_name(),
            "keycloak_openid_client_service_account_role"
        );
    }

    #[test]
    fn test_schema_foreign_keys_are_fixed_per_kind() {
        let spec = ResourceKind::OpenidClientServiceAccountRole
            .attribute("service_account_user_id")
            .unwrap();
        assert_eq!(
            spec.role,
            AttributeRole::ForeignKey(ReferenceTarget {
                kind: ResourceKind::OpenidClient,
                field: ReferenceField::ServiceAccountUserId,
            })
        );

        assert!(ResourceKind::Realm.attribute("realm_id").is_none());
        assert_eq!(
            ResourceKind::OpenidClient.attribute("name").unwrap().role,
            AttributeRole::FreeText
        );
    }

    #[test]
    fn test_schema_names_are_unique() {
        for kind in ResourceKind::ALL {
            let mut seen = BTreeSet::new();
            for spec in kind.schema() {
                assert!(seen.insert(spec.name), "{} repeats {}", kind, spec.name);
            }
            for name in kind.allow_empty_values() {
                assert!(kind.attribute(name).is_some());
            }
        }
    }

    #[test]
    fn test_record_builder() {
        let record = ResourceRecord::new(
            ResourceKind::OpenidClient,
            "uuid-1",
            "openid_client_master_app",
        )
            .attribute("client_id", "app")
            .attribute("enabled", true)
            .attribute("web_origins", Vec::<String>::new())
            .optional_attribute::<String>("description", None);

        assert_eq!(record.text("client_id"), Some("app"));
        assert_eq!(record.text("enabled"), Some("true"));
        assert!(record.get("description").is_none());
        assert!(record.get("web_origins").unwrap().is_empty());
        assert!(record.allow_empty.contains("web_origins"));
    }

    #[test]
    fn test_record_reference() {
        let record = ResourceRecord::new(ResourceKind::Realm, "master", "realm_master");
        let reference = record.reference(ReferenceField::Id);
        assert_eq!(reference.kind, ResourceKind::Realm);
        assert_eq!(reference.name, "realm_master");
        assert_eq!(reference.field, ReferenceField::Id);
    }
}
