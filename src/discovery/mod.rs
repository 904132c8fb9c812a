//! Keycloak Entity Discovery
//!
//! One discoverer per entity kind. Each lists remote entities through a
//! [`RemoteClient`], keeps a fixed subset of their fields and returns
//! [`ResourceRecord`]s plus the side maps the rewrite pass needs.
//!
//! ## Ordering
//!
//! Realms are discovered first; every other kind is scoped under a realm and
//! runs once per realm, see [`crate::importer::Importer`].

mod openid_client;
mod realm;

pub use openid_client::OpenidClientDiscoverer;
pub use realm::{RealmDiscoverer, RequiredActionDiscoverer};

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ImportError;
use crate::normalize::{join_name_parts, normalize_resource_name};
use crate::remote::RemoteClient;
use crate::resource::{ResourceKind, ResourceRecord};

/// Parent scope of realm-level entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealmScope {
    /// Realm name, as used in Admin API paths and `realm_id` attributes
    pub name: String,
}

impl RealmScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Scope of a discovered realm record
    pub fn from_record(record: &ResourceRecord) -> Self {
        Self::new(record.remote_id.clone())
    }
}

impl std::fmt::Display for RealmScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "realm {}", self.name)
    }
}

/// Client owning a service-account user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccountOwner {
    /// Remote ID of the owning client
    pub client_remote_id: String,
    /// `clientId` of the owning client
    pub client_id: String,
}

/// Service-account user ID -> owning client
///
/// Only consumed by the rewrite pass; never serialized into records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceAccountIndex {
    owners: BTreeMap<String, ServiceAccountOwner>,
}

impl ServiceAccountIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user_id: impl Into<String>, owner: ServiceAccountOwner) {
        self.owners.insert(user_id.into(), owner);
    }

    pub fn get(&self, user_id: &str) -> Option<&ServiceAccountOwner> {
        self.owners.get(user_id)
    }

    #[cfg(test)]
    pub(crate) fn contains_client(&self, client_remote_id: &str) -> bool {
        self.owners
            .values()
            .any(|owner| owner.client_remote_id == client_remote_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ServiceAccountOwner)> {
        self.owners.iter()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn extend(&mut self, other: ServiceAccountIndex) {
        self.owners.extend(other.owners);
    }
}

/// Output of one discoverer run
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub records: Vec<ResourceRecord>,
    pub service_accounts: ServiceAccountIndex,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ResourceRecord>) -> Self {
        Self {
            records,
            service_accounts: ServiceAccountIndex::new(),
        }
    }
}

/// Discoverer for entities living inside a realm
#[async_trait]
pub trait RealmScopedDiscoverer: Send + Sync {
    /// Primary kind produced by this discoverer
    fn kind(&self) -> ResourceKind;

    /// Discover all entities of this kind in `realm`. Any remote failure
    /// aborts the whole discovery.
    async fn discover(
        &self,
        client: &dyn RemoteClient,
        realm: &RealmScope,
    ) -> Result<Discovery, ImportError>;
}

/// Base symbolic name: kind prefix followed by normalized name parts
pub(crate) fn base_name(kind: ResourceKind, parts: &[&str]) -> String {
    let normalized: Vec<String> = parts.iter().map(|p| normalize_resource_name(p)).collect();
    join_name_parts(
        std::iter::once(kind.name_prefix()).chain(normalized.iter().map(String::as_str)),
    )
}

/// Unwrap a structurally required remote field
pub(crate) fn required<T>(
    value: Option<T>,
    kind: ResourceKind,
    remote_id: &str,
    field: &'static str,
) -> Result<T, ImportError> {
    value.ok_or_else(|| ImportError::missing_field(kind, remote_id, field))
}

/// Remote ID to report when the ID field itself is missing
pub(crate) const UNKNOWN_REMOTE_ID: &str = "<unknown>";
