//! Realm and Required Action Discovery

use async_trait::async_trait;
use tracing::info;

use super::{base_name, required, Discovery, RealmScope, RealmScopedDiscoverer, UNKNOWN_REMOTE_ID};
use crate::error::ImportError;
use crate::remote::{RealmRepresentation, RemoteClient, RequiredActionRepresentation};
use crate::resource::{ResourceKind, ResourceRecord};

/// Discovers all realms visible to the authenticated client
#[derive(Debug, Default, Clone, Copy)]
pub struct RealmDiscoverer;

impl RealmDiscoverer {
    pub async fn discover(&self, client: &dyn RemoteClient) -> Result<Discovery, ImportError> {
        let realms = client
            .list_realms()
            .await
            .map_err(|e| ImportError::remote("list_realms", "server", e))?;

        let records = realms
            .into_iter()
            .map(realm_record)
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = records.len(), "Discovered realms");
        Ok(Discovery::from_records(records))
    }
}

fn realm_record(realm: RealmRepresentation) -> Result<ResourceRecord, ImportError> {
    let kind = ResourceKind::Realm;
    let reported_id = realm.id.as_deref().unwrap_or(UNKNOWN_REMOTE_ID).to_string();
    let name = required(realm.realm, kind, &reported_id, "realm")?;

    Ok(ResourceRecord::new(kind, name.as_str(), base_name(kind, &[name.as_str()]))
        .attribute("realm", name.as_str())
        .optional_attribute("display_name", realm.display_name)
        .optional_attribute("enabled", realm.enabled))
}

/// Discovers the required actions configured in a realm
#[derive(Debug, Default, Clone, Copy)]
pub struct RequiredActionDiscoverer;

#[async_trait]
impl RealmScopedDiscoverer for RequiredActionDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RequiredAction
    }

    async fn discover(
        &self,
        client: &dyn RemoteClient,
        realm: &RealmScope,
    ) -> Result<Discovery, ImportError> {
        let actions = client
            .list_required_actions(&realm.name)
            .await
            .map_err(|e| ImportError::remote("list_required_actions", realm.to_string(), e))?;

        let records = actions
            .into_iter()
            .map(|action| required_action_record(realm, action))
            .collect::<Result<Vec<_>, _>>()?;

        info!(realm = %realm.name, count = records.len(), "Discovered required actions");
        Ok(Discovery::from_records(records))
    }
}

fn required_action_record(
    realm: &RealmScope,
    action: RequiredActionRepresentation,
) -> Result<ResourceRecord, ImportError> {
    let kind = ResourceKind::RequiredAction;
    let alias = required(
        action.alias,
        kind,
        &format!("{}/{}", realm.name, UNKNOWN_REMOTE_ID),
        "alias",
    )?;

    Ok(ResourceRecord::new(
        kind,
        format!("{}/{}", realm.name, alias),
        base_name(kind, &[realm.name.as_str(), alias.as_str()]),
    )
    .attribute("realm_id", realm.name.as_str())
    .attribute("alias", alias.as_str())
    .optional_attribute("name", action.name)
    .optional_attribute("enabled", action.enabled)
    .optional_attribute("default_action", action.default_action)
    .optional_attribute("priority", action.priority))
}
