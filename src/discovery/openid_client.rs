//! OpenID Client Discovery
//!
//! Discovers the OpenID Connect clients of a realm. For every client with
//! service accounts enabled it also resolves the service-account user and
//! emits one `keycloak_openid_client_service_account_role` record per client
//! role granted to that user.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{
    base_name, required, Discovery, RealmScope, RealmScopedDiscoverer, ServiceAccountIndex,
    ServiceAccountOwner, UNKNOWN_REMOTE_ID,
};
use crate::error::ImportError;
use crate::remote::{ClientRepresentation, ClientRoleBinding, RemoteClient};
use crate::resource::{ResourceKind, ResourceRecord};

/// Clients Keycloak creates in every realm
const BUILTIN_CLIENT_IDS: &[&str] = &[
    "account",
    "account-console",
    "admin-cli",
    "broker",
    "realm-management",
    "security-admin-console",
];

/// Master realm holds one `<realm>-realm` management client per realm
const MASTER_REALM: &str = "master";

/// Whether Keycloak created the client itself
///
/// Built-in clients cannot be created, so their resources carry `import = true`.
pub fn is_builtin_client(realm: &str, client_id: &str) -> bool {
    BUILTIN_CLIENT_IDS.contains(&client_id)
        || (realm == MASTER_REALM && client_id.ends_with("-realm"))
}

/// Terraform `access_type` of a client
fn access_type(client: &ClientRepresentation) -> &'static str {
    if client.bearer_only == Some(true) {
        "BEARER-ONLY"
    } else if client.public_client == Some(true) {
        "PUBLIC"
    } else {
        "CONFIDENTIAL"
    }
}

/// Discovers OpenID clients and their service-account role bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenidClientDiscoverer;

impl OpenidClientDiscoverer {
    /// Resolve the service-account user of a client and its role bindings
    async fn discover_service_account(
        &self,
        client: &dyn RemoteClient,
        realm: &RealmScope,
        owner: &ServiceAccountOwner,
    ) -> Result<(String, Vec<ResourceRecord>), ImportError> {
        let scope = format!("{} client {}", realm, owner.client_id);

        let user = client
            .get_service_account_user(&realm.name, &owner.client_remote_id)
            .await
            .map_err(|e| ImportError::remote("get_service_account_user", scope.clone(), e))?;

        let user_id = required(
            user.id,
            ResourceKind::OpenidClient,
            &owner.client_remote_id,
            "serviceAccountUser.id",
        )?;

        debug!(
            realm = %realm.name,
            client_id = %owner.client_id,
            user_id = %user_id,
            "Resolved service-account user"
        );

        let bindings = client
            .list_role_bindings_for_principal(&realm.name, &user_id)
            .await
            .map_err(|e| ImportError::remote("list_role_bindings_for_principal", scope, e))?;

        let records = bindings
            .into_iter()
            .map(|binding| service_account_role_record(realm, &user_id, owner, binding))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((user_id, records))
    }
}

#[async_trait]
impl RealmScopedDiscoverer for OpenidClientDiscoverer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::OpenidClient
    }

    async fn discover(
        &self,
        client: &dyn RemoteClient,
        realm: &RealmScope,
    ) -> Result<Discovery, ImportError> {
        let clients = client
            .list_clients_for_realm(&realm.name)
            .await
            .map_err(|e| ImportError::remote("list_clients_for_realm", realm.to_string(), e))?;

        let mut discovery = Discovery::new();
        let mut role_records = Vec::new();

        for rep in clients.into_iter().filter(ClientRepresentation::is_openid_connect) {
            let service_accounts_enabled = rep.service_accounts_enabled == Some(true);
            let record = openid_client_record(realm, rep)?;

            if service_accounts_enabled {
                let owner = ServiceAccountOwner {
                    client_remote_id: record.remote_id.clone(),
                    client_id: record.text("client_id").unwrap_or_default().to_string(),
                };
                let (user_id, records) = self
                    .discover_service_account(client, realm, &owner)
                    .await?;
                discovery.service_accounts.insert(user_id, owner);
                role_records.extend(records);
            }

            discovery.records.push(record);
        }

        info!(
            realm = %realm.name,
            clients = discovery.records.len(),
            service_accounts = discovery.service_accounts.len(),
            service_account_roles = role_records.len(),
            "Discovered OpenID clients"
        );

        discovery.records.extend(role_records);
        Ok(discovery)
    }
}

fn openid_client_record(
    realm: &RealmScope,
    rep: ClientRepresentation,
) -> Result<ResourceRecord, ImportError> {
    let kind = ResourceKind::OpenidClient;
    let access_type = access_type(&rep);
    let id = required(rep.id, kind, UNKNOWN_REMOTE_ID, "id")?;
    let client_id = required(rep.client_id, kind, &id, "clientId")?;

    let mut record = ResourceRecord::new(
        kind,
        id.as_str(),
        base_name(kind, &[realm.name.as_str(), client_id.as_str()]),
    )
    .attribute("realm_id", realm.name.as_str())
    .attribute("client_id", client_id.as_str())
    .optional_attribute("name", rep.name)
    .optional_attribute("description", rep.description)
    .optional_attribute("enabled", rep.enabled)
    .attribute("access_type", access_type)
    .attribute(
        "service_accounts_enabled",
        rep.service_accounts_enabled.unwrap_or(false),
    )
    .optional_attribute("valid_redirect_uris", rep.redirect_uris)
    .attribute("web_origins", rep.web_origins.unwrap_or_default());

    if is_builtin_client(&realm.name, &client_id) {
        record = record.extra_field("import", json!(true));
    }

    Ok(record)
}

fn service_account_role_record(
    realm: &RealmScope,
    user_id: &str,
    owner: &ServiceAccountOwner,
    binding: ClientRoleBinding,
) -> Result<ResourceRecord, ImportError> {
    let kind = ResourceKind::OpenidClientServiceAccountRole;
    let partial_id = format!("{}/{}", realm.name, user_id);

    let role_client = required(binding.client_remote_id, kind, &partial_id, "clientMappings.id")?;
    let role_client_id = required(binding.client_id, kind, &partial_id, "clientMappings.client")?;
    let role_id = required(binding.role.id, kind, &partial_id, "role.id")?;
    let remote_id = format!("{}/{}/{}", partial_id, role_client, role_id);
    let role_name = required(binding.role.name, kind, &remote_id, "role.name")?;

    Ok(ResourceRecord::new(
        kind,
        remote_id.as_str(),
        base_name(
            kind,
            &[
                realm.name.as_str(),
                owner.client_id.as_str(),
                role_client_id.as_str(),
                role_name.as_str(),
            ],
        ),
    )
    .attribute("realm_id", realm.name.as_str())
    .attribute("service_account_user_id", user_id)
    .attribute("client_id", role_client.as_str())
    .attribute("role", role_name.as_str()))
}
