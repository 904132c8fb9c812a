//! Remote Client Abstraction
//!
//! Trait seam between the discovery pipeline and the Keycloak Admin API,
//! plus the raw entity shapes the API returns. Fields are optional on the
//! wire; discoverers decide which ones are structurally required.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Realm as returned by `GET /admin/realms`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmRepresentation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Required action of a realm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredActionRepresentation {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub default_action: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Client as returned by `GET /admin/realms/{realm}/clients`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub public_client: Option<bool>,
    #[serde(default)]
    pub bearer_only: Option<bool>,
    #[serde(default)]
    pub service_accounts_enabled: Option<bool>,
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub web_origins: Option<Vec<String>>,
}

impl ClientRepresentation {
    /// OpenID Connect clients; Keycloak omits the protocol for OIDC defaults
    pub fn is_openid_connect(&self) -> bool {
        matches!(self.protocol.as_deref(), None | Some("openid-connect"))
    }
}

/// User as returned by the service-account-user endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Role as returned inside role mappings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRepresentation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub client_role: Option<bool>,
    #[serde(default)]
    pub container_id: Option<String>,
}

/// One client role granted to a service-account user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRoleBinding {
    /// Remote ID of the client owning the role
    pub client_remote_id: Option<String>,
    /// `clientId` of the client owning the role
    pub client_id: Option<String>,
    pub role: RoleRepresentation,
}

/// Read access to the Keycloak entities the importer discovers
///
/// `realm` arguments are realm names, as used in Admin API paths.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn list_realms(&self) -> Result<Vec<RealmRepresentation>>;

    async fn list_required_actions(
        &self,
        realm: &str,
    ) -> Result<Vec<RequiredActionRepresentation>>;

    /// All clients of a realm, whatever their protocol
    async fn list_clients_for_realm(&self, realm: &str) -> Result<Vec<ClientRepresentation>>;

    /// Service-account user of a client; `client` is the client's remote ID
    async fn get_service_account_user(
        &self,
        realm: &str,
        client: &str,
    ) -> Result<UserRepresentation>;

    /// Client-role bindings of a user, flattened across owning clients
    async fn list_role_bindings_for_principal(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<Vec<ClientRoleBinding>>;
}

/// In-memory Keycloak used by pipeline tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeKeycloak {
        pub realms: Vec<RealmRepresentation>,
        pub required_actions: HashMap<String, Vec<RequiredActionRepresentation>>,
        pub clients: HashMap<String, Vec<ClientRepresentation>>,
        /// Keyed by (realm, client remote ID)
        pub service_accounts: HashMap<(String, String), UserRepresentation>,
        /// Keyed by (realm, user ID)
        pub role_bindings: HashMap<(String, String), Vec<ClientRoleBinding>>,
        /// Calls that fail, as "operation:scope"
        pub failures: HashSet<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeKeycloak {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_realm(mut self, name: &str) -> Self {
            self.realms.push(RealmRepresentation {
                id: Some(format!("{}-id", name)),
                realm: Some(name.to_string()),
                display_name: None,
                enabled: Some(true),
            });
            self
        }

        pub fn with_client(mut self, realm: &str, id: &str, client_id: &str) -> Self {
            self.clients
                .entry(realm.to_string())
                .or_default()
                .push(client(id, client_id));
            self
        }

        pub fn with_service_account(
            mut self,
            realm: &str,
            id: &str,
            client_id: &str,
            user_id: &str,
        ) -> Self {
            let mut rep = client(id, client_id);
            rep.service_accounts_enabled = Some(true);
            self.clients.entry(realm.to_string()).or_default().push(rep);
            self.service_accounts.insert(
                (realm.to_string(), id.to_string()),
                UserRepresentation {
                    id: Some(user_id.to_string()),
                    username: Some(format!("service-account-{}", client_id)),
                },
            );
            self
        }

        pub fn with_binding(
            mut self,
            realm: &str,
            user_id: &str,
            owner_id: &str,
            owner_client_id: &str,
            role_id: &str,
            role_name: &str,
        ) -> Self {
            self.role_bindings
                .entry((realm.to_string(), user_id.to_string()))
                .or_default()
                .push(ClientRoleBinding {
                    client_remote_id: Some(owner_id.to_string()),
                    client_id: Some(owner_client_id.to_string()),
                    role: RoleRepresentation {
                        id: Some(role_id.to_string()),
                        name: Some(role_name.to_string()),
                        description: None,
                        client_role: Some(true),
                        container_id: Some(owner_id.to_string()),
                    },
                });
            self
        }

        pub fn failing(mut self, operation: &str, scope: &str) -> Self {
            self.failures.insert(format!("{}:{}", operation, scope));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, operation: &str, scope: &str) -> Result<()> {
            let call = format!("{}:{}", operation, scope);
            self.calls.lock().unwrap().push(call.clone());
            if self.failures.contains(&call) {
                anyhow::bail!("simulated transport failure on {}", call);
            }
            Ok(())
        }
    }

    pub fn client(id: &str, client_id: &str) -> ClientRepresentation {
        ClientRepresentation {
            id: Some(id.to_string()),
            client_id: Some(client_id.to_string()),
            enabled: Some(true),
            protocol: Some("openid-connect".to_string()),
            ..Default::default()
        }
    }

    #[async_trait]
    impl RemoteClient for FakeKeycloak {
        async fn list_realms(&self) -> Result<Vec<RealmRepresentation>> {
            self.record("list_realms", "")?;
            Ok(self.realms.clone())
        }

        async fn list_required_actions(
        &self,
        realm: &str,
    ) -> Result<Vec<RequiredActionRepresentation>> {
            self.record("list_required_actions", realm)?;
            Ok(self.required_actions.get(realm).cloned().unwrap_or_default())
        }

        async fn list_clients_for_realm(&self, realm: &str) -> Result<Vec<ClientRepresentation>> {
            self.record("list_clients_for_realm", realm)?;
            Ok(self.clients.get(realm).cloned().unwrap_or_default())
        }

        async fn get_service_account_user(
        &self,
        realm: &str,
        client: &str,
    ) -> Result<UserRepresentation> {
            self.record("get_service_account_user", &format!("{}/{}", realm, client))?;
            self.service_accounts
                .get(&(realm.to_string(), client.to_string()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
        }

        async fn list_role_bindings_for_principal(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<Vec<ClientRoleBinding>> {
            self.record("list_role_bindings_for_principal", &format!("{}/{}", realm, user_id))?;
            Ok(self
                .role_bindings
                .get(&(realm.to_string(), user_id.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }
}
