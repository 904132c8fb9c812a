//! Keycloak Admin API Client
//!
//! [`RemoteClient`] over the Keycloak Admin REST API. Authenticates with
//! the OpenID Connect token endpoint and refreshes the access token shortly
//! before it expires.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{Grant, KeycloakConfig};
use crate::remote::{
    ClientRepresentation, ClientRoleBinding, RealmRepresentation, RemoteClient,
    RequiredActionRepresentation, RoleRepresentation, UserRepresentation,
};

/// Refresh tokens this long before Keycloak considers them expired
const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(10);

// ============================================================
// API Response Types
// ============================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.refresh_at.map_or(true, |at| Instant::now() < at)
    }
}

/// `GET /users/{id}/role-mappings`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingsRepresentation {
    #[serde(default)]
    client_mappings: Option<BTreeMap<String, ClientMappingsRepresentation>>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientMappingsRepresentation {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    mappings: Option<Vec<RoleRepresentation>>,
}

/// Flatten role mappings into client-role bindings, ordered by client
fn client_role_bindings(mappings: MappingsRepresentation) -> Vec<ClientRoleBinding> {
    mappings
        .client_mappings
        .unwrap_or_default()
        .into_iter()
        .flat_map(|(key, client)| {
            let client_id = client.client.or(Some(key));
            let client_remote_id = client.id;
            client
                .mappings
                .unwrap_or_default()
                .into_iter()
                .map(move |role| ClientRoleBinding {
                    client_remote_id: client_remote_id.clone(),
                    client_id: client_id.clone(),
                    role,
                })
        })
        .collect()
}

// ============================================================
// Client Implementation
// ============================================================

/// Keycloak Admin API client
pub struct KeycloakAdminClient {
    client: Client,
    config: KeycloakConfig,
    grant: Grant,
    token: Mutex<Option<AccessToken>>,
}

impl KeycloakAdminClient {
    /// Create a client and authenticate once, so bad credentials fail early
    pub async fn connect(config: KeycloakConfig) -> Result<Self> {
        let grant = config.grant()?;

        let client = Client::builder()
            .user_agent(concat!("keycloak-importer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.tls_insecure)
            .build()
            .context("Failed to build HTTP client")?;

        let admin = Self {
            client,
            config,
            grant,
            token: Mutex::new(None),
        };
        admin.access_token().await?;

        info!(
            url = %admin.config.url,
            realm = %admin.config.realm,
            client_id = %admin.config.client_id,
            "Authenticated against Keycloak"
        );
        Ok(admin)
    }

    /// Request a new access token from the token endpoint
    async fn authenticate(&self) -> Result<AccessToken> {
        let mut form = vec![("client_id", self.config.client_id.as_str())];
        match &self.grant {
            Grant::ClientCredentials { client_secret } => {
                form.push(("grant_type", "client_credentials"));
                form.push(("client_secret", client_secret.as_str()));
            }
            Grant::Password { username, password } => {
                form.push(("grant_type", "password"));
                form.push(("username", username.as_str()));
                form.push(("password", password.as_str()));
            }
        }

        let url = self.config.token_url();
        debug!("Requesting access token from {}", url);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .context("Failed to reach Keycloak token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Keycloak authentication failed ({}): {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let refresh_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs).saturating_sub(TOKEN_EXPIRY_SKEW)
        });

        Ok(AccessToken {
            value: token.access_token,
            refresh_at,
        })
    }

    /// Current access token, re-authenticating when it is about to expire
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.authenticate().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// GET an Admin API path below `/admin/realms`
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.admin_url(path);
        let token = self.access_token().await?;

        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Keycloak API error ({}) for {}: {}", status, url, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response of {}", url))
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[async_trait]
impl RemoteClient for KeycloakAdminClient {
    async fn list_realms(&self) -> Result<Vec<RealmRepresentation>> {
        self.get_json("").await
    }

    async fn list_required_actions(
        &self,
        realm: &str,
    ) -> Result<Vec<RequiredActionRepresentation>> {
        self.get_json(&format!(
            "/{}/authentication/required-actions",
            segment(realm)
        ))
        .await
    }

    async fn list_clients_for_realm(&self, realm: &str) -> Result<Vec<ClientRepresentation>> {
        self.get_json(&format!("/{}/clients", segment(realm))).await
    }

    async fn get_service_account_user(
        &self,
        realm: &str,
        client: &str,
    ) -> Result<UserRepresentation> {
        self.get_json(&format!(
            "/{}/clients/{}/service-account-user",
            segment(realm),
            segment(client)
        ))
        .await
    }

    async fn list_role_bindings_for_principal(
        &self,
        realm: &str,
        user_id: &str,
    ) -> Result<Vec<ClientRoleBinding>> {
        let mappings: MappingsRepresentation = self
            .get_json(&format!(
                "/{}/users/{}/role-mappings",
                segment(realm),
                segment(user_id)
            ))
            .await?;

        Ok(client_role_bindings(mappings))
    }
}
