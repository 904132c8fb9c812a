//! Keycloak Connection Configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// How the importer authenticates against Keycloak
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// `client_credentials` with a confidential client
    ClientCredentials { client_secret: String },
    /// `password` grant, typically `admin-cli` with an admin user
    Password { username: String, password: String },
}

/// Connection settings for the Keycloak Admin API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    /// Server root URL (e.g., "https://sso.example.com")
    pub url: String,
    /// Path prefix of the server; "/auth" for legacy WildFly distributions
    pub base_path: String,
    /// Realm the importer authenticates in
    pub realm: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Skip TLS certificate verification
    pub tls_insecure: bool,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            base_path: String::new(),
            realm: "master".to_string(),
            client_id: "admin-cli".to_string(),
            client_secret: None,
            username: None,
            password: None,
            timeout_secs: 30,
            tls_insecure: false,
        }
    }
}

impl KeycloakConfig {
    fn root(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.base_path.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    /// OpenID Connect token endpoint of the authentication realm
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.root(),
            urlencoding::encode(&self.realm)
        )
    }

    /// Admin API base URL; `path` must start with '/' or be empty
    pub fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms{}", self.root(), path)
    }

    /// Pick the grant from the configured credentials
    ///
    /// A client secret wins over user credentials.
    pub fn grant(&self) -> Result<Grant> {
        if let Some(secret) = self.client_secret.as_ref().filter(|s| !s.is_empty()) {
            return Ok(Grant::ClientCredentials {
                client_secret: secret.clone(),
            });
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Grant::Password {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => bail!(
                "No Keycloak credentials configured: set a client secret or a username and password"
            ),
        }
    }
}
