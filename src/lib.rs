//! Keycloak Importer
//!
//! Discovers the entities of a running Keycloak server (realms, required
//! actions, OpenID Connect clients and their service-account roles) and
//! turns them into infrastructure-as-code resources that reference each
//! other by symbolic name instead of by Keycloak-assigned ID.
//!
//! The pipeline runs in three steps:
//! 1. Discover: per-kind discoverers list entities through [`RemoteClient`]
//! 2. Normalize: each entity becomes a [`ResourceRecord`] with a unique name
//! 3. Rewrite: foreign keys become [`SymbolicReference`]s in one final pass
//!
//! ```no_run
//! use keycloak_importer::{render_terraform_json, Importer, KeycloakAdminClient, KeycloakConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = KeycloakConfig {
//!     username: Some("admin".to_string()),
//!     password: Some("admin".to_string()),
//!     ..Default::default()
//! };
//! let client = KeycloakAdminClient::connect(config).await?;
//! let output = Importer::new().run(&client).await?;
//! let document = render_terraform_json(&output.records);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod importer;
pub mod keycloak;
pub mod naming;
pub mod normalize;
pub mod remote;
pub mod render;
pub mod resource;
pub mod rewrite;

pub use config::KeycloakConfig;
pub use error::ImportError;
pub use importer::{ImportOutput, ImportSummary, Importer};
pub use keycloak::KeycloakAdminClient;
pub use remote::RemoteClient;
pub use render::{render_terraform_json, write_output};
pub use resource::{AttributeValue, ResourceKind, ResourceRecord, SymbolicReference};
pub use rewrite::RewriteReport;
