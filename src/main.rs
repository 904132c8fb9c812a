//! Keycloak Import CLI
//!
//! Reads realms, required actions and OpenID Connect clients from a
//! running Keycloak and writes them as Terraform JSON.
//!
//! # Usage
//! ```bash
//! # Import everything using the admin user of the master realm
//! keycloak-import --url https://sso.example.com --username admin --password admin
//!
//! # Only two realms, into a file, failing on dangling references
//! keycloak-import --realms acme --realms beta --output keycloak.tf.json --strict-references
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use keycloak_importer::{
    render_terraform_json, write_output, Importer, KeycloakAdminClient, KeycloakConfig,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "keycloak-import")]
#[command(about = "Import Keycloak realms and clients as Terraform resources", long_about = None)]
#[command(version)]
struct Cli {
    /// Keycloak server URL
    #[arg(long, env = "KEYCLOAK_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Path prefix of the server (e.g., /auth for legacy distributions)
    #[arg(long, env = "KEYCLOAK_BASE_PATH", default_value = "")]
    base_path: String,

    /// Realm to authenticate in
    #[arg(long, env = "KEYCLOAK_REALM", default_value = "master")]
    realm: String,

    /// Client used to obtain the admin token
    #[arg(long, env = "KEYCLOAK_CLIENT_ID", default_value = "admin-cli")]
    client_id: String,

    /// Client secret (client_credentials grant)
    #[arg(long, env = "KEYCLOAK_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Admin username (password grant)
    #[arg(long, env = "KEYCLOAK_USER")]
    username: Option<String>,

    /// Admin password (password grant)
    #[arg(long, env = "KEYCLOAK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, env = "KEYCLOAK_CLIENT_TIMEOUT", default_value = "30")]
    timeout: u64,

    /// Skip TLS certificate verification
    #[arg(long, env = "KEYCLOAK_TLS_INSECURE_SKIP_VERIFY")]
    tls_insecure: bool,

    /// Only import these realms (repeatable)
    #[arg(long)]
    realms: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when a reference cannot be resolved
    #[arg(long)]
    strict_references: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn keycloak_config(&self) -> KeycloakConfig {
        KeycloakConfig {
            url: self.url.clone(),
            base_path: self.base_path.clone(),
            realm: self.realm.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout,
            tls_insecure: self.tls_insecure,
        }
    }
}

// ============================================================
// Main Entry Point
// ============================================================

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    // stdout carries the generated configuration
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    info!("🚀 Keycloak importer starting...");

    if cli.tls_insecure {
        warn!("⚠️  TLS certificate verification disabled");
    }

    let client = KeycloakAdminClient::connect(cli.keycloak_config()).await?;

    let importer = Importer::new()
        .with_realms(cli.realms.iter().cloned())
        .strict_references(cli.strict_references);
    info!(kinds = ?importer.kinds(), "📋 Importing resource kinds");

    let output = importer.run(&client).await?;

    if !output.report.is_fully_resolved() {
        warn!(
            count = output.report.unresolved.len(),
            "⚠️  Some references point outside the import and were kept as raw IDs"
        );
    }

    let document = render_terraform_json(&output.records);
    write_output(cli.output.as_deref(), &document)?;

    for (kind, count) in &output.summary.resources {
        info!(kind = %kind, count, "Imported resources");
    }
    info!(
        total = output.summary.total(),
        references = output.summary.references_rewritten,
        unresolved = output.summary.unresolved_references,
        "✅ Import complete"
    );

    Ok(())
}
