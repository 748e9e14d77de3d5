//! saml-sp: SAML 2.0 service-provider web server.
//!
//! Authenticates browsers against an external IdP over SP-initiated SSO and
//! renders the authenticated session's attributes at `/` and `/login`.

mod render;
mod saml;
mod session;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use saml::{fetch_idp_metadata, load_key_pair, sp_metadata_xml, SamlConfig, SamlProvider};
use session::{spawn_cleanup_task, SessionStore, DEFAULT_CLEANUP_INTERVAL_SECS};
use web::AppState;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "saml-sp")]
#[command(about = "SAML 2.0 service provider web server")]
struct Args {
    /// Listen URL; the server binds this URL's port
    #[arg(long, default_value = "http://localhost:8000", env = "LISTEN_URL")]
    listen: String,

    /// Service provider Entity ID
    #[arg(long, default_value = "urn:example:saml-sp", env = "ENTITY_ID")]
    entity_id: String,

    /// IdP metadata URL
    #[arg(
        long,
        default_value = "https://samltest.id/saml/idp",
        env = "IDP_METADATA_URL"
    )]
    idp_metadata: String,

    /// Service provider certificate (PEM)
    #[arg(long, default_value = "saml-sp-crt.pem", env = "SP_CERTIFICATE")]
    certificate: PathBuf,

    /// Service provider private key (PEM)
    #[arg(long, default_value = "saml-sp-key.pem", env = "SP_PRIVATE_KEY")]
    private_key: PathBuf,

    /// File the SP metadata document is written to at startup
    #[arg(long, default_value = "saml-sp-metadata.xml", env = "SP_METADATA_OUT")]
    metadata_out: PathBuf,

    /// Session database path
    #[arg(long, default_value = "saml-sp-sessions.redb", env = "SESSION_STORE_PATH")]
    session_store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "SP_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .init();

    info!("starting saml-sp");

    let root_url = Url::parse(&args.listen).context("failed to parse the listen URL")?;

    let certificate_der = load_key_pair(&args.certificate, &args.private_key)
        .context("failed to load the service provider key pair")?;

    let config = SamlConfig {
        entity_id: args.entity_id.clone(),
        acs_url: root_url
            .join("saml/acs")
            .context("failed to derive the ACS URL")?
            .to_string(),
        certificate_der,
        cookie_secure: root_url.scheme() == "https",
        ..Default::default()
    };

    let idp = fetch_idp_metadata(&args.idp_metadata)
        .await
        .context("failed to fetch the IdP metadata")?;
    info!(idp = %idp.entity_id, sso_url = %idp.sso_url, "IdP metadata loaded");

    let metadata_xml =
        sp_metadata_xml(&config).context("failed to build the SP metadata document")?;
    if let Err(e) = std::fs::write(&args.metadata_out, &metadata_xml) {
        warn!(
            error = %e,
            path = ?args.metadata_out,
            "failed to save the SP metadata document to local file"
        );
    }

    let provider = Arc::new(SamlProvider::new(config, idp)?);

    let sessions = Arc::new(
        SessionStore::open(args.session_store.clone())
            .context("failed to open the session store")?,
    );
    let _cleanup = spawn_cleanup_task(Arc::clone(&sessions), DEFAULT_CLEANUP_INTERVAL_SECS);

    let app = web::router(AppState { provider, sessions });

    let port = root_url.port_or_known_default().unwrap_or(8000);
    let addr = format!("0.0.0.0:{}", port);
    info!(url = %root_url, "service provider listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
