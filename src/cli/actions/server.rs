use crate::{
    api,
    gate::{cache::CredentialCache, policy::PathPolicy, Gate, GateConfig},
    radius::RadiusClient,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Startup sweep ceiling: entries older than this are deleted regardless of
/// the configured TTL, so rows written under a larger previous TTL are still
/// recovered.
const PURGE_MAX_AGE: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub servers: Vec<String>,
    pub secret: SecretString,
    pub nas_id: Option<String>,
    pub realm: String,
    pub cache_path: String,
    pub cache_ttl: u64,
    pub only: Vec<String>,
    pub except: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the cache cannot be opened, the startup purge fails,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let policy = PathPolicy::from_lists(args.only, args.except);
    let ttl = Duration::from_secs(args.cache_ttl);

    let cache = CredentialCache::open(&args.cache_path, ttl)
        .with_context(|| format!("failed to open credential cache at {}", args.cache_path))?;

    // Full-table sweep is fine here because no traffic is accepted yet.
    let purged = cache
        .purge_expired(PURGE_MAX_AGE)
        .context("startup cache purge failed")?;
    info!(purged, "credential cache purge complete");

    let nas_id = match args.nas_id {
        Some(nas_id) => nas_id,
        None => hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "gardisto".to_string()),
    };
    debug!(nas_id, "NAS-Identifier for outgoing requests");

    let verifier = Arc::new(RadiusClient::new(args.servers, args.secret, nas_id));
    let gate = Arc::new(Gate::new(
        GateConfig {
            realm: args.realm,
            policy,
        },
        cache,
        verifier,
    ));

    api::serve(args.port, gate).await
}
