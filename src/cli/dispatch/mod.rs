//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the server action, applying the setup-time
//! checks clap cannot express: endpoint addresses must be `host:port`, filter
//! patterns must be absolute, and `/` may not be filtered away entirely.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{cache, filter, radius};
use anyhow::{bail, Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let servers: Vec<String> = matches
        .get_many::<String>(radius::ARG_SERVER)
        .context("missing required argument: --server")?
        .cloned()
        .collect();
    for server in &servers {
        validate_server(server)?;
    }

    let secret = matches
        .get_one::<String>(radius::ARG_SECRET)
        .cloned()
        .context("missing required argument: --secret")?;

    let nas_id = matches.get_one::<String>(radius::ARG_NAS_ID).cloned();
    let realm = matches
        .get_one::<String>(radius::ARG_REALM)
        .cloned()
        .unwrap_or_else(|| "Restricted".to_string());

    let cache_path = matches
        .get_one::<String>(cache::ARG_CACHE_PATH)
        .cloned()
        .unwrap_or_else(|| "gardisto.db".to_string());
    let cache_ttl = matches
        .get_one::<u64>(cache::ARG_CACHE_TTL)
        .copied()
        .unwrap_or(300);

    let only = collect_patterns(matches, filter::ARG_ONLY)?;
    let except = collect_patterns(matches, filter::ARG_EXCEPT)?;

    Ok(Action::Server(Args {
        port,
        servers,
        secret: SecretString::from(secret),
        nas_id,
        realm,
        cache_path,
        cache_ttl,
        only,
        except,
    }))
}

fn validate_server(server: &str) -> Result<()> {
    let Some((host, port)) = server.rsplit_once(':') else {
        bail!("invalid server address {server:?} (expected host:port)");
    };
    if host.is_empty() {
        bail!("invalid server address {server:?} (missing host)");
    }
    if port.parse::<u16>().map_or(true, |port| port == 0) {
        bail!("invalid server address {server:?} (bad port)");
    }
    Ok(())
}

fn collect_patterns(matches: &clap::ArgMatches, arg: &str) -> Result<Vec<String>> {
    let patterns: Vec<String> = matches
        .get_many::<String>(arg)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    for pattern in &patterns {
        if pattern == "/" {
            bail!("cannot filter '/' entirely - disable gardisto instead");
        }
        if !pattern.starts_with('/') {
            bail!("invalid path {pattern:?} (must start with /)");
        }
    }
    Ok(patterns)
}
