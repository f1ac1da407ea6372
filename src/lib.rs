//! # Gardisto (RADIUS Authentication Gateway)
//!
//! `gardisto` protects HTTP resources with Basic Authentication verified
//! against RFC 2865 RADIUS servers, with a local credential cache to keep
//! repeat requests off the wire.
//!
//! ## Request flow
//!
//! Every request passes the [`gate::authenticate`] middleware:
//!
//! 1. **Path filter**: the mutually exclusive `--only` / `--except` lists
//!    decide whether the path needs authentication at all.
//! 2. **Credential cache**: a previously verified credential is accepted
//!    from an embedded SQLite file while it is younger than `--cache-ttl`.
//!    Only a salted argon2 verifier is stored, never the password.
//! 3. **RADIUS failover**: otherwise the configured servers are tried in
//!    order; the first reply wins. An Access-Accept is cached and passed
//!    through, anything else from a reachable server is a definitive 401,
//!    and if no server answers the request fails with 502/504.
//!
//! The cache is advisory: any cache-layer failure falls back to RADIUS
//! verification and is never a reason to grant or deny by itself.
//!
//! Note that Basic Authentication is not secure on its own; deploy this
//! gateway behind TLS termination.

pub mod api;
pub mod cli;
pub mod gate;
pub mod radius;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
