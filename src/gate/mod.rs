//! Authentication orchestrator: the per-request decision flow combining the
//! path filter, the credential cache and the RADIUS backend.
//!
//! One immutable [`Gate`] value is built at startup and shared across all
//! in-flight requests; every piece of mutable state lives behind the cache's
//! own transaction discipline. The flow per request:
//!
//! filter check → credential extraction → cache lookup → remote verification
//!
//! with the cache strictly an optimization: any cache-layer uncertainty falls
//! through to remote verification and never grants or denies by itself.

pub mod cache;
pub mod policy;

use crate::gate::cache::{now_unix, CacheLookup, CredentialCache};
use crate::gate::policy::PathPolicy;
use async_trait::async_trait;
use axum::{
    extract::{Extension, Request},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one remote verification attempt.
#[derive(Clone, Debug)]
pub enum VerificationOutcome {
    Accepted,
    Rejected,
    Unreachable(UnreachableCause),
}

/// Aggregated per-endpoint failure causes when no endpoint answered.
/// `timed_out` is true only when every endpoint failed by timeout; it picks
/// 504 over 502 for the externally visible status.
#[derive(Clone, Debug)]
pub struct UnreachableCause {
    pub timed_out: bool,
    pub detail: String,
}

/// One verification attempt against the remote authentication service.
///
/// The production implementation is [`crate::radius::RadiusClient`]; tests
/// substitute counting doubles.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> VerificationOutcome;
}

/// Immutable configuration snapshot for the orchestrator. Reconfiguration
/// replaces the whole [`Gate`], never mutates it in place.
#[derive(Clone, Debug)]
pub struct GateConfig {
    pub realm: String,
    pub policy: PathPolicy,
}

/// Why a request is allowed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllowReason {
    /// The path filter does not require authentication.
    Unprotected,
    /// A cached credential verified within its TTL.
    CachedCredential,
    /// The RADIUS backend accepted the credential.
    BackendAccepted,
}

/// Why a request is denied with a challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// Credential header present but username or password empty.
    MalformedCredential,
    /// A reachable RADIUS endpoint rejected the credential.
    BackendRejected,
}

/// Terminal state of the per-request decision flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AllowReason),
    /// No usable credential header: answer with an authentication challenge.
    Challenge,
    Deny(DenyReason),
    /// No RADIUS endpoint answered.
    Unavailable { timed_out: bool },
}

/// The authentication orchestrator.
pub struct Gate {
    config: GateConfig,
    cache: CredentialCache,
    verifier: Arc<dyn Verifier>,
}

impl Gate {
    #[must_use]
    pub fn new(config: GateConfig, cache: CredentialCache, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            config,
            cache,
            verifier,
        }
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.config.realm
    }

    #[must_use]
    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Run the decision flow for one request.
    pub async fn handle(
        &self,
        path: &str,
        credential: Option<&(String, String)>,
    ) -> GateDecision {
        if !self.config.policy.requires_auth(path) {
            return GateDecision::Allow(AllowReason::Unprotected);
        }

        let Some((username, password)) = credential else {
            return GateDecision::Challenge;
        };
        if username.is_empty() || password.is_empty() {
            return GateDecision::Deny(DenyReason::MalformedCredential);
        }

        match self.cache.lookup(username, password) {
            Ok(CacheLookup::Valid) => {
                debug!(username, "credential served from cache");
                return GateDecision::Allow(AllowReason::CachedCredential);
            }
            Ok(result) => debug!(username, ?result, "cache miss"),
            // Fail open to remote verification: the cache only ever saves
            // round trips, it never gates access on its own failures.
            Err(err) => warn!(username, %err, "cache lookup failed"),
        }

        match self.verifier.verify(username, password).await {
            VerificationOutcome::Accepted => {
                // A failed cache write must not downgrade a successful
                // authentication.
                if let Err(err) = self.cache.store(username, password, now_unix()) {
                    warn!(username, %err, "cache write failed");
                }
                GateDecision::Allow(AllowReason::BackendAccepted)
            }
            VerificationOutcome::Rejected => GateDecision::Deny(DenyReason::BackendRejected),
            VerificationOutcome::Unreachable(cause) => {
                warn!(username, detail = %cause.detail, "no RADIUS endpoint answered");
                GateDecision::Unavailable {
                    timed_out: cause.timed_out,
                }
            }
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("config", &self.config).finish()
    }
}

/// Username of the authenticated requester, inserted into request extensions
/// on pass-through so downstream handlers and access logs can use it.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub String);

/// Axum middleware wrapping the orchestrator around the inner router.
pub async fn authenticate(
    Extension(gate): Extension<Arc<Gate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let credential = basic_credentials(request.headers());

    match gate.handle(&path, credential.as_ref()).await {
        GateDecision::Allow(reason) => {
            if reason != AllowReason::Unprotected {
                if let Some((username, _)) = credential {
                    request.extensions_mut().insert(AuthenticatedUser(username));
                }
            }
            next.run(request).await
        }
        GateDecision::Challenge => {
            debug!(path, "credential required");
            challenge(gate.realm())
        }
        GateDecision::Deny(reason) => {
            info!(path, ?reason, "authentication denied");
            challenge(gate.realm())
        }
        GateDecision::Unavailable { timed_out } => {
            let status = if timed_out {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            status.into_response()
        }
    }
}

/// 401 with the Basic challenge header naming the configured realm. Internal
/// causes never reach the response body.
fn challenge(realm: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{realm}\""))],
    )
        .into_response()
}

/// Extract a Basic credential pair from the Authorization header.
///
/// Anything unparseable (wrong scheme, bad base64, no colon) reads as no
/// credential at all and draws a challenge; an empty username or password in
/// a well-formed pair is reported upstream as a malformed credential instead.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (username, password) = pair.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
