//! Integration tests for the gateway router.
//!
//! Drives the full axum router in process with `tower::ServiceExt::oneshot`,
//! substituting a counting verifier double for the RADIUS client so backend
//! call counts can be asserted.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use gardisto::{
    api,
    gate::{
        cache::{CacheLookup, CredentialCache},
        policy::PathPolicy,
        Gate, GateConfig, UnreachableCause, VerificationOutcome, Verifier,
    },
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceExt;

struct ScriptedVerifier {
    outcome: VerificationOutcome,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    fn new(outcome: VerificationOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, _username: &str, _password: &str) -> VerificationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

fn gateway(policy: PathPolicy, verifier: Arc<ScriptedVerifier>) -> (Router, Arc<Gate>) {
    let cache = CredentialCache::in_memory(Duration::from_secs(300)).unwrap();
    let gate = Arc::new(Gate::new(
        GateConfig {
            realm: "Restricted".to_string(),
            policy,
        },
        cache,
        verifier,
    ));
    (api::router(gate.clone()), gate)
}

fn request(path: &str, credential: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some((username, password)) = credential {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
        );
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn except_listed_path_passes_without_credentials() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Rejected);
    let (app, _gate) = gateway(
        PathPolicy::Except(vec!["/public".to_string()]),
        verifier.clone(),
    );

    let response = app.oneshot(request("/public", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn missing_header_draws_a_challenge() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Accepted);
    let (app, _gate) = gateway(PathPolicy::All, verifier.clone());

    let response = app.oneshot(request("/anything", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok()),
        Some("Basic realm=\"Restricted\"")
    );
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn empty_username_is_rejected_as_malformed() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Accepted);
    let (app, _gate) = gateway(PathPolicy::All, verifier.clone());

    let response = app
        .oneshot(request("/anything", Some(("", "secret"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    // The backend is never consulted for a malformed credential.
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn accepted_credential_passes_and_is_served_from_cache_afterwards() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Accepted);
    let (app, gate) = gateway(PathPolicy::All, verifier.clone());

    let first = app
        .clone()
        .oneshot(request("/app", Some(("alice", "secret"))))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"], "alice");

    assert_eq!(
        gate.cache().lookup("alice", "secret").unwrap(),
        CacheLookup::Valid
    );

    let second = app
        .oneshot(request("/app", Some(("alice", "secret"))))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    // The second identical request never reaches the backend.
    assert_eq!(verifier.calls(), 1);
}

#[tokio::test]
async fn rejected_credential_is_challenged_and_not_cached() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Rejected);
    let (app, gate) = gateway(PathPolicy::All, verifier.clone());

    let response = app
        .oneshot(request("/app", Some(("alice", "wrong"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(
        gate.cache().lookup("alice", "wrong").unwrap(),
        CacheLookup::NotFound
    );
}

#[tokio::test]
async fn unreachable_backend_with_timeouts_is_gateway_timeout() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Unreachable(UnreachableCause {
        timed_out: true,
        detail: "10.0.0.1:1812: timed out".to_string(),
    }));
    let (app, gate) = gateway(PathPolicy::All, verifier);

    let response = app
        .oneshot(request("/app", Some(("alice", "secret"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    // Nothing was cached for the unverified credential.
    assert_eq!(
        gate.cache().lookup("alice", "secret").unwrap(),
        CacheLookup::NotFound
    );
}

#[tokio::test]
async fn unreachable_backend_without_timeouts_is_bad_gateway() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Unreachable(UnreachableCause {
        timed_out: false,
        detail: "10.0.0.1:1812: connection refused".to_string(),
    }));
    let (app, _gate) = gateway(PathPolicy::All, verifier);

    let response = app
        .oneshot(request("/app", Some(("alice", "secret"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn only_mode_protects_nothing_else() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Rejected);
    let (app, _gate) = gateway(
        PathPolicy::Only(vec!["/admin".to_string()]),
        verifier.clone(),
    );

    let open = app.clone().oneshot(request("/app", None)).await.unwrap();
    assert_eq!(open.status(), StatusCode::OK);

    let guarded = app.oneshot(request("/admin", None)).await.unwrap();
    assert_eq!(guarded.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn health_reports_cache_status_and_app_header() {
    let verifier = ScriptedVerifier::new(VerificationOutcome::Rejected);
    let (app, _gate) = gateway(PathPolicy::Except(vec!["/health".to_string()]), verifier);

    let response = app.oneshot(request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));

    let body = body_json(response).await;
    assert_eq!(body["name"], "gardisto");
    assert_eq!(body["cache"], "ok");
}
