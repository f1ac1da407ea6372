//! RADIUS verification client: one Access-Request per endpoint, tried in
//! configured order until one answers or all are exhausted.

mod packet;

use crate::gate::{UnreachableCause, VerificationOutcome, Verifier};
use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, warn};

/// Per-endpoint connect/read budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Why one endpoint failed to produce a usable reply.
enum ExchangeFailure {
    TimedOut,
    Transport(anyhow::Error),
}

impl From<anyhow::Error> for ExchangeFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Transport(err)
    }
}

impl std::fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Transport(err) => write!(f, "{err:#}"),
        }
    }
}

/// Client over an ordered list of RADIUS servers sharing one secret.
///
/// Endpoints are probed strictly in configured order, sequentially; there is
/// no load balancing, so the answering server is deterministic for audit
/// purposes.
pub struct RadiusClient {
    servers: Vec<String>,
    secret: SecretString,
    nas_identifier: String,
    timeout: Duration,
}

impl RadiusClient {
    #[must_use]
    pub fn new(servers: Vec<String>, secret: SecretString, nas_identifier: String) -> Self {
        Self {
            servers,
            secret,
            nas_identifier,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-endpoint timeout (tests use short budgets).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One request/reply exchange with a single endpoint.
    async fn exchange(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<u8, ExchangeFailure> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("failed to bind UDP socket")?;
        socket
            .connect(server)
            .await
            .with_context(|| format!("failed to reach RADIUS server {server}"))?;

        let identifier: u8 = rand::thread_rng().gen();
        let mut authenticator = [0u8; 16];
        rand::thread_rng().fill(&mut authenticator[..]);

        let secret = self.secret.expose_secret().as_bytes();
        let request = packet::encode_access_request(
            identifier,
            &authenticator,
            username,
            password,
            &self.nas_identifier,
            secret,
        )?;

        socket
            .send(&request)
            .await
            .with_context(|| format!("failed to send Access-Request to {server}"))?;

        let mut buf = [0u8; 4096];
        let received = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ExchangeFailure::TimedOut)?
            .with_context(|| format!("failed to receive reply from {server}"))?;

        let code = packet::decode_reply(&buf[..received], identifier, &authenticator, secret)?;
        Ok(code)
    }
}

#[async_trait]
impl Verifier for RadiusClient {
    async fn verify(&self, username: &str, password: &str) -> VerificationOutcome {
        let mut causes = Vec::with_capacity(self.servers.len());
        let mut all_timed_out = !self.servers.is_empty();

        for server in &self.servers {
            match self.exchange(server, username, password).await {
                Ok(packet::ACCESS_ACCEPT) => {
                    debug!(server, username, "access-accept");
                    return VerificationOutcome::Accepted;
                }
                // A definitive reply from a reachable endpoint is the
                // authoritative answer; only unreachable endpoints are
                // skipped.
                Ok(code) => {
                    debug!(server, username, code, "non-accept reply");
                    return VerificationOutcome::Rejected;
                }
                Err(failure) => {
                    warn!(server, %failure, "RADIUS endpoint unreachable");
                    all_timed_out &= matches!(failure, ExchangeFailure::TimedOut);
                    causes.push(format!("{server}: {failure}"));
                }
            }
        }

        VerificationOutcome::Unreachable(UnreachableCause {
            timed_out: all_timed_out,
            detail: if causes.is_empty() {
                "no RADIUS endpoints configured".to_string()
            } else {
                causes.join("; ")
            },
        })
    }
}

impl std::fmt::Debug for RadiusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiusClient")
            .field("servers", &self.servers)
            .field("secret", &"***")
            .field("nas_identifier", &self.nas_identifier)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cr3t";

    fn client(servers: Vec<String>) -> RadiusClient {
        RadiusClient::new(servers, SecretString::from(SECRET.to_string()), "gw-test".to_string())
            .with_timeout(Duration::from_millis(200))
    }

    /// Spawn a RADIUS server answering every request with `code`, using
    /// `secret` for the response authenticator.
    async fn spawn_server(code: u8, secret: &'static str) -> String {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let Ok((received, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let header = packet::parse_request_header(&buf[..received]).unwrap();
                assert_eq!(header.code, packet::ACCESS_REQUEST);
                let reply = packet::encode_reply(
                    code,
                    header.identifier,
                    &header.authenticator,
                    secret.as_bytes(),
                );
                socket.send_to(&reply, peer).await.unwrap();
            }
        });
        addr.to_string()
    }

    /// An endpoint that swallows every request without answering, so the
    /// client's per-endpoint timeout is what fires.
    async fn silent_endpoint() -> String {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            while socket.recv_from(&mut buf).await.is_ok() {}
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn accept_from_first_endpoint() {
        let server = spawn_server(packet::ACCESS_ACCEPT, SECRET).await;
        let outcome = client(vec![server]).verify("alice", "secret").await;
        assert!(matches!(outcome, VerificationOutcome::Accepted));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_over_to_accept() {
        let silent = silent_endpoint().await;
        let live = spawn_server(packet::ACCESS_ACCEPT, SECRET).await;
        let outcome = client(vec![silent, live]).verify("alice", "secret").await;
        assert!(matches!(outcome, VerificationOutcome::Accepted));
    }

    #[tokio::test]
    async fn reject_is_authoritative_and_stops_the_scan() {
        let rejecting = spawn_server(packet::ACCESS_REJECT, SECRET).await;
        let accepting = spawn_server(packet::ACCESS_ACCEPT, SECRET).await;
        let outcome = client(vec![rejecting, accepting])
            .verify("alice", "bad-password")
            .await;
        assert!(matches!(outcome, VerificationOutcome::Rejected));
    }

    #[tokio::test]
    async fn all_endpoints_timing_out_is_unreachable() {
        let outcome = client(vec![silent_endpoint().await, silent_endpoint().await])
            .verify("alice", "secret")
            .await;
        match outcome {
            VerificationOutcome::Unreachable(cause) => {
                assert!(cause.timed_out);
                assert!(cause.detail.contains("timed out"));
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_with_wrong_secret_counts_as_unreachable() {
        let server = spawn_server(packet::ACCESS_ACCEPT, "other-secret").await;
        let outcome = client(vec![server]).verify("alice", "secret").await;
        match outcome {
            VerificationOutcome::Unreachable(cause) => {
                assert!(!cause.timed_out);
                assert!(cause.detail.contains("response-authenticator"));
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }
}
