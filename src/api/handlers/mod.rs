pub mod health;

use crate::gate::AuthenticatedUser;
use crate::GIT_COMMIT_HASH;
use axum::{response::IntoResponse, Extension, Json};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Banner {
    name: String,
    version: String,
    commit: String,
}

// axum handler for the service banner
pub async fn root() -> impl IntoResponse {
    Json(Banner {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
    })
}

#[derive(Serialize, Debug)]
pub struct Whoami {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

/// Catch-all standing in for the protected upstream: reports who the
/// middleware authenticated, if anyone.
pub async fn whoami(user: Option<Extension<AuthenticatedUser>>) -> impl IntoResponse {
    Json(Whoami {
        authenticated: user.is_some(),
        user: user.map(|Extension(AuthenticatedUser(username))| username),
    })
}
