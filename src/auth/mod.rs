//! Authentication for the GitLab API
//!
//! Supports environment variables and the `glab` CLI.

use crate::error::{Error, Result};
use std::process::Command;
use tracing::debug;

/// Primary token variable
pub const TOKEN_ENV: &str = "HOUSEKEEPER_GITLAB_API_TOKEN";

/// Fallback token variable shared with other GitLab tooling
pub const FALLBACK_TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// Resolved GitLab credentials
#[derive(Debug, Clone)]
pub struct GitLabAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

/// Find a GitLab token for `host`.
///
/// Checks `HOUSEKEEPER_GITLAB_API_TOKEN`, then `GITLAB_TOKEN`, then
/// `glab config get token`.
pub fn get_gitlab_auth(host: &str) -> Result<GitLabAuthConfig> {
    for var in [TOKEN_ENV, FALLBACK_TOKEN_ENV] {
        if let Some(token) = std::env::var(var).ok().filter(|t| !t.trim().is_empty()) {
            debug!(var, "using GitLab token from environment");
            return Ok(GitLabAuthConfig {
                token: token.trim().to_string(),
                source: AuthSource::EnvVar,
            });
        }
    }

    if let Some(token) = glab_token(host) {
        debug!(host, "using GitLab token from glab");
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    Err(Error::Config(format!(
        "no GitLab token found: set {TOKEN_ENV} or log in with `glab auth login`"
    )))
}

fn glab_token(host: &str) -> Option<String> {
    let output = Command::new("glab")
        .args(["config", "get", "token", "--host", host])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
