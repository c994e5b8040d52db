//! Token resolution and client construction
//!
//! Builds an authenticated `OctocrabClient` for github.com or a GitHub
//! Enterprise host.

use crate::{DEFAULT_HOST, OctocrabClient};
use anyhow::{Context, Result};
use log::{debug, info};
use octocrab::Octocrab;
use std::sync::Arc;

/// Where a rollout finds its GitHub credentials
///
/// Lookup order for a host: `GITHUB_TOKEN_<HOST>`, then the `gh` CLI login,
/// then `GITHUB_TOKEN`/`GH_TOKEN` (github.com only).
#[derive(Debug, Clone, Default)]
pub struct TokenResolver {
    /// `GITHUB_TOKEN` or `GH_TOKEN`, read once
    default_token: Option<String>,
}

impl TokenResolver {
    pub fn new() -> Self {
        Self {
            default_token: ["GITHUB_TOKEN", "GH_TOKEN"]
                .into_iter()
                .find_map(|key| std::env::var(key).ok()),
        }
    }

    /// Token for `host` (None = github.com)
    pub async fn get_token(&self, host: Option<&str>) -> Result<String> {
        let host = host.unwrap_or(DEFAULT_HOST);
        let env_key = host_env_key(host);

        if let Ok(token) = std::env::var(&env_key) {
            debug!("GitHub token for {} from {}", host, env_key);
            return Ok(token);
        }
        if let Some(token) = gh_cli_token(host).await? {
            debug!("GitHub token for {} from gh CLI", host);
            return Ok(token);
        }
        match &self.default_token {
            Some(token) if host == DEFAULT_HOST => {
                debug!("GitHub token for {} from GITHUB_TOKEN/GH_TOKEN", host);
                Ok(token.clone())
            }
            _ => Err(anyhow::anyhow!(
                "No GitHub token for '{}'. Set {} or run 'gh auth login --hostname {}'",
                host,
                env_key,
                host
            )),
        }
    }
}

/// `gh auth token`; `None` when gh is missing or not logged in
async fn gh_cli_token(host: &str) -> Result<Option<String>> {
    let output = match tokio::process::Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .await
    {
        Ok(output) if output.status.success() => output,
        Ok(_) => return Ok(None),
        Err(e) => {
            debug!("gh CLI unavailable: {}", e);
            return Ok(None);
        }
    };

    let token = String::from_utf8(output.stdout).context("gh auth token printed invalid UTF-8")?;
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

/// Env var name holding a host-specific token
fn host_env_key(host: &str) -> String {
    format!(
        "GITHUB_TOKEN_{}",
        host.replace(['.', '-'], "_").to_uppercase()
    )
}

/// Create an authenticated client for the given host (None = github.com)
pub async fn connect(host: Option<&str>) -> Result<OctocrabClient> {
    let effective_host = host.unwrap_or(DEFAULT_HOST);
    info!("Creating GitHub client for host: {}", effective_host);

    let token = TokenResolver::new().get_token(host).await?;
    let mut builder = Octocrab::builder().personal_token(token);

    if effective_host != DEFAULT_HOST {
        let uri = format!("https://{}/api/v3", effective_host);
        builder = builder.base_uri(uri).context("Failed to set base URI")?;
    }

    let octocrab = builder.build().context("Failed to build Octocrab client")?;
    Ok(OctocrabClient::new(Arc::new(octocrab)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_resolver_env_key_generation() {
        let hosts = [
            ("github.com", "GITHUB_TOKEN_GITHUB_COM"),
            ("ghe.example.com", "GITHUB_TOKEN_GHE_EXAMPLE_COM"),
            (
                "github-enterprise.corp.com",
                "GITHUB_TOKEN_GITHUB_ENTERPRISE_CORP_COM",
            ),
        ];

        for (host, expected_key) in hosts {
            assert_eq!(
                host_env_key(host),
                expected_key,
                "Host '{}' should produce key '{}'",
                host,
                expected_key
            );
        }
    }

    #[tokio::test]
    async fn test_default_token_is_not_sent_to_enterprise_hosts() {
        let resolver = TokenResolver {
            default_token: Some("public-token".to_string()),
        };

        let err = resolver
            .get_token(Some("ghe.rollout-unknown.invalid"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN_GHE_ROLLOUT_UNKNOWN_INVALID"));
    }
}
