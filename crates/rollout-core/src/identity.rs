//! Operator identity
//!
//! Runs are named after the operator that created them (`pr-<operator>-...`)
//! and `--mine` filters on the same token.

use log::debug;
use rollout_config::AppConfig;
use tokio::process::Command;

use crate::error::{Result, RolloutError};

/// Identity token for the current operator
///
/// Uses `operator` from the config when set, otherwise the active gcloud
/// account with its `@domain` suffix removed.
pub async fn operator_identity(config: &AppConfig) -> Result<String> {
    if let Some(operator) = config.operator.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
        return Ok(operator.to_string());
    }

    let output = Command::new("gcloud")
        .args(["config", "list", "account", "--format", "value(core.account)"])
        .output()
        .await
        .map_err(|e| {
            RolloutError::configuration(format!(
                "Could not run gcloud to determine the operator ({}). Set 'operator' in the config file",
                e
            ))
        })?;

    let account = String::from_utf8_lossy(&output.stdout).to_string();
    match identity_from_account(&account) {
        Some(identity) => {
            debug!("Operator identity from gcloud: {}", identity);
            Ok(identity)
        }
        None => Err(RolloutError::configuration(
            "No active gcloud account. Run 'gcloud auth login' or set 'operator' in the config file",
        )),
    }
}

/// "ola@example.org\n" -> "ola"
pub fn identity_from_account(account: &str) -> Option<String> {
    let account = account.trim();
    let local = account.split('@').next().unwrap_or(account).trim();
    if local.is_empty() {
        None
    } else {
        Some(local.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_account() {
        assert_eq!(identity_from_account("ola@ssb.no\n").as_deref(), Some("ola"));
        assert_eq!(identity_from_account("kari").as_deref(), Some("kari"));
        assert_eq!(identity_from_account("  \n"), None);
        assert_eq!(identity_from_account("@ssb.no"), None);
    }

    #[tokio::test]
    async fn test_configured_operator_wins() {
        let config = AppConfig {
            operator: Some(" ola ".into()),
            ..AppConfig::default()
        };
        assert_eq!(operator_identity(&config).await.unwrap(), "ola");
    }
}
