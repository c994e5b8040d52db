//! Error types for rollout operations

use gh_client::GitHubError;
use thiserror::Error;

use crate::store::StorageError;

/// Result alias used across the rollout core
pub type Result<T> = std::result::Result<T, RolloutError>;

#[derive(Debug, Error)]
pub enum RolloutError {
    /// A run, PR, commit or branch is absent
    #[error("{0} not found")]
    NotFound(String),

    /// GitHub rejected a call that the batch could not absorb
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error("state storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid state document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operator answered "no" to a confirmation prompt
    #[error("aborted by operator")]
    UserDeclined,

    /// No run selected, unknown repository, invalid input
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RolloutError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RolloutError::Configuration(message.into())
    }

    /// Process exit code reported at the command boundary
    pub fn exit_code(&self) -> i32 {
        match self {
            RolloutError::UserDeclined | RolloutError::Configuration(_) => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_error_is_transparent() {
        let err: RolloutError = GitHubError::NotFound("pull 3".into()).into();
        assert_eq!(err.to_string(), "not found: pull 3");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RolloutError::UserDeclined.exit_code(), 1);
        assert_eq!(RolloutError::configuration("no runs").exit_code(), 1);
        assert_eq!(RolloutError::NotFound("run".into()).exit_code(), 2);
    }
}
