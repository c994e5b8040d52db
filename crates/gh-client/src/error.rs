//! Typed GitHub API errors
//!
//! Callers need to tell "the thing is gone" apart from "the API call failed",
//! so octocrab errors are folded into two variants.

use thiserror::Error;

/// Result alias for GitHub client operations
pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitHubError {
    /// The PR, commit, branch or file does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response, malformed payload or transport failure
    #[error("GitHub API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },
}

impl GitHubError {
    pub fn api(message: impl Into<String>) -> Self {
        GitHubError::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

impl From<octocrab::Error> for GitHubError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status == 404 {
                    GitHubError::NotFound(source.message.clone())
                } else {
                    GitHubError::Api {
                        status: Some(status),
                        message: source.message.clone(),
                    }
                }
            }
            _ => GitHubError::api(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::api(format!("malformed payload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_status() {
        let err = GitHubError::Api {
            status: Some(422),
            message: "Validation Failed".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API error (422): Validation Failed");
    }

    #[test]
    fn test_display_without_status() {
        let err = GitHubError::api("connection reset");
        assert_eq!(err.to_string(), "GitHub API error: connection reset");
    }

    #[test]
    fn test_is_not_found() {
        assert!(GitHubError::NotFound("pull 1".into()).is_not_found());
        assert!(!GitHubError::api("boom").is_not_found());
    }
}
