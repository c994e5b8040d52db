//! GitHub API data transfer objects
//!
//! These types represent the data returned from the GitHub API.
//! They are intentionally separate from the rollout domain model
//! to keep this crate pure and reusable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pull request from the GitHub API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number (e.g., 123)
    pub number: u64,

    /// PR title
    pub title: String,

    /// Author's GitHub username
    pub author: String,

    /// Open or closed
    pub state: PullRequestState,

    /// Whether the PR has been merged
    pub merged: bool,

    /// HEAD commit SHA
    pub head_sha: String,

    /// HEAD branch name (e.g., "update/template")
    pub head_branch: String,

    /// Base branch name (e.g., "main")
    pub base_branch: String,

    /// Whether the PR is mergeable (null if not yet computed by GitHub)
    pub mergeable: Option<bool>,

    /// Mergeable state from GitHub
    pub mergeable_state: Option<MergeableState>,

    /// PR URL for opening in browser
    pub html_url: String,

    /// When the PR was created
    pub created_at: DateTime<Utc>,

    /// When the PR was last updated
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    /// True when GitHub reports the PR as cleanly mergeable
    pub fn is_clean(&self) -> bool {
        self.mergeable_state == Some(MergeableState::Clean)
    }
}

/// Open/closed state of a pull request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
}

/// Mergeable state as reported by GitHub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    /// The merge is clean
    Clean,
    /// The head branch is behind the base branch
    Behind,
    /// The merge has conflicts
    Dirty,
    /// The merge is blocked (e.g., by required reviews)
    Blocked,
    /// CI checks are failing or pending
    Unstable,
    /// The PR is a draft
    Draft,
    /// Mergeable with passing commit status and pre-receive hooks
    HasHooks,
    /// State is unknown or not yet computed
    #[default]
    Unknown,
}

impl std::fmt::Display for MergeableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeableState::Clean => "clean",
            MergeableState::Behind => "behind",
            MergeableState::Dirty => "dirty",
            MergeableState::Blocked => "blocked",
            MergeableState::Unstable => "unstable",
            MergeableState::Draft => "draft",
            MergeableState::HasHooks => "has_hooks",
            MergeableState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Combined commit status from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatus {
    /// Overall state combining all statuses
    pub state: CheckState,

    /// Total number of status checks
    pub total_count: u64,

    /// Individual statuses
    pub statuses: Vec<CommitStatus>,
}

/// Overall state of combined commit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// All checks passed
    Success,
    /// At least one check is pending
    Pending,
    /// At least one check failed
    Failure,
    /// Error retrieving status
    Error,
}

/// Individual commit status (from the Status API, not Checks API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Status context (e.g., "atlantis/plan")
    pub context: String,

    /// Current state
    pub state: CheckState,

    /// Description of the status
    pub description: Option<String>,

    /// URL for more details
    pub target_url: Option<String>,
}

/// Merge method for pull requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    #[default]
    Squash,
    /// Rebase commits onto the base branch
    Rebase,
}

/// Result of a merge operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// Commit SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation
    pub message: String,
}

/// Review event type for PR reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    /// Approve the PR
    Approve,
    /// Request changes
    RequestChanges,
    /// Comment only (no approval/rejection)
    Comment,
}

/// An entry of a repository directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// File or directory name
    pub name: String,
    /// Path relative to the repository root
    pub path: String,
    /// Entry kind
    pub kind: ContentKind,
}

/// Kind of a repository content entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    File,
    Dir,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pr() -> PullRequest {
        PullRequest {
            number: 42,
            title: "Update team template".to_string(),
            author: "github-actions[bot]".to_string(),
            state: PullRequestState::Open,
            merged: false,
            head_sha: "abc123".to_string(),
            head_branch: "update/template".to_string(),
            base_branch: "main".to_string(),
            mergeable: Some(true),
            mergeable_state: Some(MergeableState::Clean),
            html_url: "https://github.com/owner/repo/pull/42".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mergeable_state_default() {
        assert_eq!(MergeableState::default(), MergeableState::Unknown);
    }

    #[test]
    fn test_is_clean() {
        let mut pr = sample_pr();
        assert!(pr.is_clean());

        pr.mergeable_state = Some(MergeableState::Blocked);
        assert!(!pr.is_clean());

        pr.mergeable_state = None;
        assert!(!pr.is_clean());
    }

    #[test]
    fn test_mergeable_state_display_matches_serde() {
        let states = [
            MergeableState::Clean,
            MergeableState::Behind,
            MergeableState::Dirty,
            MergeableState::Blocked,
            MergeableState::Unstable,
            MergeableState::Draft,
            MergeableState::HasHooks,
            MergeableState::Unknown,
        ];

        for state in states {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }

    #[test]
    fn test_review_event_serde() {
        let json = serde_json::to_string(&ReviewEvent::Approve).unwrap();
        assert_eq!(json, "\"APPROVE\"");
        let json = serde_json::to_string(&ReviewEvent::RequestChanges).unwrap();
        assert_eq!(json, "\"REQUEST_CHANGES\"");
    }
}
