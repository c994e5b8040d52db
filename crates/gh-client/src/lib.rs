//! GitHub API client for batch pull request rollouts
//!
//! This crate provides the trait-based capability surface the rollout
//! core needs from GitHub: reading pull requests and commit statuses,
//! reviewing, commenting, closing, merging, and deleting branches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              GitHubClient trait                  │
//! │  - fetch_pull_request()                          │
//! │  - fetch_commit_status()                         │
//! │  - create_review() / merge_pull_request() ...    │
//! └─────────────────────────────────────────────────┘
//!                        │
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │ OctocrabClient  │         │ in-memory fake      │
//! │ (direct API)    │         │ (rollout-core tests)│
//! └─────────────────┘         └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use gh_client::GitHubClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = gh_client::connect(None).await?;
//! let pr = client.fetch_pull_request("owner", "repo", 42).await?;
//! println!("{} is {:?}", pr.html_url, pr.mergeable_state);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod octocrab_client;
pub mod token;
pub mod types;

/// Default GitHub host (public GitHub)
pub const DEFAULT_HOST: &str = "github.com";

pub use client::GitHubClient;
pub use error::{GitHubError, Result};
pub use octocrab_client::OctocrabClient;
pub use token::{TokenResolver, connect};
pub use types::{
    CheckState, CheckStatus, CommitStatus, ContentEntry, ContentKind, MergeMethod, MergeResult,
    MergeableState, PullRequest, PullRequestState, ReviewEvent,
};
