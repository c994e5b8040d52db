//! GitHub client trait
//!
//! This module defines the `GitHubClient` trait: the capability surface the
//! rollout core consumes. The octocrab implementation lives in
//! `octocrab_client`; tests substitute an in-memory fake.

use crate::error::Result;
use crate::types::{CheckStatus, ContentEntry, MergeMethod, MergeResult, PullRequest, ReviewEvent};
use async_trait::async_trait;

/// GitHub API client trait
///
/// Every operation may fail with `GitHubError::NotFound` when the addressed
/// object is gone, or `GitHubError::Api` for any other failure.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so probes can fan out requests
/// concurrently.
///
/// # Example
///
/// ```rust,ignore
/// use gh_client::{GitHubClient, PullRequest};
///
/// async fn head_of(client: &dyn GitHubClient) -> gh_client::Result<String> {
///     let pr = client.fetch_pull_request("statisticsnorway", "some-iac", 12).await?;
///     Ok(pr.head_sha)
/// }
/// ```
#[async_trait]
pub trait GitHubClient: Send + Sync {
    // === Reads ===

    /// Fetch a single pull request by number
    ///
    /// Includes the mergeable state, which GitHub computes lazily.
    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<PullRequest>;

    /// Find the most recent open pull request against the default branch
    /// authored by `author` with exactly `title`
    ///
    /// Returns `Ok(None)` when the repository exists but has no such PR.
    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        title: &str,
    ) -> Result<Option<PullRequest>>;

    /// Fetch combined commit status (legacy Status API)
    ///
    /// Atlantis reports plan results through commit statuses, which is
    /// why this is preferred over check runs.
    async fn fetch_commit_status(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<CheckStatus>;

    /// List a directory in the default branch of a repository
    async fn list_directory(&self, owner: &str, repo: &str, path: &str)
    -> Result<Vec<ContentEntry>>;

    /// Read a file in the default branch of a repository as UTF-8 text
    async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> Result<String>;

    // === PR Operations ===

    /// Create a review on a pull request, pinned to `commit_id`
    async fn create_review(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        commit_id: &str,
        event: ReviewEvent,
        body: Option<&str>,
    ) -> Result<()>;

    /// Post a conversation (issue) comment on a pull request
    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<()>;

    /// Close a pull request without merging
    async fn close_pull_request(&self, owner: &str, repo: &str, pr_number: u64) -> Result<()>;

    /// Merge a pull request
    ///
    /// A response with `merged == false` is returned as `Ok`; transport and
    /// HTTP failures are errors.
    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> Result<MergeResult>;

    /// Delete a branch (`refs/heads/{branch}`)
    async fn delete_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<()>;
}
