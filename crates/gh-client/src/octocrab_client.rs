//! Octocrab-based GitHub API client
//!
//! Direct implementation of the `GitHubClient` trait using the octocrab library.

use crate::client::GitHubClient;
use crate::error::{GitHubError, Result};
use crate::types::{
    CheckState, CheckStatus, CommitStatus, ContentEntry, ContentKind, MergeMethod, MergeResult,
    MergeableState, PullRequest, PullRequestState, ReviewEvent,
};
use async_trait::async_trait;
use log::debug;
use octocrab::Octocrab;
use std::sync::Arc;
use std::time::Duration;

/// How often to re-fetch a PR whose mergeable state GitHub has not computed yet
const MERGEABLE_RETRIES: usize = 3;
const MERGEABLE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Direct GitHub API client using octocrab
#[derive(Debug, Clone)]
pub struct OctocrabClient {
    octocrab: Arc<Octocrab>,
}

impl OctocrabClient {
    /// Create a new client with the given octocrab instance
    pub fn new(octocrab: Arc<Octocrab>) -> Self {
        Self { octocrab }
    }

    /// Get a reference to the underlying octocrab instance
    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }
}

#[async_trait]
impl GitHubClient for OctocrabClient {
    async fn fetch_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<PullRequest> {
        debug!("Fetching PR #{} in {}/{}", pr_number, owner, repo);

        let mut pr = self.octocrab.pulls(owner, repo).get(pr_number).await?;

        // GitHub computes mergeability in the background after the first request
        let mut attempts = 0;
        while pr.mergeable.is_none() && attempts < MERGEABLE_RETRIES {
            attempts += 1;
            debug!(
                "Mergeable state of {}/{}#{} not computed yet, retry {}",
                owner, repo, pr_number, attempts
            );
            tokio::time::sleep(MERGEABLE_RETRY_DELAY).await;
            pr = self.octocrab.pulls(owner, repo).get(pr_number).await?;
        }

        Ok(convert_pull_request(&pr))
    }

    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        title: &str,
    ) -> Result<Option<PullRequest>> {
        debug!(
            "Looking for open PR '{}' by {} in {}/{}",
            title, author, owner, repo
        );

        let repository = self.octocrab.repos(owner, repo).get().await?;
        let default_branch = repository
            .default_branch
            .unwrap_or_else(|| "main".to_string());

        let page = self
            .octocrab
            .pulls(owner, repo)
            .list()
            .state(octocrab::params::State::Open)
            .base(default_branch)
            .sort(octocrab::params::pulls::Sort::Created)
            .direction(octocrab::params::Direction::Descending)
            .per_page(100)
            .send()
            .await?;
        let pulls = self.octocrab.all_pages(page).await?;

        // Sorted newest first, so the first match is the most recent one
        let found = pulls.iter().find(|pr| {
            let login = pr.user.as_ref().map(|u| u.login.as_str());
            login == Some(author) && pr.title.as_deref() == Some(title)
        });

        Ok(found.map(convert_pull_request))
    }

    async fn fetch_commit_status(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<CheckStatus> {
        debug!(
            "Fetching commit status for {}/{} @ {}",
            owner, repo, commit_sha
        );

        // Use raw GET request since octocrab's Reference type doesn't support commit SHAs
        let route = format!("/repos/{}/{}/commits/{}/status", owner, repo, commit_sha);
        let status: octocrab::models::CombinedStatus =
            self.octocrab.get(route, None::<&()>).await?;

        let state = convert_status_state(&status.state);
        let statuses = status
            .statuses
            .into_iter()
            .map(|s| CommitStatus {
                context: s.context.unwrap_or_else(|| "unknown".to_string()),
                state: convert_status_state(&s.state),
                description: s.description,
                target_url: s.target_url,
            })
            .collect();

        Ok(CheckStatus {
            state,
            total_count: status.total_count as u64,
            statuses,
        })
    }

    async fn list_directory(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>> {
        debug!("Listing {}/{}:{}", owner, repo, path);

        let contents = self
            .octocrab
            .repos(owner, repo)
            .get_content()
            .path(path)
            .send()
            .await?;

        Ok(contents
            .items
            .into_iter()
            .map(|item| ContentEntry {
                kind: convert_content_kind(&item.r#type),
                name: item.name,
                path: item.path,
            })
            .collect())
    }

    async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> Result<String> {
        debug!("Reading {}/{}:{}", owner, repo, path);

        let contents = self
            .octocrab
            .repos(owner, repo)
            .get_content()
            .path(path)
            .send()
            .await?;

        match contents.items.as_slice() {
            [item] => item
                .decoded_content()
                .ok_or_else(|| GitHubError::api(format!("{} has no decodable content", path))),
            [] => Err(GitHubError::NotFound(path.to_string())),
            _ => Err(GitHubError::api(format!("{} is a directory", path))),
        }
    }

    async fn create_review(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        commit_id: &str,
        event: ReviewEvent,
        body: Option<&str>,
    ) -> Result<()> {
        debug!("Creating {:?} review on {}/{}#{}", event, owner, repo, pr_number);

        let route = format!("/repos/{}/{}/pulls/{}/reviews", owner, repo, pr_number);
        let mut payload = serde_json::json!({
            "commit_id": commit_id,
            "event": event,
        });
        if let Some(body) = body {
            payload["body"] = serde_json::Value::from(body);
        }

        let _: serde_json::Value = self.octocrab.post(route, Some(&payload)).await?;
        Ok(())
    }

    async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<()> {
        debug!("Commenting '{}' on {}/{}#{}", body, owner, repo, pr_number);

        self.octocrab
            .issues(owner, repo)
            .create_comment(pr_number, body)
            .await?;
        Ok(())
    }

    async fn close_pull_request(&self, owner: &str, repo: &str, pr_number: u64) -> Result<()> {
        debug!("Closing {}/{}#{}", owner, repo, pr_number);

        self.octocrab
            .pulls(owner, repo)
            .update(pr_number)
            .state(octocrab::params::pulls::State::Closed)
            .send()
            .await?;
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
        commit_message: Option<&str>,
    ) -> Result<MergeResult> {
        debug!(
            "Merging {}/{}#{} with {:?}",
            owner, repo, pr_number, merge_method
        );

        let pulls = self.octocrab.pulls(owner, repo);
        let mut request = pulls
            .merge(pr_number)
            .method(convert_merge_method(merge_method));
        if let Some(title) = commit_title {
            request = request.title(title);
        }
        if let Some(message) = commit_message {
            request = request.message(message);
        }

        let merge = request.send().await?;
        Ok(MergeResult {
            merged: merge.merged,
            sha: merge.sha,
            message: merge.message.unwrap_or_default(),
        })
    }

    async fn delete_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<()> {
        debug!("Deleting branch {} in {}/{}", branch, owner, repo);

        self.octocrab
            .repos(owner, repo)
            .delete_ref(&octocrab::params::repos::Reference::Branch(
                branch.to_string(),
            ))
            .await?;
        Ok(())
    }
}

/// Convert octocrab PullRequest to our PullRequest type
fn convert_pull_request(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    let state = match pr.state {
        Some(octocrab::models::IssueState::Closed) => PullRequestState::Closed,
        _ => PullRequestState::Open,
    };

    PullRequest {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        author: pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        state,
        merged: pr.merged_at.is_some(),
        head_sha: pr.head.sha.clone(),
        head_branch: pr.head.ref_field.clone(),
        base_branch: pr.base.ref_field.clone(),
        mergeable: pr.mergeable,
        mergeable_state: pr.mergeable_state.as_ref().map(convert_mergeable_state),
        html_url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
        created_at: pr.created_at.unwrap_or_else(chrono::Utc::now),
        updated_at: pr.updated_at.unwrap_or_else(chrono::Utc::now),
    }
}

/// Convert octocrab MergeableState enum to our enum
fn convert_mergeable_state(state: &octocrab::models::pulls::MergeableState) -> MergeableState {
    use octocrab::models::pulls::MergeableState as OMS;
    match state {
        OMS::Clean => MergeableState::Clean,
        OMS::Behind => MergeableState::Behind,
        OMS::Dirty => MergeableState::Dirty,
        OMS::Blocked => MergeableState::Blocked,
        OMS::Unstable => MergeableState::Unstable,
        OMS::Draft => MergeableState::Draft,
        OMS::HasHooks => MergeableState::HasHooks,
        _ => MergeableState::Unknown,
    }
}

fn convert_merge_method(method: MergeMethod) -> octocrab::params::pulls::MergeMethod {
    match method {
        MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
        MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
        MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
    }
}

fn convert_content_kind(kind: &str) -> ContentKind {
    match kind {
        "file" => ContentKind::File,
        "dir" => ContentKind::Dir,
        _ => ContentKind::Other,
    }
}

/// Convert octocrab StatusState to our CheckState
fn convert_status_state(state: &octocrab::models::StatusState) -> CheckState {
    match state {
        octocrab::models::StatusState::Success => CheckState::Success,
        octocrab::models::StatusState::Pending => CheckState::Pending,
        octocrab::models::StatusState::Failure => CheckState::Failure,
        octocrab::models::StatusState::Error => CheckState::Error,
        _ => CheckState::Pending,
    }
}
