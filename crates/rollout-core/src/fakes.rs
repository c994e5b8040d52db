//! In-memory fakes for the GitHub and console seams (testing only)
//!
//! `FakeGitHub` serves pull requests, statuses and repository contents from
//! maps and records every call; `ScriptedConsole` answers prompts from a
//! queue and records everything printed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::DateTime;
use gh_client::{
    CheckState, CheckStatus, ContentEntry, ContentKind, GitHubClient, GitHubError, MergeMethod,
    MergeResult, MergeableState, PullRequest, PullRequestState, ReviewEvent,
};

use crate::console::{Console, Notice};
use crate::model::BatchState;

pub use crate::store::MemoryBlobStore;

type RepoKey = (String, String);
type PathKey = (String, String, String);

fn repo_key(owner: &str, repo: &str) -> RepoKey {
    (owner.to_string(), repo.to_string())
}

fn path_key(owner: &str, repo: &str, path: &str) -> PathKey {
    (owner.to_string(), repo.to_string(), path.to_string())
}

/// An open, cleanly mergeable template PR
pub fn pull_request(number: u64, head_sha: &str) -> PullRequest {
    let created = DateTime::from_timestamp(1_700_000_000 + number as i64 * 60, 0).unwrap_or_default();
    PullRequest {
        number,
        title: "Update team template".to_string(),
        author: "github-actions[bot]".to_string(),
        state: PullRequestState::Open,
        merged: false,
        head_sha: head_sha.to_string(),
        head_branch: "update/template".to_string(),
        base_branch: "main".to_string(),
        mergeable: Some(true),
        mergeable_state: Some(MergeableState::Clean),
        html_url: format!("https://github.com/statisticsnorway/example/pull/{}", number),
        created_at: created,
        updated_at: created,
    }
}

// ---------------------------------------------------------------------------
// FakeGitHub
// ---------------------------------------------------------------------------

/// A recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub detail: String,
}

const MUTATIONS: &[&str] = &[
    "create_review",
    "create_issue_comment",
    "close_pull_request",
    "merge_pull_request",
    "delete_branch",
];

#[derive(Debug, Default)]
pub struct FakeGitHub {
    pull_requests: HashMap<RepoKey, Vec<PullRequest>>,
    statuses: HashMap<PathKey, CheckState>,
    directories: HashMap<PathKey, Vec<ContentEntry>>,
    files: HashMap<PathKey, String>,
    failures: HashMap<(String, String), GitHubError>,
    refused_merges: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pull_request(mut self, owner: &str, repo: &str, pr: PullRequest) -> Self {
        self.pull_requests
            .entry(repo_key(owner, repo))
            .or_default()
            .push(pr);
        self
    }

    pub fn with_commit_status(mut self, owner: &str, repo: &str, sha: &str, state: CheckState) -> Self {
        self.statuses.insert(path_key(owner, repo, sha), state);
        self
    }

    /// Directory listing; entries whose name has no '.' are directories
    pub fn with_directory(mut self, owner: &str, repo: &str, path: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|name| ContentEntry {
                name: name.to_string(),
                path: format!("{}/{}", path.trim_end_matches('/'), name),
                kind: if name.contains('.') {
                    ContentKind::File
                } else {
                    ContentKind::Dir
                },
            })
            .collect();
        self.directories.insert(path_key(owner, repo, path), entries);
        self
    }

    pub fn with_file(mut self, owner: &str, repo: &str, path: &str, content: &str) -> Self {
        self.files
            .insert(path_key(owner, repo, path), content.to_string());
        self
    }

    /// Make `method` fail with an API error for `repo`
    pub fn failing(self, method: &str, repo: &str) -> Self {
        self.failing_with(
            method,
            repo,
            GitHubError::Api {
                status: Some(500),
                message: "injected failure".to_string(),
            },
        )
    }

    pub fn failing_with(mut self, method: &str, repo: &str, error: GitHubError) -> Self {
        self.failures
            .insert((method.to_string(), repo.to_string()), error);
        self
    }

    /// Merges of `repo` come back with `merged == false`
    pub fn refusing_merge(mut self, repo: &str) -> Self {
        self.refused_merges.insert(repo.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Details of every call to `method`, in call order
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .map(|call| call.detail)
            .collect()
    }

    /// Calls that would have changed something on GitHub
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| MUTATIONS.contains(&call.method))
            .collect()
    }

    fn record(&self, method: &'static str, repo: &str, detail: String) -> gh_client::Result<()> {
        self.calls.lock().unwrap().push(Call { method, detail });
        match self.failures.get(&(method.to_string(), repo.to_string())) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn pull_requests(&self, owner: &str, repo: &str) -> &[PullRequest] {
        self.pull_requests
            .get(&repo_key(owner, repo))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn review_tag(event: ReviewEvent) -> &'static str {
    match event {
        ReviewEvent::Approve => "APPROVE",
        ReviewEvent::RequestChanges => "REQUEST_CHANGES",
        ReviewEvent::Comment => "COMMENT",
    }
}

fn merge_tag(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Merge => "merge",
        MergeMethod::Squash => "squash",
        MergeMethod::Rebase => "rebase",
    }
}

#[async_trait]
impl GitHubClient for FakeGitHub {
    async fn fetch_pull_request(&self, owner: &str, repo: &str, pr_number: u64) -> gh_client::Result<PullRequest> {
        self.record("fetch_pull_request", repo, format!("{}#{}", repo, pr_number))?;
        self.pull_requests(owner, repo)
            .iter()
            .find(|pr| pr.number == pr_number)
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(format!("{}/{}#{}", owner, repo, pr_number)))
    }

    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        title: &str,
    ) -> gh_client::Result<Option<PullRequest>> {
        self.record("find_open_pull_request", repo, repo.to_string())?;
        Ok(self
            .pull_requests(owner, repo)
            .iter()
            .filter(|pr| pr.state == PullRequestState::Open && pr.author == author && pr.title == title)
            .max_by_key(|pr| (pr.created_at, pr.number))
            .cloned())
    }

    async fn fetch_commit_status(&self, owner: &str, repo: &str, commit_sha: &str) -> gh_client::Result<CheckStatus> {
        self.record("fetch_commit_status", repo, format!("{} {}", repo, commit_sha))?;
        match self.statuses.get(&path_key(owner, repo, commit_sha)) {
            Some(state) => Ok(CheckStatus {
                state: *state,
                total_count: 1,
                statuses: Vec::new(),
            }),
            None => Err(GitHubError::NotFound(format!("commit {}", commit_sha))),
        }
    }

    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> gh_client::Result<Vec<ContentEntry>> {
        self.record("list_directory", repo, format!("{} {}", repo, path))?;
        self.directories
            .get(&path_key(owner, repo, path))
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(path.to_string()))
    }

    async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> gh_client::Result<String> {
        self.record("fetch_file", repo, format!("{} {}", repo, path))?;
        self.files
            .get(&path_key(owner, repo, path))
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(path.to_string()))
    }

    async fn create_review(
        &self,
        _owner: &str,
        repo: &str,
        pr_number: u64,
        commit_id: &str,
        event: ReviewEvent,
        body: Option<&str>,
    ) -> gh_client::Result<()> {
        let detail = format!(
            "{}#{} {} {} {}",
            repo,
            pr_number,
            commit_id,
            review_tag(event),
            body.unwrap_or_default()
        );
        self.record("create_review", repo, detail)
    }

    async fn create_issue_comment(&self, _owner: &str, repo: &str, pr_number: u64, body: &str) -> gh_client::Result<()> {
        self.record("create_issue_comment", repo, format!("{}#{} {}", repo, pr_number, body))
    }

    async fn close_pull_request(&self, _owner: &str, repo: &str, pr_number: u64) -> gh_client::Result<()> {
        self.record("close_pull_request", repo, format!("{}#{}", repo, pr_number))
    }

    async fn merge_pull_request(
        &self,
        _owner: &str,
        repo: &str,
        pr_number: u64,
        merge_method: MergeMethod,
        _commit_title: Option<&str>,
        _commit_message: Option<&str>,
    ) -> gh_client::Result<MergeResult> {
        self.record(
            "merge_pull_request",
            repo,
            format!("{}#{} {}", repo, pr_number, merge_tag(merge_method)),
        )?;

        if self.refused_merges.contains(repo) {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: "Pull Request is not mergeable".to_string(),
            });
        }
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("merge-{}", pr_number)),
            message: "Pull Request successfully merged".to_string(),
        })
    }

    async fn delete_branch(&self, _owner: &str, repo: &str, branch: &str) -> gh_client::Result<()> {
        self.record("delete_branch", repo, format!("{} {}", repo, branch))
    }
}

// ---------------------------------------------------------------------------
// ScriptedConsole
// ---------------------------------------------------------------------------

/// Console that answers from queues and records output
///
/// Running out of scripted answers is an error, so an unexpected prompt
/// fails the test instead of blocking.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    confirms: Mutex<VecDeque<bool>>,
    selections: Mutex<VecDeque<Option<usize>>>,
    inputs: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
    output: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirm(self, answer: bool) -> Self {
        self.confirms.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_selection(self, choice: Option<usize>) -> Self {
        self.selections.lock().unwrap().push_back(choice);
        self
    }

    pub fn with_input(self, answer: &str) -> Self {
        self.inputs.lock().unwrap().push_back(answer.to_string());
        self
    }

    /// Every question asked, in order
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    /// Every line printed, in order
    pub fn output(&self) -> Vec<String> {
        self.output.lock().unwrap().clone()
    }

    fn print(&self, line: String) {
        self.output.lock().unwrap().push(line);
    }

    fn ask(&self, question: &str) {
        self.questions.lock().unwrap().push(question.to_string());
    }
}

impl Console for ScriptedConsole {
    fn heading(&self, text: &str) {
        self.print(format!("# {}", text));
    }

    fn repo(&self, name: &str) {
        self.print(format!("[{}]", name));
    }

    fn notice(&self, level: Notice, message: &str) {
        let tag = match level {
            Notice::Success => "ok",
            Notice::Warning => "warn",
            Notice::Failure => "fail",
        };
        self.print(format!("  {}: {}", tag, message));
    }

    fn info(&self, message: &str) {
        self.print(message.to_string());
    }

    fn show_state(&self, state: &BatchState, repo: Option<&str>) {
        match repo {
            Some(repo) => self.print(format!("table {} [{}]", state.name, repo)),
            None => self.print(format!("table {} ({} repos)", state.name, state.len())),
        }
    }

    fn confirm(&self, question: &str) -> anyhow::Result<bool> {
        self.ask(question);
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation: {}", question))
    }

    fn select(&self, question: &str, _choices: &[String]) -> anyhow::Result<Option<usize>> {
        self.ask(question);
        self.selections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected selection: {}", question))
    }

    fn input(&self, question: &str) -> anyhow::Result<String> {
        self.ask(question);
        self.inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected input prompt: {}", question))
    }
}
