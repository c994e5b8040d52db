//! Synchronise `checks` and `atlantis_apply` with GitHub
//!
//! Fetches run concurrently inside a bounded window; results are applied to
//! the state one repository at a time in name order, so console output and
//! the persisted state do not depend on response timing.

use futures::stream::{self, StreamExt};
use gh_client::{CheckState, GitHubClient, GitHubError, PullRequest};
use log::{debug, warn};
use std::fmt;

use crate::console::Console;
use crate::model::{BatchState, Status, WorkflowStatus};

/// Names of the repositories per probe result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub pruned: Vec<String>,
}

impl ProbeReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len() + self.pruned.len()
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "succeeded {}, failed {}, skipped {}",
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        if !self.pruned.is_empty() {
            write!(f, ", pruned {}", self.pruned.len())?;
        }
        write!(f, " (total {})", self.total())
    }
}

/// What a fetch found for one repository
enum Lookup<T> {
    Found(T),
    /// No PR number recorded, or GitHub answered 404
    Missing(String),
    /// The PR exists but its head commit has no status
    NoStatus(String),
    Error(GitHubError),
}

pub struct Prober<'a> {
    github: &'a dyn GitHubClient,
    owner: &'a str,
    console: &'a dyn Console,
    concurrency: usize,
}

impl<'a> Prober<'a> {
    pub fn new(github: &'a dyn GitHubClient, owner: &'a str, console: &'a dyn Console) -> Self {
        Self {
            github,
            owner,
            console,
            concurrency: 1,
        }
    }

    /// Number of repositories fetched in parallel (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Map the head commit's combined status onto `checks`
    ///
    /// Pending counts as failed. A PR that cannot be located removes the
    /// repository from the run unless `prune_missing` is false.
    pub async fn probe_checks(&self, state: &mut BatchState, prune_missing: bool) -> ProbeReport {
        self.console.heading("Probing checks..");

        let targets = pr_numbers(state);
        let results: Vec<(String, Lookup<CheckState>)> = stream::iter(targets)
            .map(|(name, number)| async move {
                let lookup = self.fetch_check_state(&name, number).await;
                (name, lookup)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ProbeReport::default();
        for (name, lookup) in results {
            self.console.repo(&name);

            match lookup {
                Lookup::Missing(reason) if prune_missing => {
                    warn!("Pruning {} from run {}: {}", name, state.name, reason);
                    state.prune(&name);
                    self.console.failure(&format!(
                        "{}. Removed the repository from the run, this cannot be undone",
                        reason
                    ));
                    report.pruned.push(name);
                }
                Lookup::Missing(reason) | Lookup::NoStatus(reason) => {
                    self.console.warning(&reason);
                    self.console.skipping();
                    report.skipped.push(name);
                }
                Lookup::Error(err) => {
                    set_stage(state, &name, |w| w.checks = Status::Fail);
                    self.console.failure(&format!("Could not read checks: {}", err));
                    report.failed.push(name);
                }
                Lookup::Found(check) => {
                    let status = checks_status(check);
                    set_stage(state, &name, |w| w.checks = status);
                    match check {
                        CheckState::Success => self.console.success("Checks passed"),
                        CheckState::Pending => self.console.warning("Checks pending"),
                        CheckState::Failure | CheckState::Error => {
                            self.console.failure("Checks failed")
                        }
                    }
                    if status == Status::Success {
                        report.succeeded.push(name);
                    } else {
                        report.failed.push(name);
                    }
                }
            }
        }

        debug!("Probed checks for run {}: {}", state.name, report);
        report
    }

    /// Map merge readiness onto `atlantis_apply`
    ///
    /// Read-only on GitHub. Missing PRs are skipped, never pruned.
    pub async fn probe_apply(&self, state: &mut BatchState) -> ProbeReport {
        self.console.heading("Probing atlantis apply..");

        let targets = pr_numbers(state);
        let results: Vec<(String, Lookup<PullRequest>)> = stream::iter(targets)
            .map(|(name, number)| async move {
                let lookup = self.fetch_pull_request(&name, number).await;
                (name, lookup)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ProbeReport::default();
        for (name, lookup) in results {
            self.console.repo(&name);

            match lookup {
                Lookup::Missing(reason) | Lookup::NoStatus(reason) => {
                    self.console.warning(&reason);
                    self.console.skipping();
                    report.skipped.push(name);
                }
                Lookup::Error(err) => {
                    self.console.failure(&format!("Could not read pull request: {}", err));
                    report.failed.push(name);
                }
                Lookup::Found(pr) if pr.is_clean() => {
                    set_stage(state, &name, |w| w.atlantis_apply = Status::Success);
                    self.console.success("Mergeable, apply has succeeded");
                    report.succeeded.push(name);
                }
                Lookup::Found(pr) => {
                    set_stage(state, &name, |w| w.atlantis_apply = Status::Fail);
                    let mergeable = pr
                        .mergeable_state
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    self.console
                        .failure(&format!("Not mergeable (state: {})", mergeable));
                    report.failed.push(name);
                }
            }
        }

        debug!("Probed apply for run {}: {}", state.name, report);
        report
    }

    async fn fetch_pull_request(&self, repo: &str, number: Option<u64>) -> Lookup<PullRequest> {
        let Some(number) = number else {
            return Lookup::Missing("No pull request number recorded".to_string());
        };

        match self.github.fetch_pull_request(self.owner, repo, number).await {
            Ok(pr) => Lookup::Found(pr),
            Err(GitHubError::NotFound(_)) => {
                Lookup::Missing(format!("Pull request #{} not found", number))
            }
            Err(err) => Lookup::Error(err),
        }
    }

    async fn fetch_check_state(&self, repo: &str, number: Option<u64>) -> Lookup<CheckState> {
        let pr = match self.fetch_pull_request(repo, number).await {
            Lookup::Found(pr) => pr,
            Lookup::Missing(reason) => return Lookup::Missing(reason),
            Lookup::NoStatus(reason) => return Lookup::NoStatus(reason),
            Lookup::Error(err) => return Lookup::Error(err),
        };

        match self
            .github
            .fetch_commit_status(self.owner, repo, &pr.head_sha)
            .await
        {
            Ok(status) => Lookup::Found(status.state),
            Err(GitHubError::NotFound(_)) => {
                Lookup::NoStatus(format!("No commit status for {}", pr.head_sha))
            }
            Err(err) => Lookup::Error(err),
        }
    }
}

/// Combined CI state to `checks`
pub fn checks_status(state: CheckState) -> Status {
    match state {
        CheckState::Success => Status::Success,
        CheckState::Pending | CheckState::Failure | CheckState::Error => Status::Fail,
    }
}

fn pr_numbers(state: &BatchState) -> Vec<(String, Option<u64>)> {
    state
        .repos
        .values()
        .map(|repo| (repo.name.clone(), repo.pr.number))
        .collect()
}

fn set_stage(state: &mut BatchState, name: &str, update: impl FnOnce(&mut WorkflowStatus)) {
    if let Some(repo) = state.get_mut(name) {
        update(&mut repo.workflow);
    }
}
