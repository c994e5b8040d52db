//! Command flows
//!
//! `Rollout` ties a run selection, the persist-always runner and the stage
//! executors together. Each command:
//!
//! 1. lets the operator pick a run (`StateStore::select_run`)
//! 2. loads it
//! 3. runs the batch inside `BatchRunner`, which saves the run whatever happens
//!
//! The `*_batch` methods hold the batch logic itself and work on an already
//! loaded `BatchState`.

use gh_client::GitHubClient;
use log::info;
use rollout_config::AppConfig;

use crate::console::Console;
use crate::error::{Result, RolloutError};
use crate::model::{BatchState, Status};
use crate::prober::{ProbeReport, Prober};
use crate::runner::BatchRunner;
use crate::stage::{BatchSummary, StageContext, StageExecutor, run_stage};
use crate::store::{RunEntry, StateStore};

pub struct Rollout<'a> {
    pub store: &'a StateStore,
    pub github: &'a dyn GitHubClient,
    pub console: &'a dyn Console,
    pub config: &'a AppConfig,
    /// Offer runs created by other operators too
    pub include_other_users: bool,
}

impl<'a> Rollout<'a> {
    pub fn prober(&self) -> Prober<'a> {
        Prober::new(self.github, &self.config.github_org, self.console)
            .with_concurrency(self.config.probe_window())
    }

    fn stage_context(&self) -> StageContext<'a> {
        StageContext {
            github: self.github,
            owner: &self.config.github_org,
            console: self.console,
            approval_message: &self.config.approval_message,
        }
    }

    fn confirm(&self, question: &str) -> Result<()> {
        if self.console.confirm(question)? {
            Ok(())
        } else {
            Err(RolloutError::UserDeclined)
        }
    }

    /// Select and load a run; `None` when the operator cancelled
    async fn select(&self) -> Result<Option<BatchState>> {
        let state = self
            .store
            .load_selected(self.include_other_users, self.console)
            .await?;
        if state.is_none() {
            self.console.info("Cancelled");
        }
        Ok(state)
    }

    // === Batch operations on a loaded run ===

    pub async fn probe_checks_batch(&self, state: &mut BatchState, prune_missing: bool) -> Result<ProbeReport> {
        let report = self.prober().probe_checks(state, prune_missing).await;
        self.console.info(&format!("checks {}", report));
        Ok(report)
    }

    pub async fn probe_apply_batch(&self, state: &mut BatchState) -> Result<ProbeReport> {
        let report = self.prober().probe_apply(state).await;
        self.console.info(&format!("apply {}", report));
        Ok(report)
    }

    /// Re-probe checks, confirm, then approve every repository whose
    /// checks passed
    pub async fn approve_batch(&self, state: &mut BatchState) -> Result<BatchSummary> {
        self.prober().probe_checks(state, true).await;
        self.confirm("Do you want to continue and approve PRs?")?;

        let previously_approved = state.repos.values().any(|repo| {
            repo.workflow.checks == Status::Success && repo.workflow.approved == Status::Success
        });
        let reapprove = previously_approved
            && self.console.confirm(
                "Some PRs have been approved previously. Do you want to re-approve these PRs?",
            )?;

        run_stage(StageExecutor::Approve { reapprove }, state, &self.stage_context()).await
    }

    pub async fn plan_batch(&self, state: &mut BatchState) -> Result<BatchSummary> {
        self.confirm("Do you want to proceed with 'atlantis plan'?")?;
        run_stage(StageExecutor::Plan, state, &self.stage_context()).await
    }

    pub async fn apply_batch(&self, state: &mut BatchState) -> Result<BatchSummary> {
        self.confirm("Do you want to proceed with 'atlantis apply'?")?;
        run_stage(StageExecutor::Apply, state, &self.stage_context()).await
    }

    pub async fn merge_batch(&self, state: &mut BatchState, allow_override: bool) -> Result<BatchSummary> {
        self.confirm("Do you want to proceed with merge?")?;
        run_stage(StageExecutor::Merge { allow_override }, state, &self.stage_context()).await
    }

    /// Show the run, confirm, then close every PR
    pub async fn close_batch(&self, state: &mut BatchState, keep_remote_branches: bool) -> Result<BatchSummary> {
        self.console.show_state(state, None);
        self.confirm("Are you sure you want to close all listed pull requests?")?;
        let executor = StageExecutor::Close {
            delete_branch: !keep_remote_branches,
        };
        run_stage(executor, state, &self.stage_context()).await
    }

    // === Commands ===

    async fn with_selected_run<T, F>(&self, op: F) -> Result<Option<T>>
    where
        F: AsyncFnOnce(&mut BatchState) -> Result<T>,
    {
        let Some(mut state) = self.select().await? else {
            return Ok(None);
        };
        let runner = BatchRunner::new(self.store);
        runner.run(&mut state, op).await.map(Some)
    }

    pub async fn probe_checks(&self, keep_missing: bool) -> Result<Option<ProbeReport>> {
        self.with_selected_run(async |state: &mut BatchState| {
            self.probe_checks_batch(state, !keep_missing).await
        })
        .await
    }

    pub async fn probe_apply(&self) -> Result<Option<ProbeReport>> {
        self.with_selected_run(async |state: &mut BatchState| self.probe_apply_batch(state).await)
            .await
    }

    pub async fn approve(&self) -> Result<Option<BatchSummary>> {
        self.with_selected_run(async |state: &mut BatchState| self.approve_batch(state).await)
            .await
    }

    pub async fn plan(&self) -> Result<Option<BatchSummary>> {
        self.with_selected_run(async |state: &mut BatchState| self.plan_batch(state).await)
            .await
    }

    pub async fn apply(&self) -> Result<Option<BatchSummary>> {
        self.with_selected_run(async |state: &mut BatchState| self.apply_batch(state).await)
            .await
    }

    pub async fn merge(&self, allow_override: bool) -> Result<Option<BatchSummary>> {
        self.with_selected_run(async |state: &mut BatchState| {
            self.merge_batch(state, allow_override).await
        })
        .await
    }

    pub async fn close_prs(&self, keep_remote_branches: bool) -> Result<Option<BatchSummary>> {
        self.with_selected_run(async |state: &mut BatchState| {
            self.close_batch(state, keep_remote_branches).await
        })
        .await
    }
}

// === Run management (no GitHub access) ===

/// Print the run table, optionally for one repository. Read-only.
pub async fn show_run(
    store: &StateStore,
    console: &dyn Console,
    include_other_users: bool,
    repo_name: Option<&str>,
) -> Result<()> {
    let Some(state) = store.load_selected(include_other_users, console).await? else {
        console.info("Cancelled");
        return Ok(());
    };
    show_state(console, &state, repo_name)
}

/// Runs visible to this operator, most recent first
pub async fn list_runs(store: &StateStore, console: &dyn Console, include_other_users: bool) -> Result<Vec<RunEntry>> {
    let runs = store.list(include_other_users).await?;
    if runs.is_empty() {
        console.info(&format!("No runs found in {}", store.location()));
    }
    for run in &runs {
        console.info(&run.label());
    }
    Ok(runs)
}

/// Delete a run after confirmation; runs of every operator are offered
pub async fn remove_run(store: &StateStore, console: &dyn Console) -> Result<Option<String>> {
    let Some(name) = store.select_run(true, console).await? else {
        console.info("Cancelled");
        return Ok(None);
    };

    if !console.confirm(&format!(
        "Are you sure you want to delete the state file {}?",
        name
    ))? {
        return Err(RolloutError::UserDeclined);
    }
    store.remove(&name).await?;
    info!("Removed run {} from {}", name, store.location());
    console.info("State file deleted");
    Ok(Some(name))
}

/// Render `state` (or one of its repositories) through the console
pub fn show_state(console: &dyn Console, state: &BatchState, repo_name: Option<&str>) -> Result<()> {
    match repo_name {
        Some(repo) if state.get(repo).is_none() => {
            return Err(RolloutError::configuration(format!(
                "The repository '{}' does not exist in run '{}'",
                repo, state.name
            )));
        }
        _ => {}
    }
    console.show_state(state, repo_name);
    Ok(())
}
