//! Stage executors and transition rules
//!
//! Every user-facing action is one `StageExecutor` variant. `run_stage`
//! walks the run in repository-name order and calls
//! [`StageExecutor::attempt`] for each repository; preconditions that do
//! not hold skip the repository rather than aborting the batch.
//!
//! ```text
//! opened -> checks (probe) -> approved -> atlantis_apply (plan/apply + probe) -> merged
//!                                             close: from any state
//! ```

use gh_client::{GitHubClient, GitHubError, MergeMethod, PullRequest, ReviewEvent};
use log::{debug, warn};
use std::fmt;

use crate::console::Console;
use crate::error::Result;
use crate::model::{BatchState, RepoState, Status};

pub const PLAN_COMMENT: &str = "atlantis plan";
pub const APPLY_COMMENT: &str = "atlantis apply";

/// Collaborators an executor needs for one batch
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub github: &'a dyn GitHubClient,
    pub owner: &'a str,
    pub console: &'a dyn Console,
    /// Body of approving reviews
    pub approval_message: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExecutor {
    /// Approving review on the head commit
    Approve { reapprove: bool },
    /// `atlantis plan` comment
    Plan,
    /// `atlantis apply` comment
    Apply,
    /// Squash merge and head branch deletion
    Merge { allow_override: bool },
    /// Close the PR, optionally deleting its branch
    Close { delete_branch: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoPullRequest,
    PullRequestNotFound,
    ChecksNotPassed(Status),
    AlreadyApproved,
    NotApproved,
    NothingToPlan,
    ApplyPending,
    AlreadyApplied,
    AlreadyMerged,
    MergeDeclined,
    NotMergeable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoPullRequest => write!(f, "No pull request recorded for this repository"),
            SkipReason::PullRequestNotFound => write!(f, "Pull request not found"),
            SkipReason::ChecksNotPassed(status) => {
                write!(f, "Checks have not passed (checks: {})", status)
            }
            SkipReason::AlreadyApproved => write!(f, "Already approved"),
            SkipReason::NotApproved => write!(f, "Pull request is not approved"),
            SkipReason::NothingToPlan => write!(f, "Neither checks nor apply have failed"),
            SkipReason::ApplyPending => {
                write!(f, "'atlantis apply' already requested, no response yet")
            }
            SkipReason::AlreadyApplied => write!(f, "Already applied"),
            SkipReason::AlreadyMerged => {
                write!(f, "Already merged, pass --override to merge again")
            }
            SkipReason::MergeDeclined => write!(f, "Merge declined"),
            SkipReason::NotMergeable(state) => write!(f, "Not mergeable (state: {})", state),
        }
    }
}

/// Result of one executor on one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Skipped(SkipReason),
    Failed(String),
}

/// Counts for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub verb: &'static str,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn new(verb: &'static str) -> Self {
        Self {
            verb,
            done: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Done => self.done += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, skipped {}", self.verb, self.done, self.skipped)?;
        if self.failed > 0 {
            write!(f, ", failed {}", self.failed)?;
        }
        write!(f, " (total {})", self.total())
    }
}

impl StageExecutor {
    /// Past tense used in the batch summary
    pub fn verb(&self) -> &'static str {
        match self {
            StageExecutor::Approve { .. } => "approved",
            StageExecutor::Plan => "planned",
            StageExecutor::Apply => "applied",
            StageExecutor::Merge { .. } => "merged",
            StageExecutor::Close { .. } => "closed",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            StageExecutor::Approve { .. } => "Approving PRs..",
            StageExecutor::Plan => "Commenting 'atlantis plan'..",
            StageExecutor::Apply => "Commenting 'atlantis apply'..",
            StageExecutor::Merge { .. } => "Merging PRs..",
            StageExecutor::Close { .. } => "Closing PRs..",
        }
    }

    fn done_message(&self) -> &'static str {
        match self {
            StageExecutor::Approve { .. } => "Approved",
            StageExecutor::Plan => "Commented 'atlantis plan'",
            StageExecutor::Apply => "Commented 'atlantis apply'",
            StageExecutor::Merge { .. } => "Merged",
            StageExecutor::Close { .. } => "Closed",
        }
    }

    /// Gate that only looks at the recorded state
    ///
    /// Merge readiness and the re-merge confirmation are checked in
    /// `attempt`, since they need GitHub or the operator.
    pub fn precondition(&self, repo: &RepoState) -> std::result::Result<(), SkipReason> {
        if repo.pr.number.is_none() {
            return Err(SkipReason::NoPullRequest);
        }
        let workflow = &repo.workflow;

        match self {
            StageExecutor::Approve { reapprove } => {
                if workflow.checks != Status::Success {
                    return Err(SkipReason::ChecksNotPassed(workflow.checks));
                }
                if workflow.approved == Status::Success && !reapprove {
                    return Err(SkipReason::AlreadyApproved);
                }
                Ok(())
            }
            StageExecutor::Plan => {
                if workflow.checks == Status::Fail || workflow.atlantis_apply == Status::Fail {
                    Ok(())
                } else {
                    Err(SkipReason::NothingToPlan)
                }
            }
            StageExecutor::Apply => {
                if workflow.checks != Status::Success {
                    return Err(SkipReason::ChecksNotPassed(workflow.checks));
                }
                if workflow.approved == Status::NotStarted {
                    return Err(SkipReason::NotApproved);
                }
                match workflow.atlantis_apply {
                    Status::NotStarted | Status::Fail => Ok(()),
                    Status::Started => Err(SkipReason::ApplyPending),
                    Status::Success => Err(SkipReason::AlreadyApplied),
                }
            }
            StageExecutor::Merge { allow_override } => {
                if workflow.merged == Status::Success && !allow_override {
                    return Err(SkipReason::AlreadyMerged);
                }
                Ok(())
            }
            StageExecutor::Close { .. } => Ok(()),
        }
    }

    /// Run this executor against one repository
    ///
    /// Only a merge can return `Err`: an unexpected API failure marks
    /// `merged = FAIL` and then aborts the batch.
    pub async fn attempt(&self, repo: &mut RepoState, ctx: &StageContext<'_>) -> Result<Outcome> {
        if let Err(reason) = self.precondition(repo) {
            return Ok(Outcome::Skipped(reason));
        }
        let Some(number) = repo.pr.number else {
            return Ok(Outcome::Skipped(SkipReason::NoPullRequest));
        };

        match self {
            StageExecutor::Approve { .. } => Ok(approve(repo, number, ctx).await),
            StageExecutor::Plan => Ok(comment(repo, number, PLAN_COMMENT, ctx).await),
            StageExecutor::Apply => {
                let outcome = comment(repo, number, APPLY_COMMENT, ctx).await;
                if outcome == Outcome::Done {
                    repo.workflow.atlantis_apply = Status::Started;
                }
                Ok(outcome)
            }
            StageExecutor::Merge { .. } => merge(repo, number, ctx).await,
            StageExecutor::Close { delete_branch } => {
                Ok(close(repo, number, *delete_branch, ctx).await)
            }
        }
    }
}

async fn fetch_pr(repo: &RepoState, number: u64, ctx: &StageContext<'_>) -> std::result::Result<PullRequest, GitHubError> {
    ctx.github.fetch_pull_request(ctx.owner, &repo.name, number).await
}

async fn approve(repo: &mut RepoState, number: u64, ctx: &StageContext<'_>) -> Outcome {
    let pr = match fetch_pr(repo, number, ctx).await {
        Ok(pr) => pr,
        Err(GitHubError::NotFound(_)) => return Outcome::Skipped(SkipReason::PullRequestNotFound),
        Err(err) => {
            repo.workflow.approved = Status::Fail;
            return Outcome::Failed(format!("Could not read pull request: {}", err));
        }
    };

    let result = ctx
        .github
        .create_review(
            ctx.owner,
            &repo.name,
            number,
            &pr.head_sha,
            ReviewEvent::Approve,
            Some(ctx.approval_message),
        )
        .await;

    match result {
        Ok(()) => {
            repo.workflow.approved = Status::Success;
            Outcome::Done
        }
        Err(GitHubError::NotFound(_)) => Outcome::Skipped(SkipReason::PullRequestNotFound),
        Err(err) => {
            repo.workflow.approved = Status::Fail;
            Outcome::Failed(format!("Approval failed: {}", err))
        }
    }
}

/// Post a comment; no stage changes here
async fn comment(repo: &RepoState, number: u64, body: &str, ctx: &StageContext<'_>) -> Outcome {
    match ctx
        .github
        .create_issue_comment(ctx.owner, &repo.name, number, body)
        .await
    {
        Ok(()) => Outcome::Done,
        Err(GitHubError::NotFound(_)) => Outcome::Skipped(SkipReason::PullRequestNotFound),
        Err(err) => Outcome::Failed(format!("Could not comment '{}': {}", body, err)),
    }
}

async fn merge(repo: &mut RepoState, number: u64, ctx: &StageContext<'_>) -> Result<Outcome> {
    if repo.workflow.merged == Status::Success {
        ctx.console.warning("The PR has previously been merged");
        if !ctx.console.confirm("Do you want to attempt a merge anyway?")? {
            return Ok(Outcome::Skipped(SkipReason::MergeDeclined));
        }
    }

    let pr = match fetch_pr(repo, number, ctx).await {
        Ok(pr) => pr,
        Err(GitHubError::NotFound(_)) => return Ok(Outcome::Skipped(SkipReason::PullRequestNotFound)),
        Err(err) => {
            repo.workflow.merged = Status::Fail;
            return Err(err.into());
        }
    };

    if !pr.is_clean() {
        let state = pr
            .mergeable_state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        return Ok(Outcome::Skipped(SkipReason::NotMergeable(state)));
    }

    let result = match ctx
        .github
        .merge_pull_request(ctx.owner, &repo.name, number, MergeMethod::Squash, None, None)
        .await
    {
        Ok(result) => result,
        Err(GitHubError::NotFound(_)) => return Ok(Outcome::Skipped(SkipReason::PullRequestNotFound)),
        Err(err) => {
            warn!("Merging {}#{} failed: {}", repo.name, number, err);
            repo.workflow.merged = Status::Fail;
            return Err(err.into());
        }
    };

    if !result.merged {
        repo.workflow.merged = Status::Fail;
        return Ok(Outcome::Failed(format!("Not merged: {}", result.message)));
    }

    repo.workflow.merged = Status::Success;
    delete_branch(repo, &pr.head_branch, ctx).await;
    Ok(Outcome::Done)
}

async fn close(repo: &RepoState, number: u64, delete: bool, ctx: &StageContext<'_>) -> Outcome {
    let pr = match fetch_pr(repo, number, ctx).await {
        Ok(pr) => pr,
        Err(GitHubError::NotFound(_)) => return Outcome::Skipped(SkipReason::PullRequestNotFound),
        Err(err) => return Outcome::Failed(format!("Could not read pull request: {}", err)),
    };

    match ctx
        .github
        .close_pull_request(ctx.owner, &repo.name, number)
        .await
    {
        Ok(()) => {}
        Err(GitHubError::NotFound(_)) => return Outcome::Skipped(SkipReason::PullRequestNotFound),
        Err(err) => return Outcome::Failed(format!("Could not close pull request: {}", err)),
    }

    if delete {
        delete_branch(repo, &pr.head_branch, ctx).await;
    }
    Outcome::Done
}

/// Branch cleanup never changes the outcome of the stage
async fn delete_branch(repo: &RepoState, branch: &str, ctx: &StageContext<'_>) {
    match ctx.github.delete_branch(ctx.owner, &repo.name, branch).await {
        Ok(()) => ctx.console.info(&format!("Deleted branch {}", branch)),
        Err(GitHubError::NotFound(_)) => ctx.console.warning(&format!("No such branch: {}", branch)),
        Err(err) => ctx
            .console
            .warning(&format!("Could not delete branch {}: {}", branch, err)),
    }
}

/// Run `executor` over every repository of the run, in name order
///
/// Per-repository failures are reported and counted. An `Err` from a merge
/// stops the loop; mutations up to and including that repository stay in
/// `state`.
pub async fn run_stage(
    executor: StageExecutor,
    state: &mut BatchState,
    ctx: &StageContext<'_>,
) -> Result<BatchSummary> {
    ctx.console.heading(executor.heading());
    let mut summary = BatchSummary::new(executor.verb());

    for repo in state.repos.values_mut() {
        ctx.console.repo(&repo.name);

        let outcome = executor.attempt(repo, ctx).await?;
        match &outcome {
            Outcome::Done => ctx.console.success(executor.done_message()),
            Outcome::Skipped(reason) => {
                ctx.console.warning(&reason.to_string());
                ctx.console.skipping();
            }
            Outcome::Failed(message) => ctx.console.failure(message),
        }
        debug!("{:?} on {}: {:?}", executor, repo.name, outcome);
        summary.record(&outcome);
    }

    ctx.console.info(&summary.to_string());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeGitHub, ScriptedConsole, pull_request};
    use crate::model::{PrMetadata, WorkflowStatus};
    use gh_client::MergeableState;
    use pretty_assertions::assert_eq;

    const OWNER: &str = "statisticsnorway";

    fn repo(name: &str, number: Option<u64>, workflow: WorkflowStatus) -> RepoState {
        RepoState::new(
            name,
            PrMetadata {
                number,
                url: None,
                branch_name: Some("update/template".into()),
            },
            workflow,
        )
    }

    fn workflow(checks: Status, approved: Status, apply: Status, merged: Status) -> WorkflowStatus {
        WorkflowStatus {
            opened: Status::Success,
            checks,
            approved,
            atlantis_apply: apply,
            merged,
        }
    }

    fn ctx<'a>(github: &'a FakeGitHub, console: &'a ScriptedConsole) -> StageContext<'a> {
        StageContext {
            github,
            owner: OWNER,
            console,
            approval_message: "automated approval",
        }
    }

    #[test]
    fn test_summary_display() {
        let mut summary = BatchSummary::new("approved");
        summary.record(&Outcome::Done);
        summary.record(&Outcome::Skipped(SkipReason::AlreadyApproved));
        assert_eq!(summary.to_string(), "approved 1, skipped 1 (total 2)");

        summary.record(&Outcome::Failed("boom".into()));
        assert_eq!(summary.to_string(), "approved 1, skipped 1, failed 1 (total 3)");
    }

    #[test]
    fn test_missing_number_always_skips() {
        let repo = repo("a", None, workflow(Status::Success, Status::Success, Status::NotStarted, Status::NotStarted));
        for executor in [
            StageExecutor::Approve { reapprove: true },
            StageExecutor::Plan,
            StageExecutor::Apply,
            StageExecutor::Merge { allow_override: true },
            StageExecutor::Close { delete_branch: true },
        ] {
            assert_eq!(executor.precondition(&repo), Err(SkipReason::NoPullRequest));
        }
    }

    #[test]
    fn test_approve_requires_passing_checks() {
        let approve = StageExecutor::Approve { reapprove: false };
        for checks in [Status::NotStarted, Status::Started, Status::Fail] {
            let repo = repo("a", Some(1), workflow(checks, Status::NotStarted, Status::NotStarted, Status::NotStarted));
            assert_eq!(approve.precondition(&repo), Err(SkipReason::ChecksNotPassed(checks)));
        }

        let approved = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::NotStarted, Status::NotStarted));
        assert_eq!(approve.precondition(&approved), Err(SkipReason::AlreadyApproved));
        assert_eq!(
            StageExecutor::Approve { reapprove: true }.precondition(&approved),
            Ok(())
        );
    }

    #[test]
    fn test_apply_precondition_table() {
        use Status::*;
        let cases = [
            // checks, approved, apply, acts
            (Success, Success, NotStarted, true),
            (Success, Fail, NotStarted, true),
            (Success, Success, Fail, true),
            (Success, Success, Started, false),
            (Success, Success, Success, false),
            (Success, NotStarted, NotStarted, false),
            (Fail, Success, NotStarted, false),
            (NotStarted, Success, Fail, false),
        ];
        for (checks, approved, apply, acts) in cases {
            let repo = repo("a", Some(1), workflow(checks, approved, apply, NotStarted));
            assert_eq!(
                StageExecutor::Apply.precondition(&repo).is_ok(),
                acts,
                "checks={checks:?} approved={approved:?} apply={apply:?}"
            );
        }
    }

    #[test]
    fn test_plan_precondition() {
        use Status::*;
        let plan = StageExecutor::Plan;
        assert!(plan.precondition(&repo("a", Some(1), workflow(Fail, NotStarted, NotStarted, NotStarted))).is_ok());
        assert!(plan.precondition(&repo("a", Some(1), workflow(Success, Success, Fail, NotStarted))).is_ok());
        assert_eq!(
            plan.precondition(&repo("a", Some(1), workflow(Success, Success, Started, NotStarted))),
            Err(SkipReason::NothingToPlan)
        );
    }

    #[tokio::test]
    async fn test_approve_reviews_head_commit() {
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pull_request(1, "sha-a"));
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::NotStarted, Status::NotStarted, Status::NotStarted));

        let outcome = StageExecutor::Approve { reapprove: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(repo.workflow.approved, Status::Success);
        assert_eq!(github.calls_to("create_review"), vec!["a#1 sha-a APPROVE automated approval"]);
    }

    #[tokio::test]
    async fn test_approve_api_error_marks_fail() {
        let github = FakeGitHub::new()
            .with_pull_request(OWNER, "a", pull_request(1, "sha-a"))
            .failing("create_review", "a");
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::NotStarted, Status::NotStarted, Status::NotStarted));

        let outcome = StageExecutor::Approve { reapprove: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(repo.workflow.approved, Status::Fail);
    }

    #[tokio::test]
    async fn test_apply_comment_marks_started() {
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pull_request(1, "sha-a"));
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::Fail, Status::NotStarted));

        let outcome = StageExecutor::Apply
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(repo.workflow.atlantis_apply, Status::Started);
        assert_eq!(github.calls_to("create_issue_comment"), vec!["a#1 atlantis apply"]);
    }

    #[tokio::test]
    async fn test_apply_comment_failure_keeps_state() {
        let github = FakeGitHub::new().failing("create_issue_comment", "a");
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::NotStarted, Status::NotStarted));

        let outcome = StageExecutor::Apply
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(repo.workflow.atlantis_apply, Status::NotStarted);
    }

    #[tokio::test]
    async fn test_merge_squashes_and_deletes_branch() {
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pull_request(1, "sha-a"));
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::Success, Status::NotStarted));

        let outcome = StageExecutor::Merge { allow_override: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(repo.workflow.merged, Status::Success);
        assert_eq!(github.calls_to("merge_pull_request"), vec!["a#1 squash"]);
        assert_eq!(github.calls_to("delete_branch"), vec!["a update/template"]);
    }

    #[tokio::test]
    async fn test_merge_skips_unclean() {
        let mut pr = pull_request(1, "sha-a");
        pr.mergeable_state = Some(MergeableState::Dirty);
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pr);
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::Success, Status::NotStarted));

        let outcome = StageExecutor::Merge { allow_override: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped(SkipReason::NotMergeable("dirty".into())));
        assert_eq!(repo.workflow.merged, Status::NotStarted);
        assert!(github.calls_to("merge_pull_request").is_empty());
    }

    #[tokio::test]
    async fn test_merge_refused_marks_fail() {
        let github = FakeGitHub::new()
            .with_pull_request(OWNER, "a", pull_request(1, "sha-a"))
            .refusing_merge("a");
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::Success, Status::NotStarted));

        let outcome = StageExecutor::Merge { allow_override: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(repo.workflow.merged, Status::Fail);
        assert!(github.calls_to("delete_branch").is_empty());
    }

    #[tokio::test]
    async fn test_merge_api_error_marks_fail_and_aborts() {
        let github = FakeGitHub::new()
            .with_pull_request(OWNER, "a", pull_request(1, "sha-a"))
            .failing("merge_pull_request", "a");
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), workflow(Status::Success, Status::Success, Status::Success, Status::NotStarted));

        let result = StageExecutor::Merge { allow_override: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await;

        assert!(result.is_err());
        assert_eq!(repo.workflow.merged, Status::Fail);
    }

    #[tokio::test]
    async fn test_merge_vanished_pr_is_skipped() {
        let github = FakeGitHub::new()
            .with_pull_request(OWNER, "a", pull_request(1, "sha-a"))
            .failing_with("merge_pull_request", "a", GitHubError::NotFound("pull 1".into()));
        let console = ScriptedConsole::new();
        let ready = workflow(Status::Success, Status::Success, Status::Success, Status::NotStarted);
        let mut repo = repo("a", Some(1), ready.clone());

        let outcome = StageExecutor::Merge { allow_override: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped(SkipReason::PullRequestNotFound));
        assert_eq!(repo.workflow, ready);
        assert!(github.calls_to("delete_branch").is_empty());
    }

    #[tokio::test]
    async fn test_merge_override_asks_per_repository() {
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pull_request(1, "sha-a"));
        let merged = workflow(Status::Success, Status::Success, Status::Success, Status::Success);

        let console = ScriptedConsole::new().with_confirm(false);
        let mut declined = repo("a", Some(1), merged.clone());
        let outcome = StageExecutor::Merge { allow_override: true }
            .attempt(&mut declined, &ctx(&github, &console))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped(SkipReason::MergeDeclined));
        assert!(github.calls_to("merge_pull_request").is_empty());

        let console = ScriptedConsole::new().with_confirm(true);
        let mut accepted = repo("a", Some(1), merged);
        let outcome = StageExecutor::Merge { allow_override: true }
            .attempt(&mut accepted, &ctx(&github, &console))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(github.calls_to("merge_pull_request").len(), 1);
    }

    #[tokio::test]
    async fn test_close_keeps_branch_when_asked() {
        let github = FakeGitHub::new().with_pull_request(OWNER, "a", pull_request(1, "sha-a"));
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), WorkflowStatus::opened());

        let outcome = StageExecutor::Close { delete_branch: false }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(github.calls_to("close_pull_request"), vec!["a#1"]);
        assert!(github.calls_to("delete_branch").is_empty());
        assert_eq!(repo.workflow, WorkflowStatus::opened());
    }

    #[tokio::test]
    async fn test_close_missing_pr_is_skipped() {
        let github = FakeGitHub::new();
        let console = ScriptedConsole::new();
        let mut repo = repo("a", Some(1), WorkflowStatus::opened());

        let outcome = StageExecutor::Close { delete_branch: true }
            .attempt(&mut repo, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped(SkipReason::PullRequestNotFound));
        assert!(github.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_run_stage_counts_and_orders() {
        let github = FakeGitHub::new()
            .with_pull_request(OWNER, "a", pull_request(1, "sha-a"))
            .with_pull_request(OWNER, "b", pull_request(2, "sha-b"));
        let console = ScriptedConsole::new();
        let mut state = BatchState::new("run");
        state.insert(repo("b", Some(2), workflow(Status::Fail, Status::NotStarted, Status::NotStarted, Status::NotStarted)));
        state.insert(repo("a", Some(1), workflow(Status::Fail, Status::NotStarted, Status::NotStarted, Status::NotStarted)));
        state.insert(repo("c", Some(3), workflow(Status::Success, Status::Success, Status::Started, Status::NotStarted)));

        let summary = run_stage(StageExecutor::Plan, &mut state, &ctx(&github, &console))
            .await
            .unwrap();

        assert_eq!(summary.to_string(), "planned 2, skipped 1 (total 3)");
        assert_eq!(
            github.calls_to("create_issue_comment"),
            vec!["a#1 atlantis plan", "b#2 atlantis plan"]
        );
    }
}
