//! Run creation
//!
//! A run starts either from explicit PR URLs (`add urls`) or from a set of
//! repositories whose template PR is looked up on GitHub (`ready`). The
//! repositories come from a folder of local clones or from the team
//! registry repository (`teams/<team>/team.yaml`).

use std::path::Path;
use std::sync::OnceLock;

use chrono::Local;
use futures::stream::{self, StreamExt};
use gh_client::{ContentKind, GitHubClient, GitHubError, PullRequest};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::actions::Rollout;
use crate::console::Console;
use crate::error::{Result, RolloutError};
use crate::model::{BatchState, PrMetadata, RepoState, WorkflowStatus};
use crate::runner::BatchRunner;

const TEAMS_DIR: &str = "teams";

/// A parsed GitHub pull request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub url: String,
}

/// Parse `https://github.com/<owner>/<repo>/pull/<n>`
pub fn parse_pr_url(url: &str) -> Option<PrUrl> {
    static PR_URL_REGEX: OnceLock<Regex> = OnceLock::new();

    let re = PR_URL_REGEX.get_or_init(|| {
        Regex::new(r"^https?://github\.com/([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)/pull/([0-9]+)$").unwrap()
    });

    let captures = re.captures(url.trim())?;
    Some(PrUrl {
        owner: captures[1].to_string(),
        repo: captures[2].to_string(),
        number: captures[3].parse().ok()?,
        url: url.trim().to_string(),
    })
}

/// Make a run name usable as a flat blob key
pub fn sanitize_run_name(name: &str) -> String {
    name.trim().replace(['/', '\\'], "-")
}

/// Build a run from PR URLs; any invalid URL aborts
pub fn state_from_pr_urls(name: &str, urls: &[String], branch: &str, owner: &str) -> Result<BatchState> {
    if urls.is_empty() {
        return Err(RolloutError::configuration("No pull request URLs given"));
    }

    let mut state = BatchState::new(sanitize_run_name(name));
    for url in urls {
        let Some(pr) = parse_pr_url(url) else {
            return Err(RolloutError::configuration(format!(
                "Invalid GitHub PR URL: {}",
                url
            )));
        };
        if pr.owner != owner {
            return Err(RolloutError::configuration(format!(
                "{} belongs to '{}', but this tool is configured for '{}'",
                url, pr.owner, owner
            )));
        }

        let repo = RepoState::new(
            pr.repo.clone(),
            PrMetadata {
                number: Some(pr.number),
                url: Some(pr.url),
                branch_name: Some(branch.to_string()),
            },
            WorkflowStatus::opened(),
        );
        if state.insert(repo).is_some() {
            warn!("{} listed more than once, keeping the last URL", pr.repo);
        }
    }
    Ok(state)
}

/// "git@github.com:org/repo.git" -> "repo"
pub fn repo_name_from_remote(url: &str) -> Option<String> {
    let last = url.trim().trim_end_matches('/').rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Repository names of the git clones directly below `root`
pub async fn discover_from_folder(root: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root).await.map_err(|e| {
        RolloutError::configuration(format!("Cannot read folder {}: {}", root.display(), e))
    })?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RolloutError::Other(e.into()))?
    {
        let path = entry.path();
        if !path.is_dir() || !path.join(".git").exists() {
            continue;
        }

        let output = Command::new("git")
            .arg("-C")
            .arg(&path)
            .args(["config", "--get", "remote.origin.url"])
            .output()
            .await
            .map_err(|e| RolloutError::Other(e.into()))?;

        let remote = String::from_utf8_lossy(&output.stdout);
        match repo_name_from_remote(&remote) {
            Some(name) if output.status.success() => names.push(name),
            _ => warn!("{} has no origin remote, ignoring it", path.display()),
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}

#[derive(Debug, Default, Deserialize)]
struct TeamFile {
    #[serde(default)]
    github: Option<TeamGitHub>,
}

#[derive(Debug, Default, Deserialize)]
struct TeamGitHub {
    #[serde(default)]
    iac_repo: Option<IacRepo>,
}

#[derive(Debug, Default, Deserialize)]
struct IacRepo {
    #[serde(default)]
    name: Option<String>,
}

/// `github.iac_repo.name` of a `team.yaml`
pub fn iac_repo_from_team_yaml(content: &str) -> std::result::Result<String, String> {
    let team: TeamFile = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    team.github
        .and_then(|github| github.iac_repo)
        .and_then(|repo| repo.name)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| "no github.iac_repo.name".to_string())
}

/// IaC repositories of every team in the registry repository
///
/// Teams whose `team.yaml` cannot be read are reported and left out.
pub async fn discover_from_registry(
    github: &dyn GitHubClient,
    owner: &str,
    registry: &str,
    console: &dyn Console,
) -> Result<Vec<String>> {
    let entries = github.list_directory(owner, registry, TEAMS_DIR).await?;

    let mut names = Vec::new();
    for team in entries.iter().filter(|e| e.kind == ContentKind::Dir) {
        let path = format!("{}/{}/team.yaml", TEAMS_DIR, team.name);
        let repo = match github.fetch_file(owner, registry, &path).await {
            Ok(content) => iac_repo_from_team_yaml(&content),
            Err(err) => Err(err.to_string()),
        };

        match repo {
            Ok(repo) => names.push(repo),
            Err(reason) => console.warning(&format!(
                "Could not get IaC repo name for team {}: {}",
                team.name, reason
            )),
        }
    }

    names.sort();
    names.dedup();
    debug!("Found {} team repositories in {}", names.len(), registry);
    Ok(names)
}

fn repo_state_from_pr(name: &str, pr: &PullRequest) -> RepoState {
    RepoState::new(
        name,
        PrMetadata {
            number: Some(pr.number),
            url: Some(pr.html_url.clone()),
            branch_name: Some(pr.head_branch.clone()),
        },
        WorkflowStatus::opened(),
    )
}

impl Rollout<'_> {
    /// Look up the newest open template PR of every repository
    ///
    /// Repositories without one are reported and left out of the run.
    pub async fn locate_template_prs(&self, name: &str, repos: &[String]) -> Result<BatchState> {
        let owner = self.config.github_org.as_str();
        let author = self.config.template_pr_author.as_str();
        let title = self.config.template_pr_title.as_str();

        let results: Vec<(&String, std::result::Result<Option<PullRequest>, GitHubError>)> =
            stream::iter(repos)
                .map(|repo| async move {
                    let found = self
                        .github
                        .find_open_pull_request(owner, repo, author, title)
                        .await;
                    (repo, found)
                })
                .buffered(self.config.probe_window())
                .collect()
                .await;

        let mut state = BatchState::new(sanitize_run_name(name));
        for (repo, found) in results {
            match found {
                Ok(Some(pr)) => {
                    state.insert(repo_state_from_pr(repo, &pr));
                }
                Ok(None) | Err(GitHubError::NotFound(_)) => {
                    self.console.repo(repo);
                    self.console.warning(&format!(
                        "Could not find a PR with title '{}' from user {}",
                        title, author
                    ));
                    self.console.skipping();
                }
                Err(err) => {
                    self.console.repo(repo);
                    self.console
                        .failure(&format!("Could not list pull requests: {}", err));
                    self.console.skipping();
                }
            }
        }
        Ok(state)
    }

    /// Ask for the run name suffix until the operator confirms it
    fn prompt_run_name(&self, operator: &str) -> Result<String> {
        loop {
            let answer = self.console.input(&format!(
                "What do you want to call this run? It will be called 'pr-{}-[your-input]'. Run name:",
                operator
            ))?;
            let answer = answer.trim();
            if answer.is_empty() {
                continue;
            }
            if self
                .console
                .confirm(&format!("Are you sure '{}' is correct?", answer))?
            {
                return Ok(format!("pr-{}-{}", operator, answer));
            }
        }
    }

    /// Refuse to silently replace an existing run
    async fn confirm_new_run(&self, name: &str) -> Result<()> {
        let exists = self
            .store
            .list(true)
            .await?
            .iter()
            .any(|run| run.name == name);
        if exists
            && !self
                .console
                .confirm(&format!("A run named '{}' already exists. Overwrite it?", name))?
        {
            return Err(RolloutError::UserDeclined);
        }
        Ok(())
    }

    /// Create a run from template PRs, probe its checks and save it
    pub async fn ready(
        &self,
        operator: &str,
        folder: Option<&Path>,
        state_name: Option<&str>,
    ) -> Result<BatchState> {
        let name = match state_name {
            Some(name) => sanitize_run_name(name),
            None => sanitize_run_name(&self.prompt_run_name(operator)?),
        };
        self.confirm_new_run(&name).await?;

        self.console.heading("Fetching team GitHub repositories");
        let repos = match folder {
            Some(folder) => discover_from_folder(folder).await?,
            None => {
                self.console.info(&format!(
                    "No folder specified, fetching all team repositories from '{}'. This can take a minute",
                    self.config.team_registry_repo
                ));
                discover_from_registry(
                    self.github,
                    &self.config.github_org,
                    &self.config.team_registry_repo,
                    self.console,
                )
                .await?
            }
        };

        let mut state = self.locate_template_prs(&name, &repos).await?;
        self.console.info(&format!(
            "Found {} of {} repositories with template PRs",
            state.len(),
            repos.len()
        ));

        let runner = BatchRunner::new(self.store);
        runner
            .run(&mut state, async |state: &mut BatchState| {
                self.probe_checks_batch(state, true).await
            })
            .await?;

        self.console.success(&format!(
            "State file {} created and uploaded to {}",
            state.name,
            self.store.location()
        ));
        self.console
            .info("Next step: perhaps you want to approve PRs with 'gh-pr-rollout approve'");
        Ok(state)
    }

    /// Create a run from existing PR URLs and save it
    pub async fn add_urls(&self, urls: &[String], branch: &str) -> Result<BatchState> {
        let name = format!("batch-{}-{}", branch, Local::now().format("%Y-%m-%dT%H-%M-%S"));
        let state = state_from_pr_urls(&name, urls, branch, &self.config.github_org)?;

        self.store.save(&state).await?;
        self.console.success(&format!(
            "State file {} created and uploaded to {}",
            state.name,
            self.store.location()
        ));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeGitHub, MemoryBlobStore, ScriptedConsole, pull_request};
    use crate::model::Status;
    use crate::store::StateStore;
    use gh_client::CheckState;
    use pretty_assertions::assert_eq;
    use rollout_config::AppConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    const OWNER: &str = "statisticsnorway";

    #[test]
    fn test_parse_pr_url() {
        let pr = parse_pr_url("https://github.com/statisticsnorway/dapla-stat-iac/pull/17").unwrap();
        assert_eq!(pr.owner, "statisticsnorway");
        assert_eq!(pr.repo, "dapla-stat-iac");
        assert_eq!(pr.number, 17);

        assert!(parse_pr_url("http://github.com/a/b/pull/1").is_some());
        assert!(parse_pr_url("https://github.com/a/b/pull/").is_none());
        assert!(parse_pr_url("https://github.com/a/b/issues/1").is_none());
        assert!(parse_pr_url("https://gitlab.com/a/b/pull/1").is_none());
        assert!(parse_pr_url("https://github.com/a/b/pull/1/files").is_none());
    }

    #[test]
    fn test_state_from_pr_urls() {
        let urls = vec![
            "https://github.com/statisticsnorway/a-iac/pull/3".to_string(),
            "https://github.com/statisticsnorway/b-iac/pull/9".to_string(),
        ];
        let state = state_from_pr_urls("batch-update/template-now", &urls, "update/template", OWNER).unwrap();

        assert_eq!(state.name, "batch-update-template-now");
        assert_eq!(state.len(), 2);
        let a = state.get("a-iac").unwrap();
        assert_eq!(a.pr.number, Some(3));
        assert_eq!(a.pr.branch_name.as_deref(), Some("update/template"));
        assert_eq!(a.workflow.opened, Status::Success);
        assert_eq!(a.workflow.checks, Status::NotStarted);
    }

    #[test]
    fn test_state_from_pr_urls_rejects_invalid() {
        let urls = vec![
            "https://github.com/statisticsnorway/a-iac/pull/3".to_string(),
            "not a url".to_string(),
        ];
        assert!(matches!(
            state_from_pr_urls("run", &urls, "b", OWNER).unwrap_err(),
            RolloutError::Configuration(_)
        ));
        assert!(state_from_pr_urls("run", &[], "b", OWNER).is_err());

        let foreign = vec!["https://github.com/someone-else/a-iac/pull/3".to_string()];
        assert!(state_from_pr_urls("run", &foreign, "b", OWNER).is_err());
    }

    #[test]
    fn test_repo_name_from_remote() {
        assert_eq!(repo_name_from_remote("git@github.com:statisticsnorway/a-iac.git\n").as_deref(), Some("a-iac"));
        assert_eq!(repo_name_from_remote("https://github.com/statisticsnorway/a-iac").as_deref(), Some("a-iac"));
        assert_eq!(repo_name_from_remote("https://github.com/statisticsnorway/a-iac.git/").as_deref(), Some("a-iac"));
        assert_eq!(repo_name_from_remote(""), None);
    }

    #[test]
    fn test_iac_repo_from_team_yaml() {
        let yaml = "team_uniform_name: dapla-stat\ngithub:\n  iac_repo:\n    name: dapla-stat-iac\n";
        assert_eq!(iac_repo_from_team_yaml(yaml).unwrap(), "dapla-stat-iac");

        assert!(iac_repo_from_team_yaml("github: {}\n").is_err());
        assert!(iac_repo_from_team_yaml("- just\n- a list\n").is_err());
    }

    #[tokio::test]
    async fn test_discover_from_folder_ignores_plain_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("not-a-clone")).unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();

        assert!(discover_from_folder(dir.path()).await.unwrap().is_empty());
        assert!(discover_from_folder(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_discover_from_registry() {
        let github = FakeGitHub::new()
            .with_directory(OWNER, "registry", "teams", &["alpha", "beta", "broken", "README.md"])
            .with_file(OWNER, "registry", "teams/alpha/team.yaml", "github:\n  iac_repo:\n    name: alpha-iac\n")
            .with_file(OWNER, "registry", "teams/beta/team.yaml", "github:\n  iac_repo:\n    name: beta-iac\n");
        let console = ScriptedConsole::new();

        let repos = discover_from_registry(&github, OWNER, "registry", &console).await.unwrap();

        assert_eq!(repos, vec!["alpha-iac", "beta-iac"]);
        assert!(console.output().iter().any(|l| l.contains("team broken")));
    }

    #[tokio::test]
    async fn test_ready_from_registry() {
        let mut old = pull_request(1, "old");
        old.created_at = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        let mut other_title = pull_request(7, "other");
        other_title.title = "Bump provider".into();

        let github = FakeGitHub::new()
            .with_directory(OWNER, "terraform-ssb-dapla-teams", "teams", &["alpha", "beta"])
            .with_file(OWNER, "terraform-ssb-dapla-teams", "teams/alpha/team.yaml", "github:\n  iac_repo:\n    name: alpha-iac\n")
            .with_file(OWNER, "terraform-ssb-dapla-teams", "teams/beta/team.yaml", "github:\n  iac_repo:\n    name: beta-iac\n")
            .with_pull_request(OWNER, "alpha-iac", old)
            .with_pull_request(OWNER, "alpha-iac", pull_request(5, "sha-5"))
            .with_pull_request(OWNER, "beta-iac", other_title)
            .with_commit_status(OWNER, "alpha-iac", "sha-5", CheckState::Success);
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let console = ScriptedConsole::new()
            .with_input("template-v2")
            .with_confirm(true);
        let config = AppConfig::default();
        let rollout = Rollout {
            store: &store,
            github: &github,
            console: &console,
            config: &config,
            include_other_users: false,
        };

        let state = rollout.ready("ola", None, None).await.unwrap();

        assert_eq!(state.name, "pr-ola-template-v2");
        assert_eq!(state.repos.keys().collect::<Vec<_>>(), vec!["alpha-iac"]);
        let alpha = state.get("alpha-iac").unwrap();
        assert_eq!(alpha.pr.number, Some(5));
        assert_eq!(alpha.workflow.checks, Status::Success);
        assert_eq!(store.load("pr-ola-template-v2").await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_ready_refuses_to_overwrite_without_consent() {
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        store.save(&BatchState::new("pr-ola-x")).await.unwrap();
        let github = FakeGitHub::new();
        let console = ScriptedConsole::new().with_confirm(false);
        let config = AppConfig::default();
        let rollout = Rollout {
            store: &store,
            github: &github,
            console: &console,
            config: &config,
            include_other_users: false,
        };

        let err = rollout.ready("ola", None, Some("pr-ola-x")).await.unwrap_err();
        assert!(matches!(err, RolloutError::UserDeclined));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_urls_saves_run() {
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        let github = FakeGitHub::new();
        let console = ScriptedConsole::new();
        let config = AppConfig::default();
        let rollout = Rollout {
            store: &store,
            github: &github,
            console: &console,
            config: &config,
            include_other_users: true,
        };

        let urls = vec!["https://github.com/statisticsnorway/a-iac/pull/3".to_string()];
        let state = rollout.add_urls(&urls, "update/template").await.unwrap();

        assert!(state.name.starts_with("batch-update-template-"));
        assert!(!state.name.contains('/'));
        assert_eq!(store.load(&state.name).await.unwrap(), state);
        assert!(github.calls().is_empty());
    }
}
