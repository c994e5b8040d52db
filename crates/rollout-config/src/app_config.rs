//! Application configuration
//!
//! Configuration loaded from `.gh-pr-rollout.toml`. Every field has a
//! default so a partial (or missing) file is fine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where run state files are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// Google Cloud Storage bucket shared by all operators
    #[default]
    Gcs,
    /// A directory on this machine
    Local,
}

/// Application configuration loaded from `.gh-pr-rollout.toml`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// GitHub organization owning every repository in a run
    #[serde(default = "default_github_org")]
    pub github_org: String,

    /// GitHub Enterprise host (None = github.com)
    #[serde(default)]
    pub github_host: Option<String>,

    /// Operator identity used to name and filter runs.
    /// Resolved from the gcloud account when unset.
    #[serde(default)]
    pub operator: Option<String>,

    /// Storage backend for run state
    #[serde(default)]
    pub state_backend: StateBackend,

    /// GCS bucket holding run state files
    #[serde(default = "default_state_bucket")]
    pub state_bucket: String,

    /// GCP project billed for bucket access
    #[serde(default = "default_state_project")]
    pub state_project: String,

    /// Directory for the local backend (defaults to the data directory)
    #[serde(default)]
    pub local_state_dir: Option<PathBuf>,

    /// Repository listing every team under `teams/<team>/team.yaml`
    #[serde(default = "default_team_registry_repo")]
    pub team_registry_repo: String,

    /// Author of the template pull requests
    #[serde(default = "default_template_pr_author")]
    pub template_pr_author: String,

    /// Title of the template pull requests
    #[serde(default = "default_template_pr_title")]
    pub template_pr_title: String,

    /// Head branch assumed when a run is built from PR URLs
    #[serde(default = "default_branch_name")]
    pub default_branch_name: String,

    /// Body of approving reviews
    #[serde(default = "default_approval_message")]
    pub approval_message: String,

    /// How many repositories are probed in parallel
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
}

fn default_github_org() -> String {
    "statisticsnorway".to_string()
}

fn default_state_bucket() -> String {
    "ssb-batch-update-statefiles".to_string()
}

fn default_state_project() -> String {
    "batch-update-p-3f".to_string()
}

fn default_team_registry_repo() -> String {
    "terraform-ssb-dapla-teams".to_string()
}

fn default_template_pr_author() -> String {
    "github-actions[bot]".to_string()
}

fn default_template_pr_title() -> String {
    "Update team template".to_string()
}

fn default_branch_name() -> String {
    "update/template".to_string()
}

fn default_approval_message() -> String {
    "This is an automated approval from `gh-pr-rollout`".to_string()
}

fn default_probe_concurrency() -> usize {
    8
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_org: default_github_org(),
            github_host: None,
            operator: None,
            state_backend: StateBackend::default(),
            state_bucket: default_state_bucket(),
            state_project: default_state_project(),
            local_state_dir: None,
            team_registry_repo: default_team_registry_repo(),
            template_pr_author: default_template_pr_author(),
            template_pr_title: default_template_pr_title(),
            default_branch_name: default_branch_name(),
            approval_message: default_approval_message(),
            probe_concurrency: default_probe_concurrency(),
        }
    }
}

impl AppConfig {
    /// Load config from the first config file found, or use defaults
    pub fn load() -> Self {
        if let Some(content) = crate::load_config_file() {
            match Self::parse(&content) {
                Ok(config) => {
                    log::info!("Loaded app config from file");
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                }
            }
        }

        log::debug!("Using default app config");
        Self::default()
    }

    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Probe window, never zero
    pub fn probe_window(&self) -> usize {
        self.probe_concurrency.max(1)
    }
}
