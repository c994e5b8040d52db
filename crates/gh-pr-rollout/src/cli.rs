//! Command line surface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gh-pr-rollout",
    about = "Drive one templated pull request through many repositories",
    version
)]
pub struct Cli {
    /// Only offer runs created by you
    #[arg(long, global = true)]
    pub mine: bool,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a run from the open template PRs of every team repository
    Ready {
        /// Folder with local clones to use instead of the team registry
        #[arg(short, long)]
        folder_path: Option<PathBuf>,

        /// Run name (prompted when omitted)
        #[arg(short, long)]
        state_name: Option<String>,
    },

    /// Create a run from explicit sources
    #[command(subcommand)]
    Add(AddCommand),

    /// Refresh run status from GitHub
    #[command(subcommand)]
    Probe(ProbeCommand),

    /// Approve every PR whose checks passed
    Approve,

    /// Comment 'atlantis plan' on PRs whose checks or apply failed
    Plan,

    /// Comment 'atlantis apply' on approved PRs with passing checks
    Apply,

    /// Squash merge every applied PR
    Merge {
        /// Also offer PRs already recorded as merged
        #[arg(long = "override")]
        allow_override: bool,
    },

    /// Inspect and delete runs
    #[command(subcommand)]
    State(StateCommand),

    /// Clean up after an abandoned rollout
    #[command(subcommand)]
    Janitor(JanitorCommand),
}

#[derive(Subcommand, Debug)]
pub enum AddCommand {
    /// Build a run from pull request URLs
    Urls {
        /// Head branch of the PRs
        #[arg(short, long)]
        target_branch_name: Option<String>,

        /// https://github.com/<owner>/<repo>/pull/<number>
        #[arg(required = true)]
        pr_urls: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProbeCommand {
    /// Update `checks` from the combined commit status
    Checks {
        /// Keep repositories whose PR disappeared instead of removing them
        #[arg(long)]
        keep_missing: bool,
    },

    /// Update `atlantis_apply` from merge readiness
    Apply,
}

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// Print the run table
    Show {
        /// Only this repository
        #[arg(short, long)]
        repo_name: Option<String>,
    },

    /// List runs, most recent first
    List,

    /// Delete a run
    Remove,
}

#[derive(Subcommand, Debug)]
pub enum JanitorCommand {
    /// Close every PR of a run
    ClosePrs {
        /// Leave the head branches on GitHub
        #[arg(long)]
        keep_remote_branches: bool,
    },
}
