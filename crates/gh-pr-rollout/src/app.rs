//! Wiring between the command line and the rollout core

use std::sync::Arc;

use log::{debug, info};
use rollout_config::{AppConfig, StateBackend, paths};
use rollout_core::{
    BlobStore, FsBlobStore, GcsBlobStore, Result, Rollout, StateStore, list_runs,
    operator_identity, remove_run, show_run,
};

use crate::cli::{AddCommand, Cli, Command, JanitorCommand, ProbeCommand, StateCommand};
use crate::terminal::TerminalConsole;

/// Blob backend selected by `state_backend`
fn blob_store(config: &AppConfig) -> Result<Arc<dyn BlobStore>> {
    match config.state_backend {
        StateBackend::Gcs => {
            let store = GcsBlobStore::new(&config.state_bucket, Some(config.state_project.clone()))?;
            Ok(Arc::new(store))
        }
        StateBackend::Local => {
            let dir = match &config.local_state_dir {
                Some(dir) => dir.clone(),
                None => paths::local_state_dir()?,
            };
            Ok(Arc::new(FsBlobStore::new(dir)))
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let console = TerminalConsole;
    let mut store = StateStore::new(blob_store(&config)?);
    info!("Using state storage {}", store.location());

    let operator = if cli.mine {
        let operator = operator_identity(&config).await?;
        debug!("Operator identity: {}", operator);
        store = store.with_operator(operator.clone());
        Some(operator)
    } else {
        None
    };
    let include_other_users = !cli.mine;

    if let Command::State(command) = &cli.command {
        return match command {
            StateCommand::Show { repo_name } => {
                show_run(&store, &console, include_other_users, repo_name.as_deref()).await
            }
            StateCommand::List => list_runs(&store, &console, include_other_users).await.map(|_| ()),
            StateCommand::Remove => remove_run(&store, &console).await.map(|_| ()),
        };
    }

    let github = gh_client::connect(config.github_host.as_deref()).await?;
    let rollout = Rollout {
        store: &store,
        github: &github,
        console: &console,
        config: &config,
        include_other_users,
    };

    match cli.command {
        Command::Ready {
            folder_path,
            state_name,
        } => {
            let operator = match operator {
                Some(operator) => operator,
                None => operator_identity(&config).await?,
            };
            rollout
                .ready(&operator, folder_path.as_deref(), state_name.as_deref())
                .await?;
        }
        Command::Add(AddCommand::Urls {
            target_branch_name,
            pr_urls,
        }) => {
            let branch = target_branch_name.unwrap_or_else(|| config.default_branch_name.clone());
            rollout.add_urls(&pr_urls, &branch).await?;
        }
        Command::Probe(ProbeCommand::Checks { keep_missing }) => {
            rollout.probe_checks(keep_missing).await?;
        }
        Command::Probe(ProbeCommand::Apply) => {
            rollout.probe_apply().await?;
        }
        Command::Approve => {
            rollout.approve().await?;
        }
        Command::Plan => {
            rollout.plan().await?;
        }
        Command::Apply => {
            rollout.apply().await?;
        }
        Command::Merge { allow_override } => {
            rollout.merge(allow_override).await?;
        }
        Command::Janitor(JanitorCommand::ClosePrs {
            keep_remote_branches,
        }) => {
            rollout.close_prs(keep_remote_branches).await?;
        }
        // Handled above without a GitHub connection
        Command::State(_) => {}
    }
    Ok(())
}
