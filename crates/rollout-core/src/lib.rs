//! Batch workflow state machine for pull request rollouts
//!
//! A rollout applies one templated change to many repositories, each through
//! its own pull request. Every repository moves through five stages:
//!
//! ```text
//! opened -> checks -> approved -> atlantis_apply -> merged
//! ```
//!
//! The run (`BatchState`) is persisted between invocations by `StateStore`,
//! so `probe`, `approve`, `apply` and `merge` can be separate commands,
//! days apart, from different machines.
//!
//! # Modules
//!
//! - `model`: `Status`, `WorkflowStatus`, `RepoState`, `BatchState`
//! - `store`: blob backends and `StateStore`
//! - `runner`: `BatchRunner`, saves the run whatever the operation returned
//! - `prober`: syncs `checks` and `atlantis_apply` with GitHub
//! - `stage`: the stage executors and their transition rules
//! - `actions`: the command flows (`Rollout`)
//! - `ready`: run creation
//! - `fakes`: in-memory GitHub, console and blob store for tests

pub mod actions;
pub mod console;
pub mod error;
pub mod fakes;
pub mod identity;
pub mod model;
pub mod prober;
pub mod ready;
pub mod runner;
pub mod stage;
pub mod store;

pub use actions::{Rollout, list_runs, remove_run, show_run, show_state};
pub use console::{Console, Notice};
pub use error::{Result, RolloutError};
pub use identity::operator_identity;
pub use model::{BatchState, PrMetadata, RepoState, STATE_VERSION, Status, WorkflowStatus};
pub use prober::{ProbeReport, Prober};
pub use runner::BatchRunner;
pub use stage::{BatchSummary, Outcome, SkipReason, StageContext, StageExecutor};
pub use store::{BlobStore, FsBlobStore, GcsBlobStore, MemoryBlobStore, RunEntry, StateStore};
