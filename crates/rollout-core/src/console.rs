//! Operator-facing I/O
//!
//! The core reports progress and asks questions through `Console` so the
//! terminal implementation can live in the binary and tests can script
//! the answers.

use crate::model::BatchState;

/// Severity of a per-repository notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Warning,
    Failure,
}

pub trait Console: Send + Sync {
    /// Section heading, e.g. "Approving PRs.."
    fn heading(&self, text: &str);

    /// Marks the start of output for one repository
    fn repo(&self, name: &str);

    /// Indented status line under the current repository
    fn notice(&self, level: Notice, message: &str);

    /// Plain informational line
    fn info(&self, message: &str);

    /// Render the state table, optionally for a single repository
    fn show_state(&self, state: &BatchState, repo: Option<&str>);

    /// Yes/no question; `Ok(false)` when declined
    fn confirm(&self, question: &str) -> anyhow::Result<bool>;

    /// Pick one of `choices`; `Ok(None)` when cancelled
    fn select(&self, question: &str, choices: &[String]) -> anyhow::Result<Option<usize>>;

    /// Free-text answer
    fn input(&self, question: &str) -> anyhow::Result<String>;

    fn success(&self, message: &str) {
        self.notice(Notice::Success, message);
    }

    fn warning(&self, message: &str) {
        self.notice(Notice::Warning, message);
    }

    fn failure(&self, message: &str) {
        self.notice(Notice::Failure, message);
    }

    fn skipping(&self) {
        self.notice(Notice::Warning, "Skipping..");
    }
}
