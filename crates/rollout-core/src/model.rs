//! Batch state data model
//!
//! A run (`BatchState`) tracks one pull request per repository and the
//! five workflow stages each of them has to pass.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Current schema version written to new state files
pub const STATE_VERSION: &str = "0.0.1";

const STATUS_TAGS: &[&str] = &["NOT_STARTED", "STARTED", "SUCCESS", "FAIL"];

/// Outcome tag shared by every workflow stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    NotStarted,
    Started,
    Success,
    Fail,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NotStarted,
        Status::Started,
        Status::Success,
        Status::Fail,
    ];

    /// Tag used in state files
    pub fn as_tag(&self) -> &'static str {
        match self {
            Status::NotStarted => "NOT_STARTED",
            Status::Started => "STARTED",
            Status::Success => "SUCCESS",
            Status::Fail => "FAIL",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not started",
            Status::Started => "Started",
            Status::Success => "Success",
            Status::Fail => "Fail",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_tag() == tag)
    }

    /// Older state files stored the enum ordinal (1-based)
    fn from_ordinal(value: u64) -> Option<Self> {
        match value {
            1 => Some(Status::NotStarted),
            2 => Some(Status::Started),
            3 => Some(Status::Success),
            4 => Some(Status::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = Status;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a status tag or an ordinal between 1 and 4")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Status, E> {
                Status::from_tag(value).ok_or_else(|| E::unknown_variant(value, STATUS_TAGS))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Status, E> {
                Status::from_ordinal(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Status, E> {
                u64::try_from(value)
                    .ok()
                    .and_then(Status::from_ordinal)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(value), &self))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// Stage record for one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    #[serde(default)]
    pub opened: Status,
    #[serde(default)]
    pub checks: Status,
    #[serde(default)]
    pub approved: Status,
    /// Also records `atlantis plan` outcomes
    #[serde(default)]
    pub atlantis_apply: Status,
    #[serde(default)]
    pub merged: Status,
}

impl WorkflowStatus {
    /// Workflow for a PR that already exists on GitHub
    pub fn opened() -> Self {
        Self {
            opened: Status::Success,
            ..Self::default()
        }
    }

    /// Stage names and values in display order
    pub fn stages(&self) -> [(&'static str, Status); 5] {
        [
            ("opened", self.opened),
            ("checks", self.checks),
            ("approved", self.approved),
            ("atlantis_apply", self.atlantis_apply),
            ("merged", self.merged),
        ]
    }
}

/// Pull request coordinates; any field may be unknown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrMetadata {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

/// State of a single repository within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Repository name within the configured organization, e.g. "dapla-stat-iac"
    pub name: String,
    #[serde(default)]
    pub pr: PrMetadata,
    #[serde(default)]
    pub workflow: WorkflowStatus,
}

impl RepoState {
    pub fn new(name: impl Into<String>, pr: PrMetadata, workflow: WorkflowStatus) -> Self {
        Self {
            name: name.into(),
            pr,
            workflow,
        }
    }
}

/// A named rollout run: the persisted aggregate root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub name: String,
    #[serde(default)]
    pub repos: BTreeMap<String, RepoState>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

impl BatchState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repos: BTreeMap::new(),
            version: default_version(),
        }
    }

    /// Insert a repository keyed by its own name
    pub fn insert(&mut self, repo: RepoState) -> Option<RepoState> {
        self.repos.insert(repo.name.clone(), repo)
    }

    pub fn get(&self, name: &str) -> Option<&RepoState> {
        self.repos.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RepoState> {
        self.repos.get_mut(name)
    }

    /// Drop a repository from the run. There is no undo.
    pub fn prune(&mut self, name: &str) -> Option<RepoState> {
        self.repos.remove(name)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Check that every key matches the name of the repository it holds
    pub fn validate(&self) -> Result<(), String> {
        match self.repos.iter().find(|(key, repo)| **key != repo.name) {
            Some((key, repo)) => Err(format!(
                "state '{}' maps key '{}' to repository '{}'",
                self.name, key, repo.name
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repo_with_every_status() -> RepoState {
        RepoState::new(
            "dapla-stat-iac",
            PrMetadata {
                number: Some(17),
                url: Some("https://github.com/statisticsnorway/dapla-stat-iac/pull/17".into()),
                branch_name: Some("update/template".into()),
            },
            WorkflowStatus {
                opened: Status::Success,
                checks: Status::Fail,
                approved: Status::Started,
                atlantis_apply: Status::NotStarted,
                merged: Status::Success,
            },
        )
    }

    #[test]
    fn test_status_serializes_as_tag() {
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_tag()));
        }
    }

    #[test]
    fn test_status_accepts_ordinals() {
        let statuses: Vec<Status> = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(statuses, Status::ALL.to_vec());
    }

    #[test]
    fn test_status_rejects_garbage() {
        assert!(serde_json::from_str::<Status>("\"DONE\"").is_err());
        assert!(serde_json::from_str::<Status>("0").is_err());
        assert!(serde_json::from_str::<Status>("-1").is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut state = BatchState::new("pr-ola-template-v2");
        state.insert(repo_with_every_status());
        state.insert(RepoState::new(
            "untracked-iac",
            PrMetadata::default(),
            WorkflowStatus::default(),
        ));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: BatchState = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, state);
        assert_eq!(parsed.version, STATE_VERSION);
    }

    #[test]
    fn test_wire_format() {
        let mut state = BatchState::new("run");
        state.insert(repo_with_every_status());

        let value = serde_json::to_value(&state).unwrap();
        let repo = &value["repos"]["dapla-stat-iac"];
        assert_eq!(value["version"], "0.0.1");
        assert_eq!(repo["pr"]["number"], 17);
        assert_eq!(repo["workflow"]["checks"], "FAIL");
        assert_eq!(repo["workflow"]["approved"], "STARTED");
        assert_eq!(repo["workflow"]["atlantis_apply"], "NOT_STARTED");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"name": "old-run", "repos": {"a": {"name": "a", "pr": {}, "workflow": {"checks": 3}}}}"#;
        let state: BatchState = serde_json::from_str(json).unwrap();
        let repo = state.get("a").unwrap();
        assert_eq!(repo.workflow.checks, Status::Success);
        assert_eq!(repo.workflow.merged, Status::NotStarted);
        assert_eq!(repo.pr.number, None);
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_validate_detects_key_mismatch() {
        let mut state = BatchState::new("run");
        state.insert(repo_with_every_status());
        assert!(state.validate().is_ok());

        let stray = RepoState::new("other", PrMetadata::default(), WorkflowStatus::default());
        state.repos.insert("wrong-key".into(), stray);
        let err = state.validate().unwrap_err();
        assert!(err.contains("wrong-key"));
    }

    #[test]
    fn test_prune_is_permanent() {
        let mut state = BatchState::new("run");
        state.insert(repo_with_every_status());

        assert!(state.prune("dapla-stat-iac").is_some());
        assert!(state.prune("dapla-stat-iac").is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_opened_workflow() {
        let workflow = WorkflowStatus::opened();
        assert_eq!(workflow.opened, Status::Success);
        assert!(workflow.stages()[1..].iter().all(|(_, s)| *s == Status::NotStarted));
    }
}
