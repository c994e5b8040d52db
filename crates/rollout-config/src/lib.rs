//! Configuration and file management for gh-pr-rollout
//!
//! This crate provides:
//! - Directory utilities for config and local state files
//! - Configuration file discovery (TOML)
//! - Application configuration (AppConfig)

pub mod app_config;
pub mod config_file;
pub mod paths;

pub use app_config::{AppConfig, StateBackend};
pub use config_file::load_config_file;

/// Name used for config and data directories
pub const APP_NAME: &str = "gh-pr-rollout";
