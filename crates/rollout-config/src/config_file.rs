use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = ".gh-pr-rollout.toml";

/// Load config file content
///
/// Searches in order:
/// 1. `.gh-pr-rollout.toml` in the current working directory
/// 2. `config.toml` in the platform config directory
/// 3. `.gh-pr-rollout.toml` in the home directory
///
/// Returns the file content if found, None otherwise.
pub fn load_config_file() -> Option<String> {
    candidate_paths()
        .iter()
        .find_map(|path| read_config(path))
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Ok(path) = crate::paths::app_config_path() {
        paths.push(path);
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_FILE));
    }
    paths
}

fn read_config(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            log::debug!("Loaded config from {}", path.display());
            Some(content)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(&dir.path().join("nope.toml")).is_none());
    }

    #[test]
    fn test_read_config_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "github_org = \"acme\"").unwrap();
        assert_eq!(read_config(&path).as_deref(), Some("github_org = \"acme\""));
    }

    #[test]
    fn test_cwd_candidate_comes_first() {
        let paths = candidate_paths();
        assert_eq!(paths[0], PathBuf::from(CONFIG_FILE));
    }
}
