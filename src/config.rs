use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::model::Repository;
use crate::storage::{StoreOptions, DEFAULT_MAILBOX_CAPACITY, DEFAULT_SUBMIT_TIMEOUT};

const APP_DIR: &str = "actiondeck";

const CONFIG_TEMPLATE: &str = r#"# actiondeck configuration
#
# database: /path/to/workflows.db   # defaults to the user data directory
# submit_timeout_ms: 5000
# mailbox_capacity: 64
#
# repos:
#   - repo: my-project
#     owner: my-github-user
#     token: INSERT_TOKEN_HERE
repos: []
"#;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox_capacity: Option<usize>,
    #[serde(default)]
    pub repos: Vec<Repository>,
}

impl AppConfig {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Every repository must be callable, and names are unique
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for repo in &self.repos {
            repo.validate()?;
            if !seen.insert(repo.name.as_str()) {
                anyhow::bail!("repository '{}' is configured more than once", repo.name);
            }
        }
        if self.mailbox_capacity == Some(0) {
            anyhow::bail!("mailbox_capacity must be at least 1");
        }
        Ok(())
    }

    /// Repositories to seed the store with
    pub fn repositories(&self) -> Vec<Repository> {
        self.repos.clone()
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repos.iter().find(|repo| repo.name == name)
    }

    /// Repositories a sync run covers, one by name or all of them.
    ///
    /// Read from the config, never from the cache.
    pub fn sync_targets(&self, only: Option<&str>) -> anyhow::Result<Vec<Repository>> {
        match only {
            Some(name) => match self.repository(name) {
                Some(repo) => Ok(vec![repo.clone()]),
                None => anyhow::bail!("repository '{}' is not configured", name),
            },
            None => Ok(self.repositories()),
        }
    }

    pub fn repositories_for_owner(&self, owner: &str) -> Vec<&Repository> {
        self.repos.iter().filter(|repo| repo.owner == owner).collect()
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            mailbox_capacity: self.mailbox_capacity.unwrap_or(DEFAULT_MAILBOX_CAPACITY),
            submit_timeout: self
                .submit_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SUBMIT_TIMEOUT),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.yaml")
}

pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("workflows.db")
}

/// Load the configuration, writing a template first if none exists yet
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        write_template(&path)?;
        tracing::info!("created config template at {}", path.display());
    }

    let contents = std::fs::read_to_string(&path)?;
    AppConfig::from_yaml(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
database: /tmp/actiondeck-test.db
submit_timeout_ms: 250
repos:
  - repo: lazy-project
    owner: andreas
    token: t1
  - repo: dotfiles
    owner: andreas
    token: t2
  - repo: website
    owner: someone-else
    token: t3
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.repos.len(), 3);
        assert_eq!(config.repository("dotfiles").unwrap().token, "t2");
        assert!(config.repository("missing").is_none());
        assert_eq!(config.repositories_for_owner("andreas").len(), 2);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/actiondeck-test.db"));

        let options = config.store_options();
        assert_eq!(options.submit_timeout, Duration::from_millis(250));
        assert_eq!(options.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_sync_targets_come_from_config() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();

        let all = config.sync_targets(None).unwrap();
        assert_eq!(all.len(), 3);

        let one = config.sync_targets(Some("website")).unwrap();
        assert_eq!(one, vec![Repository::new("website", "someone-else", "t3")]);

        let err = config.sync_targets(Some("removed")).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let yaml = "repos:\n  - repo: lazy-project\n    owner: andreas\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        let yaml = "repos:\n  - repo: lazy-project\n    owner: andreas\n    token: ''\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = "repos:\n  - {repo: a, owner: x, token: t}\n  - {repo: a, owner: y, token: t}\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_creates_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = load_config(Some(&path)).unwrap();

        assert!(path.exists());
        assert!(config.repos.is_empty());
        assert_eq!(config.store_options(), StoreOptions::default());
    }

    #[test]
    fn test_load_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.repositories().len(), 3);
    }

    #[test]
    fn test_default_paths() {
        assert!(default_config_path().ends_with("actiondeck/config.yaml"));
        assert!(default_database_path().ends_with("actiondeck/workflows.db"));
    }
}
