use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "discussions.toml";
pub const DATABASE_FILE: &str = "discussions.db";

/// Runtime configuration, read from `<data_dir>/discussions.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root namespace under which every record is stored
    pub root_location: String,
    pub contexts_location: String,
    pub discussions_location: String,
    pub messages_location: String,

    /// Markup syntax assumed for messages posted without one
    pub default_syntax: String,

    pub bind_address: String,
    pub port: u16,

    /// Page size used by the livetable listing when none is requested
    pub livetable_page_size: usize,

    /// When set, logs are also written to a daily rolling file in this directory
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_location: "Discussions.Code".to_string(),
            contexts_location: "DiscussionContexts".to_string(),
            discussions_location: "Discussions".to_string(),
            messages_location: "Messages".to_string(),
            default_syntax: "markdown/1.2".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            livetable_page_size: 15,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the configuration stored in `data_dir`, falling back to defaults
    /// when the file does not exist.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), text)?;
        Ok(())
    }

    pub fn database_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DATABASE_FILE)
    }

    /// Namespace of a record: `{root}.{application_hint}.{sub_location}`
    pub fn namespace(&self, application_hint: &str, sub_location: &str) -> String {
        format!("{}.{}.{}", self.root_location, application_hint, sub_location)
    }

    pub fn contexts_namespace(&self, application_hint: &str) -> String {
        self.namespace(application_hint, &self.contexts_location)
    }

    pub fn discussions_namespace(&self, application_hint: &str) -> String {
        self.namespace(application_hint, &self.discussions_location)
    }

    pub fn messages_namespace(&self, application_hint: &str) -> String {
        self.namespace(application_hint, &self.messages_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("port = 8080\nroot_location = \"Forum\"\n").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.root_location, "Forum");
        assert_eq!(config.default_syntax, "markdown/1.2");
        assert_eq!(config.livetable_page_size, 15);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            port: 4242,
            log_dir: Some(PathBuf::from("/var/log/discussions")),
            ..Config::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_namespaces() {
        let config = Config::default();
        assert_eq!(
            config.messages_namespace("forum"),
            "Discussions.Code.forum.Messages"
        );
        assert_eq!(
            config.contexts_namespace("stream"),
            "Discussions.Code.stream.DiscussionContexts"
        );
    }
}
