use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTHOR: &str = "pmwiki";
pub const DEFAULT_EMAIL_DOMAIN: &str = "pmwiki";
pub const DEFAULT_GIT_BINARY: &str = "git";

pub const ENV_DEFAULT_AUTHOR: &str = "PMWIKI2GIT_DEFAULT_AUTHOR";
pub const ENV_EMAIL_DOMAIN: &str = "PMWIKI2GIT_EMAIL_DOMAIN";
pub const ENV_GIT_BINARY: &str = "PMWIKI2GIT_GIT";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConvertConfig {
    #[serde(default)]
    pub git: GitSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct GitSection {
    /// Author used for revisions without one.
    pub default_author: Option<String>,
    /// Commit emails are `<author>@<email_domain>`.
    pub email_domain: Option<String>,
    pub git_binary: Option<String>,
}

/// Fully resolved settings for writing commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub default_author: String,
    pub email_domain: String,
    pub git_binary: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            default_author: DEFAULT_AUTHOR.to_string(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            git_binary: DEFAULT_GIT_BINARY.to_string(),
        }
    }
}

impl ConvertConfig {
    /// Resolve git settings: env > config > defaults.
    pub fn git_settings(&self) -> GitSettings {
        self.git_settings_with(|name| env::var(name).ok())
    }

    fn git_settings_with(&self, lookup: impl Fn(&str) -> Option<String>) -> GitSettings {
        let resolve = |name: &str, configured: &Option<String>, default: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .or_else(|| configured.clone())
                .unwrap_or_else(|| default.to_string())
        };
        GitSettings {
            default_author: resolve(ENV_DEFAULT_AUTHOR, &self.git.default_author, DEFAULT_AUTHOR),
            email_domain: resolve(
                ENV_EMAIL_DOMAIN,
                &self.git.email_domain,
                DEFAULT_EMAIL_DOMAIN,
            ),
            git_binary: resolve(ENV_GIT_BINARY, &self.git.git_binary, DEFAULT_GIT_BINARY),
        }
    }
}

/// Load and parse a ConvertConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ConvertConfig> {
    if !config_path.exists() {
        return Ok(ConvertConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ConvertConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
