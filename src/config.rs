//! Run configuration: keep definitions file, environment and filters

use crate::error::{Error, Result};
use crate::keep::KeepDefinition;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Keep definitions file, relative to the repository root
pub const DEFAULT_CONFIG_FILE: &str = ".housekeeper.toml";

/// Environment variable naming the fork project branches are pushed to
pub const FORK_PROJECT_ENV: &str = "HOUSEKEEPER_FORK_PROJECT_ID";

/// Environment variable naming the project merge requests target
pub const TARGET_PROJECT_ENV: &str = "HOUSEKEEPER_TARGET_PROJECT_ID";

/// Contents of the keep definitions file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousekeeperConfig {
    /// Keeps in the order they run
    #[serde(default)]
    pub keeps: Vec<KeepDefinition>,
}

impl HousekeeperConfig {
    /// Check keep names are unique and every keep has a command
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for keep in &self.keeps {
            if keep.name.trim().is_empty() {
                return Err(Error::Config("keep with empty name".into()));
            }
            if !seen.insert(keep.name.as_str()) {
                return Err(Error::Config(format!("keep '{}' defined twice", keep.name)));
            }
            if keep.command.is_empty() {
                return Err(Error::Config(format!("keep '{}' has no command", keep.name)));
            }
        }
        Ok(())
    }

    /// Keeps to run: all of them, or only the named ones (in config order)
    pub fn select_keeps(&self, names: &[String]) -> Result<Vec<KeepDefinition>> {
        if names.is_empty() {
            return Ok(self.keeps.clone());
        }

        if let Some(unknown) = names
            .iter()
            .find(|name| !self.keeps.iter().any(|k| &k.name == *name))
        {
            return Err(Error::Config(format!("unknown keep '{unknown}'")));
        }

        Ok(self
            .keeps
            .iter()
            .filter(|k| names.contains(&k.name))
            .cloned()
            .collect())
    }
}

/// Load the keep definitions file.
///
/// A missing file means no keeps are configured.
pub fn load_config(path: &Path) -> Result<HousekeeperConfig> {
    if !path.exists() {
        return Ok(HousekeeperConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let config: HousekeeperConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    config.validate()?;
    Ok(config)
}

/// Source and target project ids from the environment
pub fn project_ids_from_env() -> Result<(String, String)> {
    Ok((required_env(FORK_PROJECT_ENV)?, required_env(TARGET_PROJECT_ENV)?))
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::Config(format!("{name} must be set"))),
    }
}

/// Compile `--filter-identifiers` patterns
pub fn compile_filters(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| Error::Config(format!("invalid filter '{pattern}': {e}")))
        })
        .collect()
}
