//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use trellis_core::{EntityKindDecl, Schema, Variable};

/// Pattern variable used when neither `--var` nor the config names one
pub const DEFAULT_VARIABLE: &str = "n";

/// Get default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trellis")
        .join("trellis.toml")
}

/// Contents of `trellis.toml`
///
/// The schema lives in `[[kinds]]` tables. It can also be kept in a
/// separate file passed with `--schema`, which only needs the kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_variable: Option<String>,

    #[serde(default)]
    pub kinds: Vec<EntityKindDecl>,
}

impl Config {
    /// Load the config file
    ///
    /// An explicit path has to exist. The default path is optional and
    /// falls back to an empty config.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::read(&path)
                } else {
                    tracing::debug!("No config file at {:?}", path);
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if let Some(name) = &config.default_variable {
            Variable::parse(name).with_context(|| format!("Invalid config {}", path.display()))?;
        }
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Replace the kinds with those of a separate schema file
    pub fn with_schema_file(mut self, path: &Path) -> anyhow::Result<Self> {
        self.kinds = Self::read(path)?.kinds;
        Ok(self)
    }

    pub fn variable(&self) -> &str {
        self.default_variable.as_deref().unwrap_or(DEFAULT_VARIABLE)
    }

    /// Pattern variable named by `--var`, falling back to the config
    pub fn pattern_variable(&self, flag: Option<&str>) -> anyhow::Result<Variable> {
        Ok(Variable::parse(flag.unwrap_or_else(|| self.variable()))?)
    }

    /// Validate the declared kinds into a schema
    pub fn schema(&self) -> anyhow::Result<Schema> {
        if self.kinds.is_empty() {
            anyhow::bail!("No entity kinds declared; pass --config or --schema");
        }
        Ok(Schema::from_decls(self.kinds.clone())?)
    }
}
