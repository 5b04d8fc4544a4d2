//! Settings file (`cteforge.toml`).
//!
//! ```toml
//! dialect = "dbt"
//! environment = "dev"
//! output_dir = "models/generated"
//!
//! [batch]
//! extension = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compiler::CompileOptions;
use crate::error::{ForgeError, ForgeResult};
use crate::transpiler::Dialect;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "cteforge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dialect: Dialect,
    pub environment: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Extension of the configuration documents to pick up.
    pub extension: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> ForgeResult<Self> {
        toml::from_str(text).map_err(|e| ForgeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ForgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Default location in the user config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cteforge").join("config.toml"))
    }

    /// Load settings from `explicit`, else `./cteforge.toml`, else the user
    /// config file, else defaults. An explicit path must exist.
    pub fn discover(explicit: Option<&Path>) -> ForgeResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Self::load(&local);
        }
        match Self::user_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Merge command-line overrides into compile options.
    pub fn compile_options(
        &self,
        dialect: Option<Dialect>,
        environment: Option<String>,
    ) -> ForgeResult<CompileOptions> {
        let environment = environment
            .or_else(|| self.environment.clone())
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ForgeError::Config(
                    "no environment given: pass --environment or set `environment` in cteforge.toml"
                        .to_string(),
                )
            })?;
        Ok(CompileOptions::new(dialect.unwrap_or(self.dialect), environment))
    }
}
