//! TOML-based configuration for critql.
//!
//! Supports a config file (critql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [query]
//! default_alias = "DN_THIS"
//! language = "JPQL"
//! subquery_prefix = "DN_SUBQUERY_"
//! parameter_prefix = "DN_PARAM_"
//!
//! [metamodel]
//! path = "${APP_HOME}/model.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::metadata::{Metamodel, MetamodelError};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load metamodel: {0}")]
    Metamodel(#[from] MetamodelError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Query construction settings.
    pub query: QuerySettings,

    /// Metamodel source.
    pub metamodel: MetamodelSettings,
}

/// Naming and tagging used while building and compiling queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Alias given to a root the caller did not alias.
    pub default_alias: String,

    /// Query-language tag stamped on compilations.
    pub language: String,

    /// Prefix of generated subquery variable names.
    pub subquery_prefix: String,

    /// Prefix of generated anonymous parameter names.
    pub parameter_prefix: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_alias: "DN_THIS".to_string(),
            language: "JPQL".to_string(),
            subquery_prefix: "DN_SUBQUERY_".to_string(),
            parameter_prefix: "DN_PARAM_".to_string(),
        }
    }
}

/// Where the entity metamodel comes from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetamodelSettings {
    /// Path to a metamodel TOML file (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl MetamodelSettings {
    /// Get the metamodel path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CRITQL_CONFIG`
    /// 2. `./critql.toml`
    /// 3. `~/.config/critql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("CRITQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("critql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("critql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject aliases and prefixes that cannot appear in query text.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let q = &self.query;
        check_identifier("query.default_alias", &q.default_alias)?;
        check_identifier("query.subquery_prefix", &q.subquery_prefix)?;
        check_identifier("query.parameter_prefix", &q.parameter_prefix)?;
        if q.language.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "query.language must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Load the configured metamodel, if a path is set.
    pub fn load_metamodel(&self) -> Result<Option<Metamodel>, SettingsError> {
        match self.metamodel.resolved_path()? {
            Some(path) => Ok(Some(Metamodel::from_file(path)?)),
            None => Ok(None),
        }
    }
}

fn check_identifier(key: &str, value: &str) -> Result<(), SettingsError> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_alphabetic() || first == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SettingsError::InvalidConfig(format!(
            "{} must be an identifier, got '{}'",
            key, value
        )))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at non-alphanumeric/underscore
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
