//! Configuration module for critql.
//!
//! Handles query naming settings, the metamodel source, and environment variables.

mod settings;

pub use settings::{expand_env_vars, MetamodelSettings, QuerySettings, Settings, SettingsError};
