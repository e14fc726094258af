//! Configuration management for pve-lxc
//!
//! Configuration is a stack of YAML layers merged key by key, last layer
//! winning per leaf, then checked against the typed schema. Layers in order:
//! built-in defaults, the user config, optional extra files, CLI overrides.

pub mod paths;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

pub use paths::{get_config_dir, get_ssh_config_path, get_user_config_path};
pub use schema::{
    BootstrapConfig, Config, ContainerDefaults, DeployConfig, LoggingConfig, NetworkConfig,
    PLACEHOLDER_STORAGE,
};

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax error; `line` is 1-based when the parser reports it
    #[error("{}{}: {message}", .path.display(), line_suffix(.line))]
    Parse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// Well-formed YAML that does not fit the schema
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" line {l}")).unwrap_or_default()
}

/// Merge overlays into one value
///
/// Mappings are merged recursively; any other value in a later overlay
/// replaces what came before.
pub fn merge(overlays: &[Value]) -> Value {
    overlays
        .iter()
        .fold(Value::Mapping(Mapping::new()), |base, overlay| {
            merge_pair(base, overlay)
        })
}

fn merge_pair(base: Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(key) {
                    Some(existing) => merge_pair(existing, value),
                    None => value.clone(),
                };
                base.insert(key.clone(), merged);
            }
            Value::Mapping(base)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Parse YAML text into a top-level mapping
///
/// An empty document is an empty mapping.
pub fn parse_yaml(path: &Path, contents: &str) -> Result<Mapping, ConfigError> {
    let value: Value = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        line: e.location().map(|loc| loc.line()),
        message: e.to_string(),
    })?;

    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a YAML mapping at the top level",
            path.display()
        ))),
    }
}

fn read_yaml(path: &Path) -> Result<Mapping, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_yaml(path, &contents)
}

/// Load a per-command parameter file (`--config <yaml>`)
///
/// Unlike config layers, a missing parameter file is an error.
pub fn load_params_file(path: &Path) -> Result<Mapping, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let params = read_yaml(path)?;
    tracing::debug!("Loaded {} parameters from {}", params.len(), path.display());
    Ok(params)
}

/// Builder over configuration layers
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    layers: Vec<Value>,
}

impl ConfigLoader {
    /// Loader holding only the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `~/.pve-lxc/config.yaml` if it exists
    pub fn with_user_config(self) -> Result<Self, ConfigError> {
        match get_user_config_path() {
            Some(path) => self.with_file(&path),
            None => Ok(self),
        }
    }

    /// Add a YAML file as a layer; a missing file is skipped
    pub fn with_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            self.layers.push(Value::Mapping(read_yaml(path)?));
            tracing::debug!("Loaded config layer {}", path.display());
        }
        Ok(self)
    }

    /// Add an already-parsed layer
    pub fn with_layer(mut self, layer: Value) -> Self {
        self.layers.push(layer);
        self
    }

    /// Override a single value addressed by a dotted key, e.g. `container.cores`
    ///
    /// `None` leaves the lower layers untouched.
    pub fn with_override<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            let layer = key
                .rsplit('.')
                .fold(value.into(), |inner, part| {
                    let mut mapping = Mapping::new();
                    mapping.insert(Value::String(part.to_string()), inner);
                    Value::Mapping(mapping)
                });
            self.layers.push(layer);
        }
        self
    }

    /// All layers merged, defaults included
    pub fn merged(&self) -> Result<Value, ConfigError> {
        let defaults = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut overlays = Vec::with_capacity(self.layers.len() + 1);
        overlays.push(defaults);
        overlays.extend(self.layers.iter().cloned());
        Ok(merge(&overlays))
    }

    /// Merge and validate into a typed [`Config`]
    pub fn build(&self) -> Result<Config, ConfigError> {
        serde_yaml::from_value(self.merged()?).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
