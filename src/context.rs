//! Shared host context
//!
//! Values are collected by a [`HostContextBuilder`] during startup and frozen
//! into an immutable [`HostContext`], which is then shared by `Arc` with every
//! request handler and module. There is no way to change a value once built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::HostConfig;
use crate::error::{HostError, Result};

/// Directory for module data files
pub const DATA_PATH: &str = "DataPath";
/// The host configuration
pub const CONFIGURATION: &str = "Configuration";
/// Root directory of the host's content
pub const CONTENT_ROOT_PATH: &str = "ContentRootPath";
/// Names of the modules to activate
pub const MODULES: &str = "Modules";

/// Name of the data directory under the content root
const DATA_DIR: &str = "App_Data";

/// A value stored in the context
#[derive(Debug, Clone)]
pub enum ContextValue {
    Text(String),
    Path(PathBuf),
    List(Vec<String>),
    Config(Arc<HostConfig>),
}

/// Startup-time collector for context values
#[derive(Debug, Default)]
pub struct HostContextBuilder {
    entries: HashMap<String, ContextValue>,
}

impl HostContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value. Each key may be set only once.
    pub fn set(&mut self, key: impl Into<String>, value: ContextValue) -> Result<&mut Self> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(HostError::DuplicateContextKey(key));
        }
        self.entries.insert(key, value);
        Ok(self)
    }

    /// Freeze the collected values
    pub fn build(self) -> HostContext {
        HostContext {
            entries: self.entries,
        }
    }
}

/// Immutable key/value store shared across the host
#[derive(Debug)]
pub struct HostContext {
    entries: HashMap<String, ContextValue>,
}

impl HostContext {
    /// Build the standard context for a configuration
    pub fn from_config(config: HostConfig) -> Result<Self> {
        let content_root = config.content_root.clone();
        let modules = config.modules.clone();

        let mut builder = HostContextBuilder::new();
        builder
            .set(DATA_PATH, ContextValue::Path(content_root.join(DATA_DIR)))?
            .set(CONFIGURATION, ContextValue::Config(Arc::new(config)))?
            .set(CONTENT_ROOT_PATH, ContextValue::Path(content_root))?
            .set(MODULES, ContextValue::List(modules))?;
        Ok(builder.build())
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Result<&ContextValue> {
        self.entries
            .get(key)
            .ok_or_else(|| HostError::ConfigurationMissing(key.to_string()))
    }

    pub fn configuration(&self) -> Result<&Arc<HostConfig>> {
        match self.get(CONFIGURATION)? {
            ContextValue::Config(config) => Ok(config),
            _ => Err(wrong_type(CONFIGURATION)),
        }
    }

    pub fn data_path(&self) -> Result<&Path> {
        self.path(DATA_PATH)
    }

    pub fn content_root_path(&self) -> Result<&Path> {
        self.path(CONTENT_ROOT_PATH)
    }

    pub fn modules(&self) -> Result<&[String]> {
        match self.get(MODULES)? {
            ContextValue::List(names) => Ok(names),
            _ => Err(wrong_type(MODULES)),
        }
    }

    fn path(&self, key: &str) -> Result<&Path> {
        match self.get(key)? {
            ContextValue::Path(path) => Ok(path),
            _ => Err(wrong_type(key)),
        }
    }
}

fn wrong_type(key: &str) -> HostError {
    HostError::ConfigurationMissing(format!("{} (unexpected value type)", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HostConfig {
        HostConfig::from_lookup(|key| match key {
            "CONTENT_ROOT" => Some("/srv/bot".to_string()),
            "BOT_MODULES" => Some("health,webchat".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_get_after_set() {
        let mut builder = HostContextBuilder::new();
        builder
            .set("K", ContextValue::Text("v".to_string()))
            .unwrap();
        let ctx = builder.build();

        match ctx.get("K").unwrap() {
            ContextValue::Text(v) => assert_eq!(v, "v"),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_missing_key() {
        let ctx = HostContextBuilder::new().build();
        for key in ["", "K", "DataPath", "some other key"] {
            assert!(matches!(
                ctx.get(key),
                Err(HostError::ConfigurationMissing(k)) if k == key
            ));
        }
    }

    #[test]
    fn test_set_is_write_once() {
        let mut builder = HostContextBuilder::new();
        builder.set("K", ContextValue::Text("a".into())).unwrap();
        let err = builder.set("K", ContextValue::Text("b".into())).unwrap_err();
        assert!(matches!(err, HostError::DuplicateContextKey(k) if k == "K"));
    }

    #[test]
    fn test_from_config() {
        let ctx = HostContext::from_config(config()).unwrap();
        assert_eq!(ctx.content_root_path().unwrap(), Path::new("/srv/bot"));
        assert_eq!(ctx.data_path().unwrap(), Path::new("/srv/bot/App_Data"));
        assert_eq!(ctx.modules().unwrap(), ["health", "webchat"]);
        assert_eq!(ctx.configuration().unwrap().legacy_key_length, 32);
    }

    #[test]
    fn test_typed_accessor_on_wrong_type() {
        let mut builder = HostContextBuilder::new();
        builder
            .set(DATA_PATH, ContextValue::Text("not a path".into()))
            .unwrap();
        let ctx = builder.build();
        assert!(matches!(
            ctx.data_path(),
            Err(HostError::ConfigurationMissing(_))
        ));
    }
}
