//! Editor settings store.
//!
//! The engine only reads and writes a handful of named keys; how they are
//! persisted is up to the [`SettingsStore`] implementation. `JsonSettingsStore`
//! keeps them as one flat JSON object on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Keys the engine reads or writes.
pub mod keys {
    /// Shader directory holding `1_settings.glsl`.
    pub const SHADER_PATH: &str = "ShaderPath";
    /// Name of the active profile.
    pub const ACTIVE_PROFILE: &str = "ActiveProfile";
    /// Mirror of the document's whitelist line.
    pub const WHITELIST: &str = "Whitelist";
    pub const BLACKLIST: &str = "Blacklist";
    /// Persist every document change immediately.
    pub const AUTO_SAVE: &str = "AutoSave";
    /// Renderer applies shaders to new windows by default.
    pub const DEFAULT_ENABLED: &str = "DefaultEnabled";
}

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), EngineError>;

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Missing or non-boolean values read as `false`.
    fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }
}

/// Flat JSON object persisted on every `set`.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonSettingsStore {
    /// `<config dir>/shadeset/settings.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("shadeset");
        path.push("settings.json");
        path
    }

    /// Open the store. A missing file is an empty store; it is created on the first `set`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(src) if src.trim().is_empty() => Map::new(),
            Ok(src) => serde_json::from_str(&src).map_err(|e| EngineError::Json {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(EngineError::io(&path, e)),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.values).map_err(|e| EngineError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        std::fs::write(&self.path, json).map_err(|e| EngineError::io(&self.path, e))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// In-memory store, for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Typed snapshot of the keys, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditorSettings {
    pub shader_path: Option<String>,
    pub active_profile: Option<String>,
    pub whitelist: Option<String>,
    pub blacklist: Option<String>,
    pub auto_save: bool,
    pub default_enabled: bool,
}

impl EditorSettings {
    pub fn from_store(store: &dyn SettingsStore) -> Self {
        Self {
            shader_path: store.get_string(keys::SHADER_PATH),
            active_profile: store.get_string(keys::ACTIVE_PROFILE),
            whitelist: store.get_string(keys::WHITELIST),
            blacklist: store.get_string(keys::BLACKLIST),
            auto_save: store.get_bool(keys::AUTO_SAVE),
            default_enabled: store.get_bool(keys::DEFAULT_ENABLED),
        }
    }
}
