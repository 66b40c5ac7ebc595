//! Front-end configuration and the small key-value preference store.

use retro_core::ScalingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::persistence::write_atomic;

/// Preference key holding the scaling policy as an integer.
pub const SCALING_MODE_KEY: &str = "scaling_mode";

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root of cheats, save states and preferences.
    pub data_dir: PathBuf,
    #[serde(default)]
    pub core_path: Option<PathBuf>,
    /// Directory handed to the core for BIOS and system files.
    #[serde(default)]
    pub system_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
    #[serde(default = "default_true")]
    pub frame_pacing: bool,
    #[serde(default)]
    pub last_rom_path: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("retrofront-data"),
            core_path: None,
            system_dir: None,
            audio_enabled: true,
            frame_pacing: true,
            last_rom_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults on error.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            // File doesn't exist or can't be read, use defaults
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(path, contents.as_bytes())?;
        Ok(())
    }

    /// System directory for the core, defaulting to `<data>/system`.
    pub fn system_dir(&self) -> PathBuf {
        self.system_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("system"))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }
}

/// Opaque integer key-value store for user preferences.
pub trait PreferenceStore {
    fn get_int(&self, key: &str) -> Option<i64>;
    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PersistError>;

    fn scaling_policy(&self) -> ScalingPolicy {
        self.get_int(SCALING_MODE_KEY)
            .map(ScalingPolicy::from)
            .unwrap_or_default()
    }

    fn set_scaling_policy(&mut self, policy: ScalingPolicy) -> Result<(), PersistError> {
        self.set_int(SCALING_MODE_KEY, policy.into())
    }
}

/// Preferences kept in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, i64>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PersistError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Preferences backed by a flat JSON object, rewritten on every change.
#[derive(Debug, Clone)]
pub struct JsonPreferences {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl JsonPreferences {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("ignoring corrupt preferences {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferences {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PersistError> {
        self.values.insert(key.to_string(), value);
        let contents = serde_json::to_string_pretty(&self.values)?;
        write_atomic(&self.path, contents.as_bytes())?;
        Ok(())
    }
}

impl<P: PreferenceStore + ?Sized> PreferenceStore for Box<P> {
    fn get_int(&self, key: &str) -> Option<i64> {
        (**self).get_int(key)
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PersistError> {
        (**self).set_int(key, value)
    }
}
