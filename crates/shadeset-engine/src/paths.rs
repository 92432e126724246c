use std::path::{Path, PathBuf};

use crate::config::{keys, SettingsStore};
use crate::error::EngineError;

/// File the renderer reads; the editor keeps it pointed at the active profile.
pub const SETTINGS_FILE_NAME: &str = "1_settings.glsl";

/// Bundled example next to the settings file, used to seed the first profile.
pub const TEMPLATE_FILE_NAME: &str = "1_settings.glsl.example";

pub const PROFILES_DIR_NAME: &str = "profiles";

/// Extension marking a file in the profile directory as a profile.
pub const PROFILE_EXTENSION: &str = "profile";

/// Overrides the stored shader directory.
pub const SHADER_DIR_ENV: &str = "SHADESET_SHADER_DIR";

/// Directory name searched for under the user and system data dirs.
pub const SHADER_DATA_DIR_NAME: &str = "kwin-effect-shaders_shaders";

/// A validated shader directory and the files the editor manages inside it.
///
/// This is the canonical way to pass locations into the profile engine and the
/// session, keeping path resolution in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    shader_dir: PathBuf,
    canonical: PathBuf,
    template: PathBuf,
    profiles_dir: PathBuf,
}

impl ShaderPaths {
    pub fn new(shader_dir: impl Into<PathBuf>) -> Self {
        let shader_dir = shader_dir.into();
        Self {
            canonical: shader_dir.join(SETTINGS_FILE_NAME),
            template: shader_dir.join(TEMPLATE_FILE_NAME),
            profiles_dir: shader_dir.join(PROFILES_DIR_NAME),
            shader_dir,
        }
    }

    /// Locate the shader directory.
    ///
    /// Resolution order:
    /// 1) `explicit` (command line)
    /// 2) `SHADESET_SHADER_DIR` env var
    /// 3) the store's `ShaderPath`
    /// 4) `kwin-effect-shaders_shaders` under the user data dir, then `XDG_DATA_DIRS`
    ///
    /// The first candidate that is a readable directory wins.
    pub fn discover(explicit: Option<&Path>, store: &dyn SettingsStore) -> Result<Self, EngineError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        candidates.extend(explicit.map(Path::to_path_buf));
        if let Ok(p) = std::env::var(SHADER_DIR_ENV) {
            if !p.trim().is_empty() {
                candidates.push(PathBuf::from(p.trim()));
            }
        }
        if let Some(p) = store.get_string(keys::SHADER_PATH) {
            if !p.trim().is_empty() {
                candidates.push(PathBuf::from(p.trim()));
            }
        }
        candidates.extend(data_dirs().into_iter().map(|d| d.join(SHADER_DATA_DIR_NAME)));

        candidates
            .iter()
            .find(|p| is_readable_dir(p))
            .map(|p| Self::new(p.clone()))
            .ok_or_else(|| EngineError::NotFound {
                path: candidates
                    .first()
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(SHADER_DATA_DIR_NAME)),
            })
    }

    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }
}

fn is_readable_dir(p: &Path) -> bool {
    std::fs::read_dir(p).is_ok()
}

/// User data dir followed by `XDG_DATA_DIRS` (or its documented default).
fn data_dirs() -> Vec<PathBuf> {
    let mut dirs_out: Vec<PathBuf> = dirs::data_dir().into_iter().collect();
    let system = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    dirs_out.extend(std::env::split_paths(&system));
    dirs_out
}
