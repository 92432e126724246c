//! Named variants of the settings document.
//!
//! Profiles live as `<name>.profile` files in the profile directory. The
//! canonical `1_settings.glsl` is a symlink to the active one, or a copy of it
//! where links are unavailable ([`LinkMode::Copy`]). Either way the canonical
//! file always shows the active profile's latest saved content.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::EngineError;
use crate::paths::{ShaderPaths, PROFILE_EXTENSION};
use crate::{logi, logw};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub path: PathBuf,
}

/// How the canonical path follows the active profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Canonical path is a symbolic link to the profile file.
    Symlink,
    /// Canonical path is a regular file kept in sync with the profile file.
    Copy,
}

impl LinkMode {
    pub fn platform_default() -> Self {
        if cfg!(unix) {
            LinkMode::Symlink
        } else {
            LinkMode::Copy
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileManager {
    dir: PathBuf,
    canonical: PathBuf,
    mode: LinkMode,
}

impl ProfileManager {
    pub fn new(paths: &ShaderPaths, mode: LinkMode) -> Self {
        Self {
            dir: paths.profiles_dir().to_path_buf(),
            canonical: paths.canonical().to_path_buf(),
            mode,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    /// Profiles sorted by name. A missing directory means no profiles.
    pub fn list(&self) -> Result<Vec<Profile>, EngineError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::io(&self.dir, e)),
        };

        let mut profiles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                profiles.push(Profile { name: name.to_string(), path: path.clone() });
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub fn get(&self, name: &str) -> Option<Profile> {
        let path = self.path_for(name);
        path.is_file().then(|| Profile { name: name.to_string(), path })
    }

    /// Copy `source` into a fresh, uniquely named profile.
    ///
    /// The name comes from a placeholder created and removed in the profile
    /// directory, so it cannot collide with an existing profile.
    pub fn create_from(&self, source: &Path) -> Result<Profile, EngineError> {
        if !source.is_file() {
            return Err(EngineError::NotFound { path: source.to_path_buf() });
        }
        fs::create_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;

        let placeholder = tempfile::Builder::new()
            .prefix("profile_")
            .suffix(&format!(".{PROFILE_EXTENSION}"))
            .tempfile_in(&self.dir)
            .map_err(|e| EngineError::io(&self.dir, e))?;
        let path = placeholder.path().to_path_buf();
        placeholder.close().map_err(|e| EngineError::io(&path, e))?;

        fs::copy(source, &path).map_err(|e| EngineError::io(source, e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidName { name: path.display().to_string() })?;

        logi!("PROFILE", "created '{name}' from {}", source.display());
        Ok(Profile { name, path })
    }

    /// Duplicate an existing profile under a fresh name.
    pub fn copy(&self, name: &str) -> Result<Profile, EngineError> {
        let source = self.get(name).ok_or_else(|| EngineError::NotFound { path: self.path_for(name) })?;
        self.create_from(&source.path)
    }

    /// Copy `old` to `new`, then remove `old`.
    ///
    /// Re-pointing the canonical path when `old` was active is the caller's job.
    pub fn rename(&self, old: &str, new: &str) -> Result<Profile, EngineError> {
        let new = new.trim();
        if new.is_empty() || new == old || !is_plain_name(new) {
            return Err(EngineError::InvalidName { name: new.to_string() });
        }
        if self.get(new).is_some() {
            return Err(EngineError::NameConflict { name: new.to_string() });
        }
        let source = self.get(old).ok_or_else(|| EngineError::NotFound { path: self.path_for(old) })?;

        let target = self.path_for(new);
        fs::copy(&source.path, &target).map_err(|e| EngineError::io(&target, e))?;
        if let Err(e) = fs::remove_file(&source.path) {
            // Keep exactly one copy around.
            let _ = fs::remove_file(&target);
            return Err(EngineError::io(&source.path, e));
        }

        logi!("PROFILE", "renamed '{old}' -> '{new}'");
        Ok(Profile { name: new.to_string(), path: target })
    }

    /// Remove a profile, refusing to remove the last one.
    pub fn delete(&self, name: &str) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::NoSelection);
        }
        let profiles = self.list()?;
        let profile = profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::NotFound { path: self.path_for(name) })?;
        if profiles.len() <= 1 {
            return Err(EngineError::LastProfile { name: name.to_string() });
        }
        fs::remove_file(&profile.path).map_err(|e| EngineError::io(&profile.path, e))?;
        logi!("PROFILE", "deleted '{name}'");
        Ok(())
    }

    /// Replace whatever sits at the canonical path with a link (or copy) of `profile`.
    pub fn link_canonical(&self, profile: &Profile) -> Result<(), EngineError> {
        if fs::symlink_metadata(&self.canonical).is_ok() {
            fs::remove_file(&self.canonical).map_err(|e| EngineError::io(&self.canonical, e))?;
        }

        match self.mode {
            LinkMode::Symlink => self.symlink_canonical(profile),
            LinkMode::Copy => fs::copy(&profile.path, &self.canonical)
                .map(|_| ())
                .map_err(|e| EngineError::io(&self.canonical, e)),
        }
    }

    #[cfg(unix)]
    fn symlink_canonical(&self, profile: &Profile) -> Result<(), EngineError> {
        let target = fs::canonicalize(&profile.path).unwrap_or_else(|_| profile.path.clone());
        std::os::unix::fs::symlink(&target, &self.canonical).map_err(|e| EngineError::io(&self.canonical, e))
    }

    #[cfg(not(unix))]
    fn symlink_canonical(&self, profile: &Profile) -> Result<(), EngineError> {
        logw!("PROFILE", "symbolic links unavailable; copying {} instead", profile.path.display());
        fs::copy(&profile.path, &self.canonical)
            .map(|_| ())
            .map_err(|e| EngineError::io(&self.canonical, e))
    }

    /// Profile the canonical symlink points at, if it is one of ours.
    pub fn linked_profile(&self) -> Option<String> {
        let target = fs::read_link(&self.canonical).ok()?;
        if target.extension().and_then(|s| s.to_str()) != Some(PROFILE_EXTENSION) {
            return None;
        }
        let name = target.file_stem()?.to_str()?.to_string();
        self.get(&name).is_some().then_some(name)
    }

    /// The canonical path ends up a regular file: copy mode, or no symlinks here.
    fn copies(&self) -> bool {
        self.mode == LinkMode::Copy || cfg!(not(unix))
    }

    fn canonical_is_file(&self) -> bool {
        fs::symlink_metadata(&self.canonical)
            .map(|m| m.file_type().is_file())
            .unwrap_or(false)
    }

    /// Whether the canonical path already shows `profile`, so it need not be relinked.
    ///
    /// A regular canonical file that differs from `last_active` was edited while
    /// nobody was watching; its content is pushed into that profile first so
    /// the edit survives whatever happens next.
    pub fn adopt_canonical(&self, profile: &Profile, last_active: bool) -> Result<bool, EngineError> {
        if !self.canonical_is_file() {
            return Ok(!self.copies() && self.linked_profile().as_deref() == Some(profile.name.as_str()));
        }

        let live = fs::read(&self.canonical).map_err(|e| EngineError::io(&self.canonical, e))?;
        let saved = fs::read(&profile.path).map_err(|e| EngineError::io(&profile.path, e))?;
        if live == saved {
            return Ok(self.copies());
        }
        if !last_active {
            return Ok(false);
        }

        logi!("PROFILE", "keeping edits to {} in '{}'", self.canonical.display(), profile.name);
        fs::write(&profile.path, &live).map_err(|e| EngineError::io(&profile.path, e))?;
        Ok(self.copies())
    }

    /// In copy mode, push the canonical file's content back into the profile.
    pub fn sync_back(&self, profile: &Profile) -> Result<(), EngineError> {
        if !self.copies() || !self.canonical_is_file() {
            return Ok(());
        }
        fs::copy(&self.canonical, &profile.path)
            .map(|_| ())
            .map_err(|e| EngineError::io(&profile.path, e))
    }

    /// Create the first profile if there are none.
    ///
    /// An existing regular canonical file is the user's live document and seeds
    /// the profile; otherwise the bundled template does.
    pub fn bootstrap(&self, template: &Path) -> Result<Option<Profile>, EngineError> {
        if !self.list()?.is_empty() {
            return Ok(None);
        }
        let source = if self.canonical_is_file() { self.canonical.as_path() } else { template };
        if !source.is_file() {
            logw!("PROFILE", "no profiles and no template at {}", template.display());
            return Err(EngineError::NotFound { path: template.to_path_buf() });
        }
        self.create_from(source).map(Some)
    }
}

/// Names become file names; keep them to a single path component.
fn is_plain_name(name: &str) -> bool {
    !name.starts_with('.') && !name.contains(['/', '\\']) && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(mode: LinkMode) -> (tempfile::TempDir, ShaderPaths, ProfileManager) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ShaderPaths::new(dir.path());
        fs::write(paths.template(), "#define A_ENABLED 0\n#endif\n").unwrap();
        let manager = ProfileManager::new(&paths, mode);
        (dir, paths, manager)
    }

    #[test]
    fn list_is_empty_without_directory() {
        let (_dir, _paths, manager) = setup(LinkMode::Copy);
        assert!(manager.list().unwrap().is_empty());
    }

    #[test]
    fn create_gives_unique_names_and_copies_content() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let a = manager.create_from(paths.template()).unwrap();
        let b = manager.create_from(paths.template()).unwrap();
        assert_ne!(a.name, b.name);
        assert_eq!(fs::read_to_string(&a.path).unwrap(), fs::read_to_string(paths.template()).unwrap());

        let names: Vec<_> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn list_skips_other_extensions() {
        let (_dir, _paths, manager) = setup(LinkMode::Copy);
        fs::create_dir_all(manager.dir()).unwrap();
        fs::write(manager.dir().join("notes.txt"), "x").unwrap();
        fs::write(manager.path_for("b"), "x").unwrap();
        fs::write(manager.path_for("a"), "x").unwrap();
        let names: Vec<_> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn create_from_missing_source_fails() {
        let (dir, _paths, manager) = setup(LinkMode::Copy);
        let err = manager.create_from(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(manager.list().unwrap().is_empty());
    }

    #[test]
    fn rename_validation() {
        let (_dir, _paths, manager) = setup(LinkMode::Copy);
        fs::create_dir_all(manager.dir()).unwrap();
        fs::write(manager.path_for("day"), "day").unwrap();
        fs::write(manager.path_for("night"), "night").unwrap();

        assert!(matches!(manager.rename("day", ""), Err(EngineError::InvalidName { .. })));
        assert!(matches!(manager.rename("day", "day"), Err(EngineError::InvalidName { .. })));
        assert!(matches!(manager.rename("day", "../x"), Err(EngineError::InvalidName { .. })));
        assert!(matches!(manager.rename("day", "night"), Err(EngineError::NameConflict { .. })));
        assert!(matches!(manager.rename("ghost", "other"), Err(EngineError::NotFound { .. })));

        let renamed = manager.rename("day", "dawn").unwrap();
        assert_eq!(renamed.name, "dawn");
        assert_eq!(fs::read_to_string(&renamed.path).unwrap(), "day");
        assert!(manager.get("day").is_none());
    }

    #[test]
    fn delete_refuses_last_profile() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let only = manager.create_from(paths.template()).unwrap();

        let err = manager.delete(&only.name).unwrap_err();
        assert!(matches!(err, EngineError::LastProfile { .. }));
        assert_eq!(manager.list().unwrap().len(), 1);

        assert!(matches!(manager.delete(""), Err(EngineError::NoSelection)));
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let a = manager.create_from(paths.template()).unwrap();
        manager.create_from(paths.template()).unwrap();
        manager.delete(&a.name).unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);
        assert!(!a.path.exists());
    }

    #[test]
    fn copy_mode_links_by_copying() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let p = manager.create_from(paths.template()).unwrap();
        manager.link_canonical(&p).unwrap();
        assert_eq!(fs::read_to_string(paths.canonical()).unwrap(), fs::read_to_string(&p.path).unwrap());

        fs::write(paths.canonical(), "edited").unwrap();
        manager.sync_back(&p).unwrap();
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "edited");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_mode_points_canonical_at_profile() {
        let (_dir, paths, manager) = setup(LinkMode::Symlink);
        let p = manager.create_from(paths.template()).unwrap();
        manager.link_canonical(&p).unwrap();
        assert!(fs::symlink_metadata(paths.canonical()).unwrap().file_type().is_symlink());
        assert_eq!(manager.linked_profile().as_deref(), Some(p.name.as_str()));

        // Relinking replaces the old link.
        let q = manager.create_from(paths.template()).unwrap();
        manager.link_canonical(&q).unwrap();
        assert_eq!(manager.linked_profile().as_deref(), Some(q.name.as_str()));
    }

    #[test]
    fn copy_mode_adopts_edited_canonical_into_last_active() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let p = manager.create_from(paths.template()).unwrap();
        manager.link_canonical(&p).unwrap();
        assert!(manager.adopt_canonical(&p, false).unwrap());

        fs::write(paths.canonical(), "edited while closed").unwrap();
        // Not the profile it came from: leave both alone.
        assert!(!manager.adopt_canonical(&p, false).unwrap());
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "#define A_ENABLED 0\n#endif\n");

        assert!(manager.adopt_canonical(&p, true).unwrap());
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "edited while closed");
        assert_eq!(fs::read_to_string(paths.canonical()).unwrap(), "edited while closed");
    }

    #[test]
    fn missing_canonical_is_never_adopted() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let p = manager.create_from(paths.template()).unwrap();
        assert!(!manager.adopt_canonical(&p, true).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_mode_adopts_only_its_own_link() {
        let (_dir, paths, manager) = setup(LinkMode::Symlink);
        let p = manager.create_from(paths.template()).unwrap();
        let q = manager.create_from(paths.template()).unwrap();
        manager.link_canonical(&p).unwrap();
        assert!(manager.adopt_canonical(&p, true).unwrap());
        assert!(!manager.adopt_canonical(&q, false).unwrap());

        // A plain file in place of the link still gets relinked, edits kept.
        fs::remove_file(paths.canonical()).unwrap();
        fs::write(paths.canonical(), "plain file").unwrap();
        assert!(!manager.adopt_canonical(&p, true).unwrap());
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "plain file");
    }

    #[test]
    fn bootstrap_prefers_existing_canonical_file() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        fs::write(paths.canonical(), "live document").unwrap();
        let p = manager.bootstrap(paths.template()).unwrap().unwrap();
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "live document");
        assert!(manager.bootstrap(paths.template()).unwrap().is_none());
    }

    #[test]
    fn bootstrap_uses_template() {
        let (_dir, paths, manager) = setup(LinkMode::Copy);
        let p = manager.bootstrap(paths.template()).unwrap().unwrap();
        assert_eq!(fs::read_to_string(&p.path).unwrap(), "#define A_ENABLED 0\n#endif\n");
    }
}
