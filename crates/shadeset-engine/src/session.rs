//! Engine façade: one live document, its profiles, and the persistence path.
//!
//! Every document operation follows the same pipeline: mutate the text value,
//! re-parse, and (when AutoSave is on) persist. Persisting detaches the
//! watcher, writes the whole buffer, reattaches, then pokes the renderer.
//!
//! Failures come back as `Err` and leave the in-memory document as it was.
//! Opening a session reuses the canonical file when it already shows the
//! active profile; only a real switch relinks it and pokes the renderer.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

use crate::config::{keys, EditorSettings, SettingsStore};
use crate::document::grammar::SHADER_PREFIX;
use crate::document::{mutation, SettingsDocument, ShaderView};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::paths::ShaderPaths;
use crate::profiles::{LinkMode, Profile, ProfileManager};
use crate::renderer::{RendererEndpoint, RendererNotifier};
use crate::watch::SettingsWatcher;
use crate::{logi, logw};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub link_mode: LinkMode,
    /// Attach a file watcher to the canonical path.
    pub watch: bool,
    pub renderer: RendererEndpoint,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            link_mode: LinkMode::platform_default(),
            watch: true,
            renderer: RendererEndpoint::from_env(),
        }
    }
}

pub struct Session {
    paths: ShaderPaths,
    store: Box<dyn SettingsStore>,
    profiles: ProfileManager,
    watcher: Option<SettingsWatcher>,
    renderer: RendererNotifier,
    document: SettingsDocument,
    view: ShaderView,
    active: Option<String>,
    dirty: bool,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl Session {
    /// Bootstrap profiles if needed, activate one, and load it.
    pub fn open(
        paths: ShaderPaths,
        store: Box<dyn SettingsStore>,
        options: SessionOptions,
    ) -> Result<Self, EngineError> {
        let watcher = if options.watch {
            Some(SettingsWatcher::new(paths.canonical())?)
        } else {
            None
        };

        let mut session = Self {
            profiles: ProfileManager::new(&paths, options.link_mode),
            renderer: RendererNotifier::new(options.renderer),
            paths,
            store,
            watcher,
            document: SettingsDocument::default(),
            view: ShaderView::default(),
            active: None,
            dirty: false,
            subscribers: Vec::new(),
        };

        let dir = session.paths.shader_dir().display().to_string();
        session.store_set(keys::SHADER_PATH, Value::from(dir));
        session.refresh_profiles()?;

        logi!(
            "SESSION",
            "opened {} (profile '{}')",
            session.paths.canonical().display(),
            session.active.as_deref().unwrap_or("-")
        );
        Ok(session)
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn view(&self) -> &ShaderView {
        &self.view
    }

    pub fn text(&self) -> &str {
        self.document.as_str()
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    pub fn paths(&self) -> &ShaderPaths {
        &self.paths
    }

    /// Unsaved changes in the buffer.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn settings(&self) -> EditorSettings {
        EditorSettings::from_store(self.store.as_ref())
    }

    // ---- document operations -------------------------------------------

    /// Flip a shader's enable directive. Unknown ids are ignored.
    pub fn toggle_shader(&mut self, id: &str) -> Result<bool, EngineError> {
        let id = qualified(id);
        let Some(block) = self.view.shader(&id) else {
            return Ok(false);
        };
        let next = mutation::toggle_shader(&self.document, &id, block.enabled);
        self.apply(next)
    }

    /// Write a new value into a visible setting.
    ///
    /// An invalid value is rejected: the buffer stays as it was, the view is
    /// re-derived from it, and `EditRejected` is emitted. Settings that are not
    /// shown (unknown, or inside a disabled block) are ignored.
    pub fn edit_setting(&mut self, name: &str, value: &str) -> Result<bool, EngineError> {
        if self.view.setting(name).is_none() {
            return Ok(false);
        }
        match mutation::edit_setting(&self.document, name, value) {
            Ok(next) => self.apply(next),
            Err(e) => {
                logw!("EDIT", "rejected {name} = '{value}'");
                self.view = self.document.parse();
                self.emit(EngineEvent::EditRejected {
                    name: name.to_string(),
                    value: value.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn move_shader_up(&mut self, name: &str) -> Result<bool, EngineError> {
        self.move_shader(name, -1)
    }

    pub fn move_shader_down(&mut self, name: &str) -> Result<bool, EngineError> {
        self.move_shader(name, 1)
    }

    fn move_shader(&mut self, name: &str, delta: isize) -> Result<bool, EngineError> {
        let name = name.strip_prefix(SHADER_PREFIX).unwrap_or(name);
        let Some(from) = self.view.order.iter().position(|n| n == name) else {
            return Ok(false);
        };
        let Some(to) = from.checked_add_signed(delta).filter(|to| *to < self.view.order.len()) else {
            return Ok(false);
        };
        let mut order = self.view.order.clone();
        order.swap(from, to);
        self.set_order(&order)
    }

    /// Regenerate the order block from `order`.
    pub fn set_order(&mut self, order: &[impl AsRef<str>]) -> Result<bool, EngineError> {
        let next = mutation::reorder(&self.document, order);
        self.apply(next)
    }

    /// Rewrite the whitelist line and mirror it into the store.
    pub fn update_whitelist(&mut self, text: &str) -> Result<bool, EngineError> {
        let (next, normalized) = mutation::update_whitelist(&self.document, text);
        let previous = self.store.get(keys::WHITELIST);
        self.store.set(keys::WHITELIST, Value::from(normalized))?;
        self.apply(next).inspect_err(|_| {
            self.store_set(keys::WHITELIST, previous.unwrap_or(Value::Null));
        })
    }

    fn apply(&mut self, next: SettingsDocument) -> Result<bool, EngineError> {
        if next == self.document {
            return Ok(false);
        }
        let previous = std::mem::replace(&mut self.document, next);
        let was_dirty = self.dirty;
        self.view = self.document.parse();
        self.dirty = true;

        if self.store.get_bool(keys::AUTO_SAVE) {
            if let Err(e) = self.save() {
                self.document = previous;
                self.view = self.document.parse();
                self.dirty = was_dirty;
                return Err(e);
            }
        }
        Ok(true)
    }

    /// Persist the buffer to the canonical file and notify the renderer.
    pub fn save(&mut self) -> Result<(), EngineError> {
        self.unwatch();
        let result = self.write_canonical();
        self.rewatch();
        result?;

        self.dirty = false;
        logi!("SAVE", "wrote {}", self.paths.canonical().display());
        self.emit(EngineEvent::DocumentSaved { path: self.paths.canonical().to_path_buf() });
        self.notify_renderer();
        Ok(())
    }

    fn write_canonical(&self) -> Result<(), EngineError> {
        self.document.write_to(self.paths.canonical())?;
        if let Some(profile) = self.active_profile_entry() {
            self.profiles.sync_back(&profile)?;
        }
        Ok(())
    }

    /// Re-read the canonical file, discarding unsaved changes.
    pub fn reload(&mut self) -> Result<(), EngineError> {
        self.document = SettingsDocument::load(self.paths.canonical())?;
        self.view = self.document.parse();
        self.dirty = false;
        logi!("LOAD", "read {}", self.paths.canonical().display());
        self.emit(EngineEvent::DocumentLoaded { path: self.paths.canonical().to_path_buf() });
        Ok(())
    }

    /// Reload if the canonical file changed behind our back.
    pub fn poll_external_changes(&mut self) -> Result<bool, EngineError> {
        let changed = self.watcher.as_mut().is_some_and(|w| w.poll());
        if changed {
            self.reconcile()?;
        }
        Ok(changed)
    }

    /// Like [`poll_external_changes`](Self::poll_external_changes), blocking up to `timeout`.
    pub fn wait_external_change(&mut self, timeout: Duration) -> Result<bool, EngineError> {
        let changed = self.watcher.as_mut().is_some_and(|w| w.wait(timeout));
        if changed {
            self.reconcile()?;
        }
        Ok(changed)
    }

    fn reconcile(&mut self) -> Result<(), EngineError> {
        logi!("WATCH", "external change to {}", self.paths.canonical().display());
        self.reload()?;
        if let Some(profile) = self.active_profile_entry() {
            self.profiles.sync_back(&profile)?;
        }
        self.emit(EngineEvent::ExternalChange { path: self.paths.canonical().to_path_buf() });
        Ok(())
    }

    // ---- profiles --------------------------------------------------------

    pub fn profiles(&self) -> Result<Vec<Profile>, EngineError> {
        self.profiles.list()
    }

    pub fn active_profile(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn active_profile_entry(&self) -> Option<Profile> {
        self.active.as_deref().and_then(|name| self.profiles.get(name))
    }

    /// New profile seeded from the template.
    pub fn create_profile(&mut self) -> Result<Profile, EngineError> {
        let profile = self.profiles.create_from(self.paths.template())?;
        self.emit(EngineEvent::ProfilesChanged);
        Ok(profile)
    }

    /// New profile seeded from an existing one.
    pub fn copy_profile(&mut self, name: &str) -> Result<Profile, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::NoSelection);
        }
        let profile = self.profiles.copy(name)?;
        self.emit(EngineEvent::ProfilesChanged);
        Ok(profile)
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<Profile, EngineError> {
        if old.trim().is_empty() {
            return Err(EngineError::NoSelection);
        }
        let was_active = self.active.as_deref() == Some(old);
        if was_active && self.dirty {
            // Unsaved edits belong to the profile being renamed.
            self.save()?;
        }

        let profile = self.profiles.rename(old, new)?;
        self.emit(EngineEvent::ProfilesChanged);
        if was_active {
            self.activate_profile(&profile.name)?;
        }
        Ok(profile)
    }

    /// Delete a profile. Deleting the active one activates another.
    pub fn delete_profile(&mut self, name: &str) -> Result<(), EngineError> {
        self.profiles.delete(name)?;
        self.emit(EngineEvent::ProfilesChanged);
        if self.active.as_deref() == Some(name) {
            self.active = None;
            self.refresh_profiles()?;
        }
        Ok(())
    }

    /// Point the canonical path at `name` and load it.
    pub fn activate_profile(&mut self, name: &str) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::NoSelection);
        }
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| EngineError::NotFound { path: self.profiles.path_for(name) })?;

        self.unwatch();
        let loaded = self
            .profiles
            .link_canonical(&profile)
            .and_then(|_| SettingsDocument::load(self.paths.canonical()));
        self.rewatch();
        let document = loaded?;

        self.document = document;
        self.view = self.document.parse();
        self.dirty = false;
        self.active = Some(profile.name.clone());
        self.store_set(keys::ACTIVE_PROFILE, Value::from(profile.name.clone()));

        logi!("PROFILE", "activated '{}'", profile.name);
        self.emit(EngineEvent::ProfileActivated { name: profile.name });
        self.emit(EngineEvent::DocumentLoaded { path: self.paths.canonical().to_path_buf() });
        self.notify_renderer();
        Ok(())
    }

    /// Make sure a profile exists and one is active.
    ///
    /// Keeps the current profile if it still exists, else the stored one, else
    /// the first by name.
    fn refresh_profiles(&mut self) -> Result<(), EngineError> {
        if self.profiles.bootstrap(self.paths.template())?.is_some() {
            self.emit(EngineEvent::ProfilesChanged);
        }
        let list = self.profiles.list()?;
        let exists = |name: &str| list.iter().any(|p| p.name == name);

        let stored = self.store.get_string(keys::ACTIVE_PROFILE);
        let target = self
            .active
            .clone()
            .filter(|n| exists(n))
            .or_else(|| stored.filter(|n| exists(n)))
            .or_else(|| list.first().map(|p| p.name.clone()))
            .ok_or_else(|| EngineError::NotFound { path: self.profiles.dir().to_path_buf() })?;

        if self.active.as_deref() == Some(target.as_str()) {
            return Ok(());
        }
        if self.active.is_none() {
            let last_active = self.store.get_string(keys::ACTIVE_PROFILE).as_deref() == Some(target.as_str());
            if let Some(profile) = self.profiles.get(&target) {
                if self.profiles.adopt_canonical(&profile, last_active)? {
                    return self.attach_profile(profile);
                }
            }
        }
        self.activate_profile(&target)
    }

    /// Take over a canonical path that already shows `profile`: load it, no relink.
    fn attach_profile(&mut self, profile: Profile) -> Result<(), EngineError> {
        let document = SettingsDocument::load(self.paths.canonical())?;
        self.document = document;
        self.view = self.document.parse();
        self.dirty = false;
        self.active = Some(profile.name.clone());
        self.store_set(keys::ACTIVE_PROFILE, Value::from(profile.name.clone()));
        self.rewatch();

        logi!("PROFILE", "using '{}'", profile.name);
        self.emit(EngineEvent::ProfileActivated { name: profile.name });
        self.emit(EngineEvent::DocumentLoaded { path: self.paths.canonical().to_path_buf() });
        Ok(())
    }

    // ---- store flags -----------------------------------------------------

    pub fn set_auto_save(&mut self, on: bool) -> Result<(), EngineError> {
        self.store.set(keys::AUTO_SAVE, Value::Bool(on))
    }

    pub fn set_default_enabled(&mut self, on: bool) -> Result<(), EngineError> {
        self.store.set(keys::DEFAULT_ENABLED, Value::Bool(on))
    }

    /// Store the blacklist, flattened the same way as the whitelist.
    pub fn set_blacklist(&mut self, text: &str) -> Result<String, EngineError> {
        let normalized = mutation::normalize_list(text);
        self.store.set(keys::BLACKLIST, Value::from(normalized.clone()))?;
        Ok(normalized)
    }

    // ---- plumbing --------------------------------------------------------

    fn unwatch(&mut self) {
        if let Some(w) = self.watcher.as_mut() {
            w.unwatch();
        }
    }

    fn rewatch(&mut self) {
        if let Some(w) = self.watcher.as_mut() {
            if let Err(e) = w.watch() {
                logw!("WATCH", "{e}");
            }
        }
    }

    fn notify_renderer(&mut self) {
        let delivered = self.renderer.notify();
        logi!("RENDER", "reload signal {}", if delivered { "delivered" } else { "not delivered (no listener)" });
        self.emit(EngineEvent::RendererNotified { delivered });
    }

    /// Store writes that are bookkeeping only; a failure is logged, not fatal.
    fn store_set(&mut self, key: &str, value: Value) {
        if let Err(e) = self.store.set(key, value) {
            logw!("CONFIG", "could not persist {key}: {e}");
        }
    }

    fn emit(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Accept `FOO` as well as `SHADER_FOO`.
fn qualified(id: &str) -> String {
    if id.starts_with(SHADER_PREFIX) {
        id.to_string()
    } else {
        format!("{SHADER_PREFIX}{id}")
    }
}
