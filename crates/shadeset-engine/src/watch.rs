//! Change watcher for the canonical settings file.
//!
//! We watch the **parent directories** of the canonical path and of the file
//! it resolves to, not the files themselves. Activating a profile replaces the
//! canonical link, and many editors save with write temp → rename, both of
//! which drop a per-file watch.
//!
//! The session detaches the watcher around its own writes
//! ([`SettingsWatcher::unwatch`] / [`SettingsWatcher::watch`]), so only
//! external edits ever come out of [`SettingsWatcher::poll`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::EngineError;
use crate::logw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Unwatched,
    Watched,
}

pub struct SettingsWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<PathBuf>,
    path: PathBuf,
    targets: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    state: WatchState,
}

impl SettingsWatcher {
    /// Create a detached watcher for `path`. Call [`watch`](Self::watch) to attach.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let (tx, rx) = unbounded::<PathBuf>();

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(ev) = res {
                    if !is_content_change(&ev.kind) {
                        return;
                    }
                    for p in ev.paths {
                        let _ = tx.send(p);
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_millis(250)),
        )
        .map_err(|e| EngineError::Watch { path: path.clone(), source: e })?;

        Ok(Self {
            watcher,
            rx,
            path,
            targets: Vec::new(),
            dirs: Vec::new(),
            state: WatchState::Unwatched,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Attach. Re-resolves the link target, so call this again after the
    /// canonical path is re-pointed.
    pub fn watch(&mut self) -> Result<(), EngineError> {
        if self.state == WatchState::Watched {
            return Ok(());
        }

        let mut targets = vec![self.path.clone()];
        if let Ok(resolved) = fs::canonicalize(&self.path) {
            if resolved != self.path {
                targets.push(resolved);
            }
        }

        let mut dirs: Vec<PathBuf> = Vec::new();
        for target in &targets {
            let parent = target
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            if !dirs.contains(&parent) {
                dirs.push(parent);
            }
        }

        for (i, dir) in dirs.iter().enumerate() {
            if let Err(e) = self.watcher.watch(dir, RecursiveMode::NonRecursive) {
                for attached in &dirs[..i] {
                    let _ = self.watcher.unwatch(attached);
                }
                return Err(EngineError::Watch { path: dir.clone(), source: e });
            }
        }

        self.drain();
        self.targets = targets;
        self.dirs = dirs;
        self.state = WatchState::Watched;
        Ok(())
    }

    /// Detach and throw away anything already queued.
    pub fn unwatch(&mut self) {
        if self.state == WatchState::Unwatched {
            return;
        }
        for dir in self.dirs.drain(..) {
            if let Err(e) = self.watcher.unwatch(&dir) {
                logw!("WATCH", "unwatch {} failed: {e}", dir.display());
            }
        }
        self.drain();
        self.state = WatchState::Unwatched;
    }

    /// True if a watched path changed since the last call.
    ///
    /// Bursts of events collapse into one; the caller re-reads the file, so the
    /// latest content always wins.
    pub fn poll(&mut self) -> bool {
        if self.state == WatchState::Unwatched {
            self.drain();
            return false;
        }
        let mut changed = false;
        while let Ok(p) = self.rx.try_recv() {
            changed |= self.is_target(&p);
        }
        changed
    }

    /// Block until a watched path changes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.state == WatchState::Unwatched {
            return false;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(p) if self.is_target(&p) => {
                    // Whatever else is queued is part of the same change.
                    self.drain();
                    return true;
                }
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }

    fn is_target(&self, p: &Path) -> bool {
        self.targets.iter().any(|t| t == p)
    }

    fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

/// Reads and metadata-only events are noise; a closed writer is a change.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}
