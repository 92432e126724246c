use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum EngineError {
    /// A template, profile, canonical file or shader directory does not exist.
    NotFound { path: PathBuf },
    /// I/O error reading or writing a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for the settings store.
    Json { path: PathBuf, source: serde_json::Error },

    /// A proposed setting value failed its literal grammar.
    InvalidValue { name: String, value: String },

    /// Profile name is empty, unchanged, or not a plain file name.
    InvalidName { name: String },
    /// Profile name collides with an existing profile.
    NameConflict { name: String },
    /// Refused: deleting would leave zero profiles.
    LastProfile { name: String },
    /// Operation needs a selected profile and none was given.
    NoSelection,

    /// The file watcher could not be created or (re)attached.
    Watch { path: PathBuf, source: notify::Error },

    /// Another editor instance holds the instance segment.
    AlreadyRunning { pid: u32 },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound { path }
        } else {
            EngineError::Io { path, source }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { path } => write!(f, "Not found: {}", path.display()),
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::InvalidValue { name, value } => {
                write!(f, "Rejected value '{value}' for setting {name}")
            }
            EngineError::InvalidName { name } => write!(f, "Invalid profile name '{name}'"),
            EngineError::NameConflict { name } => write!(f, "Profile '{name}' already exists"),
            EngineError::LastProfile { name } => {
                write!(f, "Refusing to delete '{name}': it is the only profile")
            }
            EngineError::NoSelection => write!(f, "No profile selected"),
            EngineError::Watch { path, source } => {
                write!(f, "Watch error for {}: {}", path.display(), source)
            }
            EngineError::AlreadyRunning { pid } => {
                write!(f, "Another instance is already running (pid {pid})")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            EngineError::Watch { source, .. } => Some(source),
            _ => None,
        }
    }
}
