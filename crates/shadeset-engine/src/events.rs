use std::path::PathBuf;

/// Notifications for the presentation layer.
///
/// Delivered over `Session::subscribe` channels; the view itself is always read
/// back from the session, events only say *what* changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The canonical file was (re)read into the document.
    DocumentLoaded { path: PathBuf },

    /// The document was written to the canonical file.
    DocumentSaved { path: PathBuf },

    /// The canonical file changed on disk while watched and was re-parsed.
    ExternalChange { path: PathBuf },

    /// A setting edit failed validation; the view reverts to the stored value.
    EditRejected { name: String, value: String },

    /// The canonical path now points at this profile.
    ProfileActivated { name: String },

    /// Profiles were created, renamed or deleted.
    ProfilesChanged,

    /// Result of the best-effort "reload now" signal.
    RendererNotified { delivered: bool },
}
