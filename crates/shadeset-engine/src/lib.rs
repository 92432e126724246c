//! Shader settings document engine.
//!
//! Parses and surgically rewrites the `1_settings.glsl` document read by the
//! shader renderer, manages named profiles of it, and keeps the canonical file,
//! the file watcher and the renderer in step.

pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod instance;
pub mod logging;
pub mod paths;
pub mod profiles;
pub mod renderer;
pub mod session;
pub mod watch;

pub use config::{EditorSettings, JsonSettingsStore, MemoryStore, SettingsStore};
pub use document::{Row, Setting, SettingsDocument, ShaderBlock, ShaderView, Tooltip, ValueKind};
pub use error::EngineError;
pub use events::EngineEvent;
pub use instance::InstanceGuard;
pub use paths::ShaderPaths;
pub use profiles::{LinkMode, Profile};
pub use renderer::RendererEndpoint;
pub use session::{Session, SessionOptions};
