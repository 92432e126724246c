//! "Reload now" signal to the renderer.
//!
//! The renderer listens on a local socket; a connection attempt alone tells it
//! to re-read its settings. Nothing is sent. Delivery is best-effort: an
//! absent renderer is normal and never an error.

use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use crate::logw;

/// Overrides the endpoint: a socket path, `tcp:<host:port>`, or `off`.
pub const RENDERER_SOCKET_ENV: &str = "SHADESET_RENDERER_SOCKET";

pub const RENDERER_SOCKET_NAME: &str = "shadeset-renderer.sock";

pub const NOTIFY_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEndpoint {
    #[cfg(unix)]
    Unix(PathBuf),
    Tcp(SocketAddr),
    Disabled,
}

impl RendererEndpoint {
    /// Endpoint from `SHADESET_RENDERER_SOCKET`, falling back to the socket in
    /// the runtime dir.
    pub fn from_env() -> Self {
        match std::env::var(RENDERER_SOCKET_ENV) {
            Ok(v) if !v.trim().is_empty() => Self::parse(v.trim()),
            _ => Self::default_local(),
        }
    }

    pub fn parse(spec: &str) -> Self {
        if spec.eq_ignore_ascii_case("off") {
            return RendererEndpoint::Disabled;
        }
        if let Some(addr) = spec.strip_prefix("tcp:") {
            return match addr.parse() {
                Ok(addr) => RendererEndpoint::Tcp(addr),
                Err(_) => {
                    logw!("RENDER", "bad renderer address '{addr}'; notifications off");
                    RendererEndpoint::Disabled
                }
            };
        }
        Self::local(PathBuf::from(spec))
    }

    fn default_local() -> Self {
        let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        Self::local(dir.join(RENDERER_SOCKET_NAME))
    }

    #[cfg(unix)]
    fn local(path: PathBuf) -> Self {
        RendererEndpoint::Unix(path)
    }

    #[cfg(not(unix))]
    fn local(path: PathBuf) -> Self {
        logw!("RENDER", "local sockets unsupported here ({}); notifications off", path.display());
        RendererEndpoint::Disabled
    }
}

#[derive(Debug, Clone)]
pub struct RendererNotifier {
    endpoint: RendererEndpoint,
    timeout: Duration,
}

impl RendererNotifier {
    pub fn new(endpoint: RendererEndpoint) -> Self {
        Self { endpoint, timeout: NOTIFY_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &RendererEndpoint {
        &self.endpoint
    }

    /// Connect, then disconnect. Returns whether anyone was listening.
    pub fn notify(&self) -> bool {
        match &self.endpoint {
            #[cfg(unix)]
            RendererEndpoint::Unix(path) => {
                use std::os::unix::net::UnixStream;
                // Unix sockets have no connect timeout; a full backlog would block.
                let path = path.clone();
                within(self.timeout, move || match UnixStream::connect(&path) {
                    Ok(stream) => {
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        true
                    }
                    Err(_) => false,
                })
            }
            RendererEndpoint::Tcp(addr) => match TcpStream::connect_timeout(addr, self.timeout) {
                Ok(stream) => {
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    true
                }
                Err(_) => false,
            },
            RendererEndpoint::Disabled => false,
        }
    }
}

/// Run `attempt` on a helper thread and give up after `timeout`.
///
/// A late attempt finishes in the background; its result is dropped.
#[cfg(unix)]
fn within(timeout: Duration, attempt: impl FnOnce() -> bool + Send + 'static) -> bool {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let spawned = std::thread::Builder::new()
        .name("renderer-notify".into())
        .spawn(move || {
            let _ = tx.send(attempt());
        });
    if let Err(e) = spawned {
        logw!("RENDER", "could not start notifier thread: {e}");
        return false;
    }
    match rx.recv_timeout(timeout) {
        Ok(delivered) => delivered,
        Err(_) => {
            logw!("RENDER", "renderer did not accept within {timeout:?}");
            false
        }
    }
}
