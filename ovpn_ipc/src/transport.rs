//! Named-Pipe Transport
//!
//! Two unidirectional FIFOs at well-known paths carry the protocol: the
//! request pipe (client to daemon) and the response pipe (daemon to client).
//! Each message is one open-write-close cycle paired with one
//! open-read-close cycle on the other side; the opens rendezvous, so a send
//! does not return until the peer has taken the message. Messages are a
//! single line of text, newline-terminated on send and trimmed on receive.
//!
//! There is no timeout at this layer: a counterpart that never connects
//! blocks the call indefinitely.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use thiserror::Error;
use tracing::{debug, info};

/// Well-known name of the client-to-daemon pipe.
pub const REQUEST_PIPE_NAME: &str = "ovpn-mngr-server.pipe";

/// Well-known name of the daemon-to-client pipe.
pub const RESPONSE_PIPE_NAME: &str = "ovpn-mngr-client.pipe";

// Request pipe: root and group read/write, world write-only.
// Response pipe: root and group read/write, world read-only.
const REQUEST_PIPE_MODE: u32 = 0o662;
const RESPONSE_PIPE_MODE: u32 = 0o664;

/// Result type for transport operations
pub type IpcResult<T> = Result<T, IpcError>;

/// Error type for transport operations. Transport failures are a distinct
/// class from per-command protocol errors: the daemon treats them as fatal,
/// while `ERROR:*` replies keep its command loop alive.
#[derive(Error, Debug)]
pub enum IpcError {
    /// I/O error on an open pipe
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Pipe creation or teardown failed
    #[error("pipe setup error: {0}")]
    Setup(String),

    /// The counterpart endpoint is not available
    #[error("connection error: {0}")]
    Connection(String),
}

/// Filesystem locations of the two pipes.
#[derive(Debug, Clone)]
pub struct PipePair {
    /// Client-to-daemon pipe
    pub request: PathBuf,
    /// Daemon-to-client pipe
    pub response: PathBuf,
}

impl PipePair {
    /// Pipe pair at the well-known names inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            request: dir.as_ref().join(REQUEST_PIPE_NAME),
            response: dir.as_ref().join(RESPONSE_PIPE_NAME),
        }
    }
}

/// Daemon-side endpoint.
///
/// Creating it claims the pipe paths: stale pipes from a previous run are
/// removed and both FIFOs are created fresh with their permission masks.
/// Dropping the endpoint removes the pipe files again as a backstop for
/// unclean exits; orderly shutdown goes through [`ServerEndpoint::remove_pipes`].
pub struct ServerEndpoint {
    pipes: PipePair,
}

impl ServerEndpoint {
    pub fn create(pipes: PipePair) -> IpcResult<Self> {
        let endpoints = [
            (&pipes.request, REQUEST_PIPE_MODE),
            (&pipes.response, RESPONSE_PIPE_MODE),
        ];
        for (path, mode) in endpoints {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| {
                    IpcError::Setup(format!(
                        "failed to remove stale pipe {}: {e}",
                        path.display()
                    ))
                })?;
                info!("removed stale pipe: {}", path.display());
            }
            mkfifo(path.as_path(), Mode::from_bits_truncate(mode)).map_err(|e| {
                IpcError::Setup(format!("failed to create pipe {}: {e}", path.display()))
            })?;
            // mkfifo modes pass through the umask; set the final bits explicitly.
            let metadata = std::fs::metadata(path)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(mode);
            std::fs::set_permissions(path, permissions)?;
            info!("pipe created: {}", path.display());
        }
        Ok(Self { pipes })
    }

    /// Receive one message from the client. Blocks until a writer connects
    /// and closes its end of the request pipe.
    pub fn receive(&self) -> IpcResult<String> {
        read_message(&self.pipes.request)
    }

    /// Send one message to the client. Blocks until a reader has taken it.
    pub fn send(&self, message: impl AsRef<str>) -> IpcResult<()> {
        write_message(&self.pipes.response, message.as_ref())
    }

    /// Remove both pipe files. Part of orderly daemon shutdown.
    pub fn remove_pipes(&self) -> IpcResult<()> {
        for path in [&self.pipes.request, &self.pipes.response] {
            std::fs::remove_file(path).map_err(|e| {
                IpcError::Setup(format!("failed to remove pipe {}: {e}", path.display()))
            })?;
            info!("removed pipe: {}", path.display());
        }
        Ok(())
    }
}

impl Drop for ServerEndpoint {
    fn drop(&mut self) {
        // Clean up the pipe files; they may already be gone after an
        // orderly shutdown.
        let _ = std::fs::remove_file(&self.pipes.request);
        let _ = std::fs::remove_file(&self.pipes.response);
    }
}

/// Client-side endpoint. Opening it verifies that both pipes exist, which is
/// the only liveness signal a client gets before its first send blocks.
#[derive(Debug)]
pub struct ClientEndpoint {
    pipes: PipePair,
}

impl ClientEndpoint {
    pub fn open(pipes: PipePair) -> IpcResult<Self> {
        for path in [&pipes.request, &pipes.response] {
            if !path.exists() {
                return Err(IpcError::Connection(format!(
                    "pipe {} does not exist; the manager daemon does not appear to be running",
                    path.display()
                )));
            }
        }
        Ok(Self { pipes })
    }

    /// Send one message to the daemon. Blocks until the daemon reads it.
    pub fn send(&self, message: impl AsRef<str>) -> IpcResult<()> {
        write_message(&self.pipes.request, message.as_ref())
    }

    /// Receive one message from the daemon. Blocks until one arrives.
    pub fn receive(&self) -> IpcResult<String> {
        read_message(&self.pipes.response)
    }
}

fn write_message(path: &Path, message: &str) -> IpcResult<()> {
    let mut pipe = OpenOptions::new().write(true).open(path)?;
    pipe.write_all(message.as_bytes())?;
    pipe.write_all(b"\n")?;
    debug!("> '{message}'");
    Ok(())
}

fn read_message(path: &Path) -> IpcResult<String> {
    let mut raw = String::new();
    File::open(path)?.read_to_string(&mut raw)?;
    let message = raw.trim().to_string();
    debug!("< '{message}'");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn round_trip_over_fifos() {
        let dir = tempfile::tempdir().unwrap();
        let pipes = PipePair::in_dir(dir.path());
        let server = ServerEndpoint::create(pipes.clone()).unwrap();

        let client_thread = thread::spawn(move || {
            let client = ClientEndpoint::open(pipes).unwrap();
            client.send("STATUS").unwrap();
            client.receive().unwrap()
        });

        assert_eq!(server.receive().unwrap(), "STATUS");
        server.send("DISCONNECTED").unwrap();
        assert_eq!(client_thread.join().unwrap(), "DISCONNECTED");
    }

    #[test]
    fn received_messages_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let pipes = PipePair::in_dir(dir.path());
        let server = ServerEndpoint::create(pipes.clone()).unwrap();

        let client_thread = thread::spawn(move || {
            let client = ClientEndpoint::open(pipes).unwrap();
            client.send("  CONNECT \t").unwrap();
        });

        assert_eq!(server.receive().unwrap(), "CONNECT");
        client_thread.join().unwrap();
    }

    #[test]
    fn pipes_carry_fixed_permission_bits() {
        let dir = tempfile::tempdir().unwrap();
        let pipes = PipePair::in_dir(dir.path());
        let _server = ServerEndpoint::create(pipes.clone()).unwrap();

        let request_mode = std::fs::metadata(&pipes.request).unwrap().permissions().mode();
        let response_mode = std::fs::metadata(&pipes.response).unwrap().permissions().mode();
        assert_eq!(request_mode & 0o777, 0o662);
        assert_eq!(response_mode & 0o777, 0o664);
    }

    #[test]
    fn stale_pipes_are_replaced_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let pipes = PipePair::in_dir(dir.path());

        // a leftover regular file where the pipe belongs
        std::fs::write(&pipes.request, b"stale").unwrap();

        let server = ServerEndpoint::create(pipes.clone()).unwrap();
        assert!(pipes.request.exists());
        assert!(pipes.response.exists());

        drop(server);
        assert!(!pipes.request.exists());
        assert!(!pipes.response.exists());
    }

    #[test]
    fn client_open_fails_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let pipes = PipePair::in_dir(dir.path());
        match ClientEndpoint::open(pipes) {
            Err(IpcError::Connection(_)) => {}
            other => panic!("expected a connection error, got {other:?}"),
        }
    }
}
