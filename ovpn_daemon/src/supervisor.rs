//! Connection Supervisor
//!
//! Owns the tunnel child process. Active/inactive is daemon-tracked state
//! only: the supervisor never polls the OS for liveness, so a tunnel that
//! exits on its own still reads as connected until DISCONNECT or shutdown.

use std::io;
use std::path::Path;
use std::process::{Child, Command};

use thiserror::Error;
use tracing::{info, warn};

/// Result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[derive(Error, Debug)]
pub enum SupervisorError {
    /// CONNECT while a tunnel process is already held
    #[error("a connection is already active")]
    AlreadyActive,

    /// DISCONNECT with no tunnel process held
    #[error("no connection is active")]
    NotActive,

    /// The tunnel program could not be started
    #[error("failed to spawn '{program}': {source}")]
    Spawn { program: String, source: io::Error },
}

/// Tunnel process state. Holding the child handle inside the active variant
/// keeps "handle present" and "connection active" a single fact.
enum TunnelState {
    Disconnected,
    Connected(Child),
}

pub struct Supervisor {
    program: String,
    state: TunnelState,
}

impl Supervisor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            state: TunnelState::Disconnected,
        }
    }

    /// Whether a tunnel process is held, as tracked by the daemon.
    pub fn is_active(&self) -> bool {
        matches!(self.state, TunnelState::Connected(_))
    }

    /// Spawn the tunnel program with `config_path` as its only argument.
    pub fn connect(&mut self, config_path: &Path) -> SupervisorResult<()> {
        if self.is_active() {
            return Err(SupervisorError::AlreadyActive);
        }
        let child = Command::new(&self.program)
            .arg(config_path)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        info!("spawned tunnel process '{}' (pid {})", self.program, child.id());
        self.state = TunnelState::Connected(child);
        Ok(())
    }

    /// Force-kill the tunnel process and drop the handle.
    pub fn disconnect(&mut self) -> SupervisorResult<()> {
        match std::mem::replace(&mut self.state, TunnelState::Disconnected) {
            TunnelState::Disconnected => Err(SupervisorError::NotActive),
            TunnelState::Connected(child) => {
                kill_and_reap(child);
                info!("tunnel process killed");
                Ok(())
            }
        }
    }

    /// Unconditional cleanup for daemon shutdown; being inactive is not an
    /// error here.
    pub fn shutdown(&mut self) {
        if let TunnelState::Connected(child) =
            std::mem::replace(&mut self.state, TunnelState::Disconnected)
        {
            info!("killing still-active tunnel process");
            kill_and_reap(child);
        }
    }
}

fn kill_and_reap(mut child: Child) {
    if let Err(e) = child.kill() {
        warn!("failed to kill tunnel process: {e}");
    }
    // Reap so the pid does not linger as a zombie.
    if let Err(e) = child.wait() {
        warn!("failed to reap tunnel process: {e}");
    }
}
