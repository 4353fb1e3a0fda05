//! OpenVPN Manager IPC Protocol Library
//!
//! This crate defines the wire vocabulary and the named-pipe transport used
//! for communication between the control client (`ovpnctl`) and the
//! privileged manager daemon (`ovpn_daemon`).

pub mod messages;
pub mod transport;

/// Re-export common types for convenience
pub use messages::{Ack, Command, ErrorReply, Prompt, CONTINUE};
pub use transport::{ClientEndpoint, IpcError, IpcResult, PipePair, ServerEndpoint};
