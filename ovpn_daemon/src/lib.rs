//! Daemon-side building blocks for the OpenVPN manager.
//!
//! The binary in `main.rs` wires these together: the [`dispatcher`] runs the
//! command loop over the pipes, consulting the [`profile_store`] for file
//! operations and the [`supervisor`] for the tunnel process.

pub mod dispatcher;
pub mod profile_store;
pub mod supervisor;
