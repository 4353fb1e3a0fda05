//! Command Dispatcher
//!
//! The daemon's request loop: receive one command token, run its handler to
//! completion (including any nested prompt round-trips), send the terminal
//! response, loop. The dispatcher owns the turn discipline: exactly one
//! client message is outstanding at any point, and a handler always answers
//! before the loop reads the next command.
//!
//! Per-command failures answer on the wire and keep the loop alive; only
//! transport failures (and store-level I/O breakage) are fatal. TERMINATE is
//! the sole way out.

use std::path::PathBuf;

use anyhow::Context;
use ovpn_ipc::messages::{Ack, Command, ErrorReply, Prompt, CONTINUE};
use ovpn_ipc::transport::ServerEndpoint;
use tracing::{error, info, warn};

use crate::profile_store::{ProfileStore, StoreError};
use crate::supervisor::{Supervisor, SupervisorError};

pub struct Dispatcher {
    endpoint: ServerEndpoint,
    store: ProfileStore,
    supervisor: Supervisor,
}

impl Dispatcher {
    pub fn new(endpoint: ServerEndpoint, store: ProfileStore, supervisor: Supervisor) -> Self {
        Self {
            endpoint,
            store,
            supervisor,
        }
    }

    /// Run the command loop until TERMINATE.
    pub fn run(mut self) -> anyhow::Result<()> {
        loop {
            let token = self
                .endpoint
                .receive()
                .context("failed to read the next command")?;
            info!("command received: '{token}'");

            let Some(command) = Command::parse(&token) else {
                warn!("command '{token}' not supported");
                self.endpoint.send(ErrorReply::InvalidCommand.as_token())?;
                continue;
            };

            match command {
                Command::Terminate => {
                    self.terminate()?;
                    return Ok(());
                }
                Command::Status => self.status()?,
                Command::Available => self.available()?,
                Command::Upload => self.upload()?,
                Command::Delete => self.delete()?,
                Command::Current => self.current()?,
                Command::Select => self.select()?,
                Command::Connect => self.connect()?,
                Command::Disconnect => self.disconnect()?,
            }
        }
    }

    fn terminate(&mut self) -> anyhow::Result<()> {
        info!("#### client requested termination of the daemon");
        self.supervisor.shutdown();
        // Answer before tearing the pipes down, so the client's final
        // receive cannot race their removal.
        self.endpoint.send(Ack::Terminated.as_token())?;
        self.endpoint.remove_pipes()?;
        info!("daemon terminated");
        Ok(())
    }

    fn status(&mut self) -> anyhow::Result<()> {
        info!("#### client queried status of the connection");
        let ack = if self.supervisor.is_active() {
            Ack::Connected
        } else {
            Ack::Disconnected
        };
        self.endpoint.send(ack.as_token())?;
        Ok(())
    }

    fn available(&mut self) -> anyhow::Result<()> {
        info!("#### client requested a listing of stored profiles");
        let names = self.store.list().context("failed to list profiles")?;
        self.endpoint.send(names.len().to_string())?;
        for name in names {
            let reply = self.endpoint.receive()?;
            if reply != CONTINUE {
                info!("listing aborted by client with '{reply}'");
                return Ok(());
            }
            self.endpoint.send(&name)?;
        }
        info!("listing done");
        Ok(())
    }

    fn upload(&mut self) -> anyhow::Result<()> {
        info!("#### client requested a profile upload");
        self.endpoint.send(Prompt::Path.as_token())?;
        let source = PathBuf::from(self.endpoint.receive()?);
        // The source is judged before the name is solicited.
        if let Err(err) = self.store.validate_source(&source) {
            warn!("upload rejected: {err}");
            return self.send_store_error(err);
        }
        self.endpoint.send(Prompt::NewName.as_token())?;
        let desired_name = self.endpoint.receive()?;
        match self.store.add(&source, &desired_name) {
            Ok(name) => {
                info!("profile '{name}' stored");
                self.endpoint.send(Ack::Success.as_token())?;
            }
            Err(err) => {
                warn!("upload rejected: {err}");
                self.send_store_error(err)?;
            }
        }
        Ok(())
    }

    fn delete(&mut self) -> anyhow::Result<()> {
        info!("#### client requested a profile deletion");
        self.endpoint.send(Prompt::Name.as_token())?;
        let name = self.endpoint.receive()?;
        match self.store.remove(&name) {
            Ok(name) => {
                info!("profile '{name}' deleted");
                self.endpoint.send(Ack::Success.as_token())?;
            }
            Err(err) => {
                warn!("deletion rejected: {err}");
                self.send_store_error(err)?;
            }
        }
        Ok(())
    }

    fn current(&mut self) -> anyhow::Result<()> {
        info!("#### client queried the selected profile");
        match self.store.resolve_current() {
            Ok(name) => {
                info!("currently selected profile: '{name}'");
                self.endpoint.send(&name)?;
            }
            Err(err) => {
                warn!("no usable selection: {err}");
                self.send_store_error(err)?;
            }
        }
        Ok(())
    }

    fn select(&mut self) -> anyhow::Result<()> {
        info!("#### client requested to change the selected profile");
        self.endpoint.send(Prompt::Name.as_token())?;
        let name = self.endpoint.receive()?;
        match self.store.select(&name) {
            Ok(name) => {
                info!("selection now points at '{name}'");
                self.endpoint.send(Ack::Success.as_token())?;
            }
            Err(err) => {
                warn!("selection rejected: {err}");
                self.send_store_error(err)?;
            }
        }
        Ok(())
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        info!("#### client requested tunnel activation");
        // Same selection policy as CURRENT: a missing or dangling pointer
        // means there is nothing to connect to.
        if let Err(err) = self.store.resolve_current() {
            warn!("activation rejected: {err}");
            return self.send_store_error(err);
        }
        match self.supervisor.connect(self.store.current_link()) {
            Ok(()) => {
                info!("tunnel activated");
                self.endpoint.send(Ack::Success.as_token())?;
            }
            Err(SupervisorError::AlreadyActive) => {
                warn!("activation rejected: tunnel already active");
                self.endpoint.send(ErrorReply::AlreadyConnected.as_token())?;
            }
            Err(err) => {
                error!("tunnel activation failed: {err}");
                self.endpoint.send(ErrorReply::ConnectFailed.as_token())?;
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        info!("#### client requested tunnel deactivation");
        match self.supervisor.disconnect() {
            Ok(()) => {
                info!("tunnel deactivated");
                self.endpoint.send(Ack::Success.as_token())?;
            }
            Err(err) => {
                warn!("deactivation rejected: {err}");
                self.endpoint.send(ErrorReply::NotConnected.as_token())?;
            }
        }
        Ok(())
    }

    /// Answer a store failure on the wire. Store-level I/O breakage has no
    /// protocol representation and is fatal to the daemon.
    fn send_store_error(&mut self, err: StoreError) -> anyhow::Result<()> {
        let reply = match err {
            StoreError::InvalidSource(_) => ErrorReply::InvalidFile,
            StoreError::NotAFile(_) => ErrorReply::NotAFile,
            StoreError::NameCollision(_) => ErrorReply::FileExists,
            StoreError::NotFound(_) => ErrorReply::FileDoesNotExist,
            StoreError::InvalidName(_) => ErrorReply::InvalidName,
            StoreError::NoSelection => ErrorReply::NoFileSelected,
            StoreError::Io(e) => return Err(e).context("profile store failure"),
        };
        self.endpoint.send(reply.as_token())?;
        Ok(())
    }
}
