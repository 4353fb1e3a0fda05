//! Wire Vocabulary
//!
//! This module defines the tokens exchanged between the control client and
//! the manager daemon. Everything on the wire is a single line of uppercase
//! ASCII: a command, a prompt soliciting an argument, an acknowledgement, a
//! profile name or count, or an `ERROR:<REASON>` token.

use std::fmt;

/// Token a client sends to keep a profile listing going.
pub const CONTINUE: &str = "CONTINUE";

/// Commands accepted by the manager daemon.
///
/// Commands carry no arguments on the wire; multi-step commands solicit
/// their arguments through [`Prompt`] round-trips after the token arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Shut the daemon down
    Terminate,
    /// Query whether the tunnel is up
    Status,
    /// Enumerate stored profiles
    Available,
    /// Copy a profile file into the store
    Upload,
    /// Remove a stored profile
    Delete,
    /// Name the currently selected profile
    Current,
    /// Repoint the current selection
    Select,
    /// Start the tunnel against the current selection
    Connect,
    /// Stop the tunnel
    Disconnect,
}

impl Command {
    /// Parse a received token. `None` marks the unrecognized-command case,
    /// which is distinct from any known command's error.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "TERMINATE" => Some(Command::Terminate),
            "STATUS" => Some(Command::Status),
            "AVAILABLE" => Some(Command::Available),
            "UPLOAD" => Some(Command::Upload),
            "DELETE" => Some(Command::Delete),
            "CURRENT" => Some(Command::Current),
            "SELECT" => Some(Command::Select),
            "CONNECT" => Some(Command::Connect),
            "DISCONNECT" => Some(Command::Disconnect),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Command::Terminate => "TERMINATE",
            Command::Status => "STATUS",
            Command::Available => "AVAILABLE",
            Command::Upload => "UPLOAD",
            Command::Delete => "DELETE",
            Command::Current => "CURRENT",
            Command::Select => "SELECT",
            Command::Connect => "CONNECT",
            Command::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Prompts the daemon sends while soliciting arguments for a multi-step
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Source path of a profile to upload
    Path,
    /// Name the uploaded profile should be stored under
    NewName,
    /// Name of an existing profile
    Name,
}

impl Prompt {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "PATH?" => Some(Prompt::Path),
            "NEWNAME?" => Some(Prompt::NewName),
            "NAME?" => Some(Prompt::Name),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Prompt::Path => "PATH?",
            Prompt::NewName => "NEWNAME?",
            Prompt::Name => "NAME?",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Terminal non-error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The requested operation completed
    Success,
    /// The daemon is exiting
    Terminated,
    /// The tunnel is up
    Connected,
    /// The tunnel is down
    Disconnected,
}

impl Ack {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "SUCCESS" => Some(Ack::Success),
            "TERMINATED" => Some(Ack::Terminated),
            "CONNECTED" => Some(Ack::Connected),
            "DISCONNECTED" => Some(Ack::Disconnected),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Ack::Success => "SUCCESS",
            Ack::Terminated => "TERMINATED",
            Ack::Connected => "CONNECTED",
            Ack::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Error vocabulary, carried on the wire as `ERROR:<REASON>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReply {
    /// The received token is not one of the known commands
    InvalidCommand,
    /// Upload source path does not exist
    InvalidFile,
    /// Upload source path is not a regular file
    NotAFile,
    /// A profile with the requested name already exists
    FileExists,
    /// No profile with the requested name exists
    FileDoesNotExist,
    /// The supplied name reduces to an empty final path component
    InvalidName,
    /// No profile is selected, or the selection points at a deleted profile
    NoFileSelected,
    /// A connection is already active
    AlreadyConnected,
    /// No connection is active
    NotConnected,
    /// The tunnel process could not be launched
    ConnectFailed,
}

impl ErrorReply {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ERROR:INVALIDCOMMAND" => Some(ErrorReply::InvalidCommand),
            "ERROR:INVALIDFILE" => Some(ErrorReply::InvalidFile),
            "ERROR:NOTAFILE" => Some(ErrorReply::NotAFile),
            "ERROR:FILEEXISTS" => Some(ErrorReply::FileExists),
            "ERROR:FILEDOESNOTEXIST" => Some(ErrorReply::FileDoesNotExist),
            "ERROR:INVALIDNAME" => Some(ErrorReply::InvalidName),
            "ERROR:NOFILESELECTED" => Some(ErrorReply::NoFileSelected),
            "ERROR:CONNECTED" => Some(ErrorReply::AlreadyConnected),
            "ERROR:DISCONNECTED" => Some(ErrorReply::NotConnected),
            "ERROR:CONNECTFAILED" => Some(ErrorReply::ConnectFailed),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            ErrorReply::InvalidCommand => "ERROR:INVALIDCOMMAND",
            ErrorReply::InvalidFile => "ERROR:INVALIDFILE",
            ErrorReply::NotAFile => "ERROR:NOTAFILE",
            ErrorReply::FileExists => "ERROR:FILEEXISTS",
            ErrorReply::FileDoesNotExist => "ERROR:FILEDOESNOTEXIST",
            ErrorReply::InvalidName => "ERROR:INVALIDNAME",
            ErrorReply::NoFileSelected => "ERROR:NOFILESELECTED",
            ErrorReply::AlreadyConnected => "ERROR:CONNECTED",
            ErrorReply::NotConnected => "ERROR:DISCONNECTED",
            ErrorReply::ConnectFailed => "ERROR:CONNECTFAILED",
        }
    }

    /// Short human sentence for client-side reporting.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorReply::InvalidCommand => "the daemon does not recognize this command",
            ErrorReply::InvalidFile => "the source path does not exist",
            ErrorReply::NotAFile => "the source path is not a regular file",
            ErrorReply::FileExists => "a profile with that name already exists",
            ErrorReply::FileDoesNotExist => "no profile with that name exists",
            ErrorReply::InvalidName => "that is not a usable profile name",
            ErrorReply::NoFileSelected => "no profile is currently selected",
            ErrorReply::AlreadyConnected => "a connection is already active",
            ErrorReply::NotConnected => "no connection is active",
            ErrorReply::ConnectFailed => "the tunnel process could not be launched",
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
