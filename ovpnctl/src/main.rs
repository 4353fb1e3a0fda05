//! Control CLI for the OpenVPN manager daemon.
//!
//! One subcommand per protocol command. Each invocation opens the pipe
//! pair, performs the client side of the exchange, and maps the daemon's
//! reply to output and exit status. Argument shapes are validated locally
//! by clap before anything is sent.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use ovpn_ipc::messages::{Ack, Command as Request, ErrorReply, Prompt, CONTINUE};
use ovpn_ipc::transport::{ClientEndpoint, PipePair};
use shared_utils::config::Config;
use shared_utils::logging::{init_logging, LogOptions};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for tracing::Level {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Trace => tracing::Level::TRACE,
            LogLevelArg::Debug => tracing::Level::DEBUG,
            LogLevelArg::Info => tracing::Level::INFO,
            LogLevelArg::Warn => tracing::Level::WARN,
            LogLevelArg::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = "Examples:\n  ovpnctl upload /tmp/office.ovpn office\n  ovpnctl select office\n  ovpnctl connect\n  ovpnctl status --output json")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/ovpn-mngr/config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "warn",
        env = "OVPN_MNGR_LOG_LEVEL"
    )]
    log_level: LogLevelArg,

    /// Output format for command results (table|json)
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether the tunnel is up
    Status,
    /// List stored profiles
    Available,
    /// Copy a profile file into the store
    Upload {
        /// Path of the file to upload
        path: PathBuf,
        /// Name to store the profile under
        name: String,
    },
    /// Remove a stored profile
    Delete {
        /// Name of the profile to remove
        name: String,
    },
    /// Show the currently selected profile
    Current,
    /// Select the profile used by `connect`
    Select {
        /// Name of the profile to select
        name: String,
    },
    /// Start the tunnel against the selected profile
    Connect,
    /// Stop the tunnel
    Disconnect,
    /// Shut the daemon down
    Terminate,
}

#[derive(Serialize)]
struct Message<'a> {
    status: &'a str,
    detail: &'a str,
}

fn print_msg(fmt: OutputFormat, status: &str, detail: &str) {
    match fmt {
        OutputFormat::Table => println!("{status}: {detail}"),
        OutputFormat::Json => {
            let msg = Message { status, detail };
            println!("{}", serde_json::to_string_pretty(&msg).unwrap_or_default());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(LogOptions {
        level: args.log_level.into(),
        ..Default::default()
    });

    let config = Config::load(&args.config).unwrap_or_default();
    let endpoint = ClientEndpoint::open(PipePair::in_dir(&config.paths.runtime_dir))?;

    match args.command {
        Command::Status => status(&endpoint, args.output),
        Command::Available => available(&endpoint, args.output),
        Command::Upload { path, name } => upload(&endpoint, args.output, &path, &name),
        Command::Delete { name } => delete(&endpoint, args.output, &name),
        Command::Current => current(&endpoint, args.output),
        Command::Select { name } => select(&endpoint, args.output, &name),
        Command::Connect => connect(&endpoint, args.output),
        Command::Disconnect => disconnect(&endpoint, args.output),
        Command::Terminate => terminate(&endpoint, args.output),
    }
}

/// Read one reply, turning a protocol error token into a failed exit.
fn checked_receive(endpoint: &ClientEndpoint) -> Result<String> {
    let reply = endpoint.receive()?;
    if let Some(err) = ErrorReply::parse(&reply) {
        bail!("{}", err.describe());
    }
    Ok(reply)
}

fn expect_prompt(endpoint: &ClientEndpoint, prompt: Prompt) -> Result<()> {
    let reply = checked_receive(endpoint)?;
    if reply != prompt.as_token() {
        bail!("unexpected response from daemon: '{reply}'");
    }
    Ok(())
}

fn expect_ack(endpoint: &ClientEndpoint, ack: Ack) -> Result<()> {
    let reply = checked_receive(endpoint)?;
    if reply != ack.as_token() {
        bail!("unexpected response from daemon: '{reply}'");
    }
    Ok(())
}

fn status(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Status.as_token())?;
    let reply = checked_receive(endpoint)?;
    match Ack::parse(&reply) {
        Some(Ack::Connected) => print_msg(fmt, "connected", "the tunnel is up"),
        Some(Ack::Disconnected) => print_msg(fmt, "disconnected", "the tunnel is down"),
        _ => bail!("unexpected response from daemon: '{reply}'"),
    }
    Ok(())
}

fn available(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Available.as_token())?;
    let count: usize = checked_receive(endpoint)?
        .parse()
        .context("daemon sent a malformed profile count")?;

    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        endpoint.send(CONTINUE)?;
        names.push(checked_receive(endpoint)?);
    }

    match fmt {
        OutputFormat::Table => {
            for name in &names {
                println!("{name}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
    }
    Ok(())
}

fn upload(endpoint: &ClientEndpoint, fmt: OutputFormat, path: &std::path::Path, name: &str) -> Result<()> {
    endpoint.send(Request::Upload.as_token())?;
    expect_prompt(endpoint, Prompt::Path)?;
    endpoint.send(path.to_string_lossy())?;
    // source problems surface here, in place of the name prompt
    expect_prompt(endpoint, Prompt::NewName)?;
    endpoint.send(name)?;
    expect_ack(endpoint, Ack::Success)?;
    print_msg(fmt, "ok", &format!("profile '{name}' uploaded"));
    Ok(())
}

fn delete(endpoint: &ClientEndpoint, fmt: OutputFormat, name: &str) -> Result<()> {
    endpoint.send(Request::Delete.as_token())?;
    expect_prompt(endpoint, Prompt::Name)?;
    endpoint.send(name)?;
    expect_ack(endpoint, Ack::Success)?;
    print_msg(fmt, "ok", &format!("profile '{name}' deleted"));
    Ok(())
}

fn current(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Current.as_token())?;
    let name = checked_receive(endpoint)?;
    match fmt {
        OutputFormat::Table => println!("{name}"),
        OutputFormat::Json => print_msg(fmt, "ok", &name),
    }
    Ok(())
}

fn select(endpoint: &ClientEndpoint, fmt: OutputFormat, name: &str) -> Result<()> {
    endpoint.send(Request::Select.as_token())?;
    expect_prompt(endpoint, Prompt::Name)?;
    endpoint.send(name)?;
    expect_ack(endpoint, Ack::Success)?;
    print_msg(fmt, "ok", &format!("profile '{name}' selected"));
    Ok(())
}

fn connect(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Connect.as_token())?;
    expect_ack(endpoint, Ack::Success)?;
    print_msg(fmt, "ok", "tunnel started");
    Ok(())
}

fn disconnect(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Disconnect.as_token())?;
    expect_ack(endpoint, Ack::Success)?;
    print_msg(fmt, "ok", "tunnel stopped");
    Ok(())
}

fn terminate(endpoint: &ClientEndpoint, fmt: OutputFormat) -> Result<()> {
    endpoint.send(Request::Terminate.as_token())?;
    expect_ack(endpoint, Ack::Terminated)?;
    print_msg(fmt, "ok", "daemon terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_renders_with_examples() {
        let mut cmd = Args::command();
        let help = cmd.render_long_help().to_string();
        assert!(
            help.contains("Examples:"),
            "help output should include examples for quick start"
        );
    }

    #[test]
    fn parses_status_default_output() {
        let args = Args::parse_from(["bin", "status"]);
        match args.command {
            Command::Status => {}
            _ => panic!("expected status subcommand"),
        }
        assert!(matches!(args.output, OutputFormat::Table));
    }

    #[test]
    fn parses_upload_with_path_and_name() {
        let args = Args::parse_from(["bin", "upload", "/tmp/office.ovpn", "office"]);
        match args.command {
            Command::Upload { path, name } => {
                assert_eq!(path, PathBuf::from("/tmp/office.ovpn"));
                assert_eq!(name, "office");
            }
            _ => panic!("expected upload subcommand"),
        }
    }

    #[test]
    fn upload_requires_both_arguments() {
        assert!(Args::try_parse_from(["bin", "upload", "/tmp/office.ovpn"]).is_err());
        assert!(Args::try_parse_from(["bin", "upload"]).is_err());
    }

    #[test]
    fn parses_select_with_json_output() {
        let args = Args::parse_from(["bin", "--output", "json", "select", "office"]);
        assert!(matches!(args.output, OutputFormat::Json));
        match args.command {
            Command::Select { name } => assert_eq!(name, "office"),
            _ => panic!("expected select subcommand"),
        }
    }
}
