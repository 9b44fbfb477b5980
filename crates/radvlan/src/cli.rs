//! Clap derive structures for the `radvlan` binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// radvlan -- RADIUS MAC authentication with dynamic VLAN assignment
#[derive(Debug, Parser)]
#[command(
    name = "radvlan",
    version,
    about = "RADIUS MAC-authentication server with dynamic VLAN assignment",
    long_about = "Answers Access-Requests from wireless access points and switches,\n\
        identifies the device by its MAC address and replies with the VLAN\n\
        it belongs to: exact MAC, then OUI prefix, then the site default.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "RADVLAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RADVLAN_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the RADIUS server until interrupted
    Serve(ServeArgs),

    /// Write a starter configuration file
    InitConfig(InitArgs),

    /// Load and validate the configuration, then print a summary
    #[command(alias = "check")]
    CheckConfig(CheckArgs),

    /// Print the canonical form of one or more MAC addresses
    Normalize(NormalizeArgs),

    /// Run the VLAN resolver for a MAC without sending any RADIUS traffic
    Resolve(ResolveArgs),

    /// Send a test Access-Request to a running server and print the reply
    Probe(ProbeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind (overrides server.bind)
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Authentication port (overrides server.auth_port)
    #[arg(long)]
    pub auth_port: Option<u16>,

    /// Use the in-memory store seeded from [policy] instead of MySQL
    #[arg(long)]
    pub memory: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Also open a connection to the policy store
    #[arg(long)]
    pub connect: bool,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// MAC addresses in any common notation
    #[arg(required = true)]
    pub macs: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// MAC address to resolve
    pub mac: String,

    /// Use the in-memory store seeded from [policy] instead of MySQL
    #[arg(long)]
    pub memory: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// MAC address to authenticate (sent as User-Name and Calling-Station-Id)
    pub mac: String,

    /// Server to query
    #[arg(long, short = 's', default_value = "127.0.0.1:1812")]
    pub server: SocketAddr,

    /// Shared secret
    #[arg(long, env = "RADVLAN_PROBE_SECRET", hide_env_values = true)]
    pub secret: String,

    /// NAS-IP-Address to advertise
    #[arg(long)]
    pub nas_ip: Option<std::net::Ipv4Addr>,

    /// Include a Message-Authenticator attribute
    #[arg(long)]
    pub message_authenticator: bool,

    /// Seconds to wait for each reply
    #[arg(long, default_value = "3")]
    pub timeout: u64,

    /// Retransmissions after the first attempt
    #[arg(long, default_value = "2")]
    pub retries: u32,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
