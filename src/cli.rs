use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version,about,long_about = None)]
pub struct CLI {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub subcommand: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a directory to one client at a time per connection
    Serve(ServeArgs),
    /// Connect to a server and start the interactive prompt
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address for the control listener (e.g. 0.0.0.0:1234)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Directory served to clients
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Seconds to wait for a client to open a data channel
    #[arg(long)]
    pub data_timeout: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct ConnectArgs {
    /// Server host name or address
    pub host: Option<String>,

    /// Server control port
    pub port: Option<u16>,

    /// Local directory that downloads land in and uploads are read from
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Seconds to wait when connecting a data channel
    #[arg(long)]
    pub data_timeout: Option<u64>,

    /// Disable transfer progress bars
    #[arg(long)]
    pub no_progress: bool,
}
