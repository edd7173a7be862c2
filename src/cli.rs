use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge local and SSH hosts to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Inventory file (default: <config dir>/converge/inventory.toml)
    #[arg(short, long, global = true, env = "CONVERGE_INVENTORY")]
    pub inventory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List hosts in the inventory
    Hosts,

    /// Run a shell command on hosts
    Exec(ExecArgs),

    /// Copy a local file to hosts with the scp sink protocol
    Push(PushArgs),

    /// Apply a rules file to hosts
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ExecArgs {
    /// Command line, run through bash
    pub command: String,

    /// Run as this user (sudo with the host secret); `-` means root
    #[arg(long = "as", value_name = "USER")]
    pub as_user: Option<String>,

    /// Text fed to the command's stdin
    #[arg(long, default_value = "")]
    pub stdin: String,

    /// Only this host
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args)]
pub struct PushArgs {
    /// Local file to send
    pub local: PathBuf,

    /// Destination path on the host
    pub remote: String,

    /// Permission bits, in octal
    #[arg(long, default_value = "644")]
    pub mode: String,

    /// Only this host
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Rules file (TOML)
    pub rules: PathBuf,

    /// Only this host
    #[arg(long)]
    pub host: Option<String>,

    /// Hosts converged in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    /// Print a JSON summary instead of the status tree
    #[arg(long)]
    pub json: bool,
}
