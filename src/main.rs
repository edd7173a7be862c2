mod cli;
mod commands;
mod config;
mod paths;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::InventoryFile;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub inventory: Option<PathBuf>,
}

impl Context {
    /// Load the inventory given on the command line, or the default one
    pub fn load_inventory(&self) -> Result<InventoryFile> {
        let path = match &self.inventory {
            Some(path) => path.clone(),
            None => paths::inventory_path()?,
        };
        log::debug!("Loading inventory from {}", path.display());
        InventoryFile::load(&path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        inventory: cli.inventory.map(|p| paths::expand(&p.to_string_lossy())),
    };

    match cli.command {
        Command::Hosts => commands::hosts::run(&ctx),
        Command::Exec(args) => commands::exec::run(&ctx, &args),
        Command::Push(args) => commands::push::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "converge", &mut io::stdout());
            Ok(())
        }
    }
}
