mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{init, styles, tree, validate, InitArgs, StylesArgs, TreeArgs, ValidateArgs};
use tracing_subscriber::EnvFilter;

/// Blockframe CLI - inspect and check block editor documents
#[derive(Parser, Debug)]
#[command(name = "blockframe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a blockframe.config.json with defaults
    Init(InitArgs),

    /// Check documents for structural errors and dangling references
    Validate(ValidateArgs),

    /// Print a document's block outline
    Tree(TreeArgs),

    /// Print a block's resolved styles at a breakpoint
    Styles(StylesArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| {
            let cwd = cwd.display().to_string();
            match cli.command {
                Command::Init(args) => init(args, &cwd),
                Command::Validate(args) => validate(args, &cwd),
                Command::Tree(args) => tree(args, &cwd),
                Command::Styles(args) => styles(args, &cwd),
            }
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
