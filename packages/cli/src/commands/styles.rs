use super::read_tree;
use anyhow::{Context, Result};
use blockframe_editor::{Breakpoint, EditorConfig};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StylesArgs {
    /// Document .json file
    pub input: PathBuf,

    /// Block id to resolve
    #[arg(long)]
    pub block: String,

    /// Breakpoint to resolve at (mobile, tablet, desktop); defaults to the
    /// configured breakpoint
    #[arg(long)]
    pub breakpoint: Option<Breakpoint>,
}

pub fn styles(args: StylesArgs, cwd: &str) -> Result<()> {
    let breakpoint = match args.breakpoint {
        Some(breakpoint) => breakpoint,
        None => EditorConfig::load(cwd)?.default_breakpoint,
    };

    let (_, tree) = read_tree(&args.input)?;
    let resolved = tree
        .get(&args.block)
        .map(|node| node.data.styles.resolve_all(breakpoint))
        .with_context(|| format!("Block not found: {}", args.block))?;

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
