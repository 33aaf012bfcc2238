use anyhow::Result;
use blockframe_editor::{Breakpoint, EditorConfig, DEFAULT_CONFIG_NAME};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Breakpoint the editor previews first (mobile, tablet, desktop)
    #[arg(short, long, default_value = "desktop")]
    pub breakpoint: Breakpoint,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Blockframe editor config...".bright_blue().bold());

    let config = EditorConfig {
        default_breakpoint: args.breakpoint,
        ..EditorConfig::default()
    };
    fs::write(&config_path, config.to_json_pretty()?)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Config written!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Adjust {} (history, autosave, paste allow-list)", DEFAULT_CONFIG_NAME);
    println!("  2. Run: blockframe validate <document.json>");

    Ok(())
}
