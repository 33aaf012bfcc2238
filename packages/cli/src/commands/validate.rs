use super::read_tree;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Document .json file or directory of documents
    pub input: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub block_count: usize,
    pub form_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == severity)
            .count()
    }
}

pub fn validate(args: ValidateArgs, _cwd: &str) -> Result<()> {
    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_documents(&args.input)
    } else {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            args.input.display()
        ));
    };
    tracing::debug!("Validating {} document(s)", files.len());

    let reports: Vec<FileReport> = files.iter().map(|file| check_file(file)).collect();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports);
    }

    // Exit with error code if there are errors
    if reports.iter().any(|report| report.errors() > 0) {
        std::process::exit(1);
    }

    Ok(())
}

/// Check one document; unreadable files become error diagnostics
pub fn check_file(path: &Path) -> FileReport {
    let mut report = FileReport {
        path: path.display().to_string(),
        block_count: 0,
        form_count: 0,
        diagnostics: Vec::new(),
    };

    let (document, tree) = match read_tree(path) {
        Ok(loaded) => loaded,
        Err(err) => {
            report.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: format!("{:#}", err),
            });
            return report;
        }
    };

    tracing::debug!(path = %path.display(), blocks = tree.len(), "Loaded document");
    report.block_count = tree.len();
    report.form_count = document.content.forms.len();

    if let Err(err) = tree.check_invariants() {
        report.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message: err.to_string(),
        });
    }

    // Stated parent ids that disagree with containment get rewritten on load
    let mut stack: Vec<_> = document.content.blocks.iter().map(|block| (None, block)).collect();
    while let Some((parent, block)) = stack.pop() {
        if block.parent_id.is_some() && block.parent_id.as_deref() != parent {
            report.diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                message: format!(
                    "Block {} declares parentId {:?} but is nested in {:?}",
                    block.id,
                    block.parent_id.as_deref().unwrap_or_default(),
                    parent.unwrap_or("<root>")
                ),
            });
        }
        stack.extend(block.blocks.iter().map(|child| (Some(block.id.as_str()), child)));
    }

    let form_ids: HashSet<&str> = document.content.forms.iter().map(|form| form.id.as_str()).collect();
    for id in tree.ids() {
        let Some(node) = tree.get(&id) else { continue };
        if let Some(form_id) = node.data.kind.form_id() {
            if !form_ids.contains(form_id) {
                report.diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    message: format!("Block {} references unknown form {}", id, form_id),
                });
            }
        }
    }

    report
}

fn print_reports(reports: &[FileReport]) {
    println!("🔍 {} Blockframe validator", "Starting".green().bold());
    println!();

    for report in reports {
        if report.diagnostics.is_empty() {
            println!(
                "{} {} ({} blocks, {} forms)",
                "✓".green(),
                report.path,
                report.block_count,
                report.form_count
            );
            continue;
        }

        println!("{}", report.path);
        for diagnostic in &report.diagnostics {
            let level = match diagnostic.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
            };
            println!("  {} {}", level, diagnostic.message);
        }
    }

    let errors: usize = reports.iter().map(FileReport::errors).sum();
    let warnings: usize = reports.iter().map(FileReport::warnings).sum();

    println!();
    println!(
        "✨ {} Validation complete!",
        if errors > 0 {
            "Done".red().bold()
        } else {
            "Done".green().bold()
        }
    );
    println!("   Files checked: {}", reports.len());
    if errors > 0 {
        println!("   {} {}", "Errors:".red(), errors);
    }
    if warnings > 0 {
        println!("   {} {}", "Warnings:".yellow(), warnings);
    }
}

fn find_documents(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false))
        .collect()
}
