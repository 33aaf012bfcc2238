use super::read_tree;
use anyhow::Result;
use blockframe_editor::{BlockPath, BlockTree};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 32;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Document .json file
    pub input: PathBuf,
}

pub fn tree(args: TreeArgs, _cwd: &str) -> Result<()> {
    let (document, tree) = read_tree(&args.input)?;

    println!("🌲 {}", args.input.display().to_string().bold());
    for line in outline(&tree) {
        println!("{}", line);
    }
    println!();
    println!(
        "   {} blocks, {} forms",
        tree.len(),
        document.content.forms.len()
    );

    Ok(())
}

/// One line per block in document order, indented by depth
pub fn outline(tree: &BlockTree) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(BlockPath, &str)> = tree
        .roots()
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| (BlockPath::root(index), id.as_str()))
        .collect();

    while let Some((path, id)) = stack.pop() {
        let Some(node) = tree.get(id) else { continue };
        let depth = path.segments().len() - 1;

        let mut line = format!(
            "{}{} {} {}",
            "  ".repeat(depth),
            path.to_string().dimmed(),
            node.data.block_type().as_str().cyan(),
            format!("#{}", id).dimmed()
        );
        if let Some(content) = node.data.kind.content().filter(|c| !c.is_empty()) {
            line.push_str(&format!(" \"{}\"", preview(content)));
        }
        if let Some(form_id) = node.data.kind.form_id() {
            line.push_str(&format!(" {}", format!("form={}", form_id).yellow()));
        }
        lines.push(line);

        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(index, child)| (path.child(index), child.as_str())),
        );
    }

    lines
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
