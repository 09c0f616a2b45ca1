use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use viewsync_core::hierarchy::{parse_payload, SyncPayload};

pub struct CheckOptions {
    pub file: PathBuf,
    pub root: Option<String>,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

pub fn run_check(options: CheckOptions) -> Result<()> {
    let raw = fs::read_to_string(&options.file)
        .with_context(|| format!("Failed to read file: {}", options.file.display()))?;
    let tree: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Not JSON: {}", options.file.display()))?;

    let root = match options.root {
        Some(root) => root,
        None => payload_root(&tree)
            .ok_or_else(|| anyhow!("payload names no root; pass --root"))?
            .to_string(),
    };

    let outcome = parse_payload(&root, tree);
    match options.format {
        OutputFormat::Json => display_json(&root, &outcome),
        OutputFormat::Pretty => display_pretty(&root, &outcome, &options.file),
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// The id a payload roots itself at: `root` for the flat shape, `id` for
/// the nested one.
fn payload_root(tree: &Value) -> Option<&str> {
    tree.get("root")
        .or_else(|| tree.get("id"))
        .and_then(Value::as_str)
}

fn display_json(root: &str, outcome: &viewsync_core::Result<SyncPayload>) {
    let report = match outcome {
        Ok(payload) => json!({"valid": true, "root": root, "nodes": payload.len()}),
        Err(err) => json!({
            "valid": false,
            "root": root,
            "error": err.to_string(),
            "status": err.status().code(),
        }),
    };
    println!("{report}");
}

fn display_pretty(root: &str, outcome: &viewsync_core::Result<SyncPayload>, file: &Path) {
    match outcome {
        Ok(payload) => println!(
            "{} {} ({} node(s) under '{}')",
            "✓".green().bold(),
            file.display(),
            payload.len(),
            root
        ),
        Err(err) => println!("{} {}: {}", "✗".red().bold(), file.display(), err),
    }
}
