use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use hookrelay_config::{ProjectConfig, ResolvedTables};
use hookrelay_core::{HookScope, TableConfig};

use crate::runner::load_tables;

pub async fn cmd_tables(config: ProjectConfig) -> Result<ExitCode> {
    let resolved = load_tables(&config, true).await?;

    for line in render(&resolved) {
        println!("{}", line);
    }
    Ok(ExitCode::SUCCESS)
}

fn render(resolved: &ResolvedTables) -> Vec<String> {
    let mut lines = Vec::new();

    if resolved.tables.is_empty() {
        lines.push("No tables selected.".yellow().to_string());
        return lines;
    }

    lines.push(format!(
        "{:<30} {:<15} {:>6} {:>6} {:>6}",
        "Table", "Primary key", "Source", "Dest", "Hooks"
    ));
    lines.push(format!("{:-<67}", ""));

    for table in resolved.tables.values() {
        lines.push(format!(
            "{:<30} {:<15} {:>6} {:>6} {:>6}",
            table.table_name.bold(),
            table.primary_key,
            yes_no(table.source_exists),
            yes_no(table.dest_exists),
            table.hooks.len()
        ));
        lines.extend(hook_lines(table));
    }

    if !resolved.duplicates.is_empty() {
        lines.push(String::new());
        lines.push(
            format!(
                "Configured more than once (last rule wins): {}",
                resolved.duplicates.join(", ")
            )
            .yellow()
            .to_string(),
        );
    }

    lines
}

fn hook_lines(table: &TableConfig) -> Vec<String> {
    table
        .hooks
        .iter()
        .map(|hook| match (hook.scope, &hook.column_name) {
            (HookScope::Column, Some(column)) => format!("    column {} <- {}", column, hook.script),
            _ => format!("    row <- {}", hook.script),
        })
        .collect()
}

fn yes_no(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}
