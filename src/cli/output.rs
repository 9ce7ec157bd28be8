//! Output formatting for CLI commands: JSON, YAML, or a flat key/value table.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use crate::config::keys::KEY_DELIMITER;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Table,
}

/// Print a configuration tree in the given format
pub fn print_output(data: &serde_json::Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Yaml => print_yaml(data),
        OutputFormat::Table => {
            print_table(&flatten(data));
            Ok(())
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Flatten a JSON tree into sorted `(colon path, value)` rows.
pub fn flatten(data: &serde_json::Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &serde_json::Value, rows: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}{}{}", prefix, KEY_DELIMITER, key)
                    };
                    walk(&path, child, rows);
                }
            }
            serde_json::Value::String(s) => rows.push((prefix.to_string(), s.clone())),
            other => rows.push((prefix.to_string(), other.to_string())),
        }
    }

    let mut rows = Vec::new();
    walk("", data, &mut rows);
    rows.sort();
    rows
}

fn print_table(rows: &[(String, String)]) {
    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(3).clamp(3, 60);

    print_table_header(&[("KEY", key_width), ("VALUE", 40)]);
    for (key, value) in rows {
        println!("{:<width$} {}", truncate(key, key_width), truncate(value, 80), width = key_width);
    }
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a horizontal separator line
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    print_separator(total_width.saturating_sub(1));
}
