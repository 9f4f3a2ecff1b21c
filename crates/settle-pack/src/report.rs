//! Artifact listing and usage text.

use crate::config::{Layout, PackConfig};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub file_name: String,
    pub size_bytes: u64,
    /// Local modification time, RFC 3339.
    pub modified: Option<String>,
}

/// Files in the output directory whose names contain a package name.
///
/// A missing output directory yields an empty list.
pub fn collect(config: &PackConfig, layout: &Layout) -> io::Result<Vec<ArtifactEntry>> {
    let entries = match fs::read_dir(&layout.dist_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !config
            .packages
            .iter()
            .any(|p| file_name.contains(p.name.as_str()))
        {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).to_rfc3339());
        found.push(ArtifactEntry {
            file_name,
            size_bytes: meta.len(),
            modified,
        });
    }
    found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(found)
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn print(config: &PackConfig, layout: &Layout, entries: &[ArtifactEntry]) {
    println!("\n=== Artifacts in {} ===\n", layout.dist_dir.display());
    if entries.is_empty() {
        println!("  (none)");
    }
    for e in entries {
        let when = e
            .modified
            .as_deref()
            .and_then(|m| DateTime::parse_from_rfc3339(m).ok())
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:28} {:>10}  {when}", e.file_name, human_size(e.size_bytes));
    }

    let usage: Vec<&String> = config
        .packages
        .iter()
        .filter(|p| p.console)
        .flat_map(|p| p.usage.iter())
        .collect();
    if !usage.is_empty() {
        println!();
        for line in usage {
            println!("{line}");
        }
    }
}

pub fn print_json(entries: &[ArtifactEntry]) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(entries)?);
    Ok(())
}
