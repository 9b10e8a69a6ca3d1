//! Inspect command implementation.

use bitdid_backend::{FileBackend, PersistenceBackend};
use bitdid_core::EntityKind;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Per-kind statistics, in registry order.
    pub kinds: Vec<KindStats>,
    /// Total number of rows.
    pub total_rows: usize,
}

/// Statistics for a single kind.
#[derive(Debug, Serialize)]
pub struct KindStats {
    /// Kind name.
    pub kind: String,
    /// Backend table.
    pub table: String,
    /// Whether the table exists.
    pub present: bool,
    /// Number of rows.
    pub rows: usize,
}

/// Collects statistics of the store at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let backend = FileBackend::open(path)?;
    let tables = backend.tables()?;

    let kinds: Vec<KindStats> = EntityKind::ALL
        .iter()
        .map(|kind| KindStats {
            kind: kind.name().to_string(),
            table: kind.table().to_string(),
            present: tables.iter().any(|t| t == kind.table()),
            rows: backend.row_count(kind.table()),
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        total_rows: kinds.iter().map(|k| k.rows).sum(),
        kinds,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Bitdid Store Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", result.file_size);
    println!();
    println!("Kinds:");
    for stats in &result.kinds {
        if stats.present {
            println!("  {:<20} {:>8} rows", stats.kind, stats.rows);
        } else {
            println!("  {:<20} {:>8}", stats.kind, "missing");
        }
    }
    println!();
    println!("Total rows: {}", result.total_rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn inspect_missing_store_fails() {
        let dir = tempdir().unwrap();
        assert!(inspect(&dir.path().join("none.bitdid")).is_err());
    }

    #[test]
    fn inspect_counts_seeded_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bitdid");
        crate::commands::seed::seed(&path).unwrap();

        let result = inspect(&path).unwrap();

        assert_eq!(result.kinds.len(), EntityKind::ALL.len());
        assert!(result.kinds.iter().all(|k| k.present));
        let currencies = result
            .kinds
            .iter()
            .find(|k| k.table == "currencies")
            .unwrap();
        assert_eq!(currencies.rows, 3);
        assert!(result.total_rows > 3);
    }
}
