//! Init command implementation.

use std::path::Path;

/// Runs the init command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let session = super::open_session(path)?;
    if session.ensure_schema_ready()? {
        println!(
            "Created {} tables in {}",
            session.registry().len(),
            path.display()
        );
    } else {
        println!("Schema already present in {}", path.display());
    }
    Ok(())
}
