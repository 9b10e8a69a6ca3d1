//! CLI command implementations.

pub mod dump;
pub mod init;
pub mod inspect;
pub mod seed;

use bitdid_backend::FileBackend;
use bitdid_core::Session;
use std::path::Path;
use std::sync::Arc;

/// Opens a session over the store at `path`, creating parent directories.
pub fn open_session(path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let backend = FileBackend::open_with_create_dirs(path)?;
    Ok(Session::new(Arc::new(backend)))
}
