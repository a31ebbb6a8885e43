//! Artifact installation into the project tree.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Suffix the host runtime expects on compiled modules for this platform.
#[cfg(windows)]
pub const DEFAULT_MODULE_SUFFIX: &str = "pyd";
/// Suffix the host runtime expects on compiled modules for this platform.
#[cfg(not(windows))]
pub const DEFAULT_MODULE_SUFFIX: &str = "so";

/// Copies `artifact` to `destination`, replacing any previous build.
///
/// The copy lands in a sibling temp file first and is renamed into place, so
/// a concurrent importer sees either the old module or the new one.
pub fn install_artifact(artifact: &Path, destination: &Path) -> io::Result<()> {
    let parent = destination.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("module path has no parent: {}", destination.display()),
        )
    })?;
    fs::create_dir_all(parent)?;

    let mut source = File::open(artifact)?;
    let permissions = source.metadata()?.permissions();

    let mut staged = NamedTempFile::new_in(parent)?;
    io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    fs::set_permissions(staged.path(), permissions)?;
    staged.persist(destination).map_err(|err| err.error)?;
    Ok(())
}
