use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use crate::errors::TableIoError;

/// Write `bytes` to a uniquely named temp file beside `path`, then rename it over `path`
/// so readers never see a partial table. The temp file is removed on any failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TableIoError> {
    let fail = |source| TableIoError::Write { path: path.to_path_buf(), source };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(fail)?,
    };
    fs::create_dir_all(&parent).map_err(fail)?;

    let mut file =
        Builder::new().prefix(".cobuy-").suffix(".tmp").tempfile_in(&parent).map_err(fail)?;
    file.write_all(bytes).map_err(fail)?;
    file.as_file().sync_all().map_err(fail)?;
    file.persist(path).map_err(|err| fail(err.error))?;

    debug!(
        event_name = "io.table.written",
        path = %path.display(),
        bytes = bytes.len(),
        "table written"
    );
    Ok(())
}
