//! Writing the result without leaving half-written files behind

use crate::error::CatResult;
use std::io::Write;
use std::path::Path;

/// Writes to a temporary file next to `path`, then renames it over `path`.
///
/// If anything fails, `path` is left as it was (absent or with its old content).
pub fn write_atomically(path: &Path, data: &[u8]) -> CatResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".tgs2webp-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
