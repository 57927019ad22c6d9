//! Output naming and writing.
//!
//! An output is named after its source's base name only:
//! `tables/2022/q3/report.png` → `output/report.xlsx`. Names are fixed before
//! any worker starts, so concurrent workers never share a path; a later
//! source that would reuse an earlier one's name is flagged instead.
//!
//! Writes go to a temporary file in the output directory which is then
//! renamed over the target, so a reader never sees a half-written sheet and a
//! rerun replaces the previous result in one step. New sheets get the usual
//! umask-derived mode; a replaced sheet keeps its previous mode.

use crate::error::FileError;
use crate::output::SourceFile;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A source file paired with the output it will produce.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub source: SourceFile,
    pub output: PathBuf,
    /// Earlier source that already claimed `output`, if any.
    pub collides_with: Option<PathBuf>,
}

/// `<output_dir>/<base name>.<extension>`, independent of where the source sits.
pub fn output_path(output_dir: &Path, source: &SourceFile, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", source.base_name(), extension))
}

/// Pair every source with its output path, in discovery order.
///
/// The first source to claim a name keeps it; later ones carry
/// `collides_with` and must not be written.
pub fn assign_outputs(files: Vec<SourceFile>, output_dir: &Path, extension: &str) -> Vec<FileJob> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(files.len());
    files
        .into_iter()
        .map(|source| {
            let output = output_path(output_dir, &source, extension);
            let collides_with = match claimed.get(&output) {
                Some(first) => Some(first.clone()),
                None => {
                    claimed.insert(output.clone(), source.path.clone());
                    None
                }
            };
            FileJob {
                source,
                output,
                collides_with,
            }
        })
        .collect()
}

/// Atomically write `data` to `path`, replacing any previous file.
///
/// Returns the number of bytes written.
pub async fn write_output(path: &Path, data: Vec<u8>) -> Result<u64, FileError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &data))
        .await
        .map_err(|e| FileError::WriteFailed {
            detail: format!("write task panicked: {e}"),
        })?
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<u64, FileError> {
    let failed = |e: std::io::Error| FileError::WriteFailed {
        detail: format!("{}: {}", path.display(), e),
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = temp_file_in(dir).map_err(failed)?;
    // A rerun keeps whatever mode the previous sheet was given.
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(failed)?;
        }
    }
    tmp.write_all(data).map_err(failed)?;
    tmp.as_file().sync_all().map_err(failed)?;
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(data.len() as u64)
}

/// Temporary file with the mode a plain `File::create` would get.
///
/// `NamedTempFile` defaults to 0600; asking for 0666 lets the process umask
/// decide, as it does for any other newly created file.
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".ocr2table-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
