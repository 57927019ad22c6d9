//! File discovery: walk the input tree and keep files with an allowed extension.
//!
//! Entries are visited depth-first with siblings sorted by file name, so the
//! same tree always yields the same list. A symlink to a file is kept like
//! the file itself; symlinked directories are not descended into.
//! Directories and files with other extensions are skipped silently; an
//! entry that cannot be read (permissions, a file deleted mid-walk) is
//! logged and skipped rather than failing the batch.

use crate::config::ConversionConfig;
use crate::error::Ocr2TableError;
use crate::output::SourceFile;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Recursively list every regular file under `root` whose extension is in
/// `extensions` (case-sensitive, no leading dot).
///
/// An empty result is not an error.
pub fn discover_files(root: &Path, extensions: &[String]) -> Result<Vec<SourceFile>, Ocr2TableError> {
    match std::fs::metadata(root) {
        Ok(meta) if !meta.is_dir() => {
            return Err(Ocr2TableError::InputNotADirectory {
                path: root.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Ocr2TableError::InputDirNotFound {
                path: root.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(Ocr2TableError::Internal(format!(
                "cannot read input directory '{}': {}",
                root.display(),
                e
            )));
        }
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !has_allowed_extension(entry.path(), extensions) {
            continue;
        }
        // `entry.metadata()` does not follow links; the link target decides.
        let meta = if entry.path_is_symlink() {
            std::fs::metadata(entry.path())
        } else {
            entry.metadata().map_err(std::io::Error::from)
        };
        let meta = match meta {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        files.push(SourceFile::new(entry.into_path(), meta.len()));
    }

    info!("Discovered {} files under {}", files.len(), root.display());
    debug!(
        "Discovered: {:?}",
        files.iter().map(|f| f.base_name()).collect::<Vec<_>>()
    );
    Ok(files)
}

/// Run [`discover_files`] for the configured input directory off the async
/// executor; the walk is blocking filesystem I/O.
pub async fn discover(config: &ConversionConfig) -> Result<Vec<SourceFile>, Ocr2TableError> {
    let root = config.input_dir.clone();
    let extensions = config.extensions.clone();
    tokio::task::spawn_blocking(move || discover_files(&root, &extensions))
        .await
        .map_err(|e| Ocr2TableError::Internal(format!("Discovery task panicked: {}", e)))?
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXTENSIONS;
    use crate::output::DocumentKind;
    use std::fs;
    use tempfile::TempDir;

    fn default_exts() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    fn touch(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn names(files: &[SourceFile], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn keeps_only_allowed_extensions_at_any_depth() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a.png", b"1");
        touch(root, "notes.txt", b"2");
        touch(root, "2022/b.pdf", b"3");
        touch(root, "2022/q3/deep/c.bmp", b"4");
        touch(root, "2022/q3/deep/d.jpeg", b"5");
        touch(root, "2022/q3/e.docx", b"6");
        touch(root, "noext", b"7");

        let files = discover_files(root, &default_exts()).unwrap();
        assert_eq!(
            names(&files, root),
            vec!["2022/b.pdf", "2022/q3/deep/c.bmp", "2022/q3/deep/d.jpeg", "a.png"]
        );
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "upper.PNG", b"x");
        touch(dir.path(), "lower.png", b"x");

        let files = discover_files(dir.path(), &default_exts()).unwrap();
        assert_eq!(names(&files, dir.path()), vec!["lower.png"]);
    }

    #[test]
    fn directories_with_matching_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scan.pdf")).unwrap();
        touch(dir.path(), "scan.pdf/inner.jpg", b"x");

        let files = discover_files(dir.path(), &default_exts()).unwrap();
        assert_eq!(names(&files, dir.path()), vec!["scan.pdf/inner.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_kept_symlinked_dirs_are_not_walked() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tables");
        touch(&root, "a.png", b"a");
        touch(dir.path(), "real.png", b"real");
        touch(dir.path(), "elsewhere/hidden.jpg", b"h");
        symlink(dir.path().join("real.png"), root.join("linked.png")).unwrap();
        symlink(dir.path().join("elsewhere"), root.join("more")).unwrap();
        symlink(dir.path().join("gone.png"), root.join("dangling.png")).unwrap();

        let files = discover_files(&root, &default_exts()).unwrap();
        assert_eq!(names(&files, &root), vec!["a.png", "linked.png"]);
        assert_eq!(files[1].size, 4);
        assert_eq!(files[1].kind, DocumentKind::Image);
    }

    #[test]
    fn records_kind_and_size() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.pdf", b"%PDF-1.7");
        touch(dir.path(), "b.jpg", b"jpg");

        let files = discover_files(dir.path(), &default_exts()).unwrap();
        assert_eq!(files[0].kind, DocumentKind::Pdf);
        assert_eq!(files[0].size, 8);
        assert_eq!(files[1].kind, DocumentKind::Image);
        assert_eq!(files[1].size, 3);
    }

    #[test]
    fn empty_directory_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let files = discover_files(dir.path(), &default_exts()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = discover_files(&dir.path().join("nope"), &default_exts()).unwrap_err();
        assert!(matches!(err, Ocr2TableError::InputDirNotFound { .. }));
    }

    #[test]
    fn file_as_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.png", b"x");
        let err = discover_files(&dir.path().join("a.png"), &default_exts()).unwrap_err();
        assert!(matches!(err, Ocr2TableError::InputNotADirectory { .. }));
    }

    #[tokio::test]
    async fn async_discover_uses_configured_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "x.tif", b"x");
        touch(dir.path(), "y.png", b"y");
        let config = ConversionConfig::builder()
            .input_dir(dir.path())
            .extensions(["tif"])
            .build()
            .unwrap();

        let files = discover(&config).await.unwrap();
        assert_eq!(names(&files, dir.path()), vec!["x.tif"]);
    }
}
