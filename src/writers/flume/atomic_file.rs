//! Rename-on-success file writes
//!
//! Data lands in `<final>__<rand>.tmp` next to its destination and is
//! renamed into place only after a complete write, so readers never see a
//! partial file under the final name.

use crate::core::error::{LoggerError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) const TMP_MARKER: &str = "__";
pub(crate) const TMP_SUFFIX: &str = ".tmp";

static USE_FADVISE: AtomicBool = AtomicBool::new(true);

/// Drop written file data from the page cache after each atomic write.
/// Spool files are read once by the downstream picker; keeping them cached
/// only evicts hotter pages.
pub fn enable_fadvise() {
    USE_FADVISE.store(true, Ordering::Relaxed);
}

pub fn disable_fadvise() {
    USE_FADVISE.store(false, Ordering::Relaxed);
}

/// True for in-flight files of the atomic writer.
pub fn is_writer_tmp_file(name: &str) -> bool {
    name.ends_with(TMP_SUFFIX)
}

/// Strip the in-flight marker: `table.x.tmp__Ab12.tmp` -> `table.x`.
pub fn tmp_to_final_name(name: &str) -> String {
    match name.find(TMP_MARKER) {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name.to_string(),
    }
}

#[cfg(target_os = "linux")]
fn fadvise_dont_need(file: &File) {
    use std::os::unix::io::AsRawFd;
    if USE_FADVISE.load(Ordering::Relaxed) {
        unsafe {
            libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn fadvise_dont_need(_file: &File) {}

/// Write `data` to `path` through a temp file in the same directory,
/// renaming on success. Any failure removes the temp file and surfaces the
/// error.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> Result<usize> {
    let dir = path
        .parent()
        .ok_or_else(|| LoggerError::writer(format!("no parent directory: {}", path.display())))?;
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LoggerError::writer(format!("bad file name: {}", path.display())))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{}{}", base, TMP_MARKER))
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| LoggerError::io_operation("creating temp file", dir.display().to_string(), e))?;

    tmp.write_all(data)
        .map_err(|e| LoggerError::io_operation("writing temp file", base.to_string(), e))?;
    tmp.flush()
        .map_err(|e| LoggerError::io_operation("flushing temp file", base.to_string(), e))?;

    fadvise_dont_need(tmp.as_file());

    // persist is a rename; on failure the returned temp file is dropped,
    // which removes it.
    tmp.persist(path)
        .map_err(|e| LoggerError::io_operation("renaming temp file", base.to_string(), e.error))?;

    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_rename() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("table.0.2024-01-02.1.1.uuid.3");

        let n = write_file_atomic(&target, b"a\nb\nc\n").expect("atomic write");
        assert_eq!(n, 6);
        assert_eq!(std::fs::read(&target).unwrap(), b"a\nb\nc\n");

        // No in-flight leftovers.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| is_writer_tmp_file(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_directory_errors() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("absent").join("file");
        assert!(write_file_atomic(&target, b"x").is_err());
    }

    #[test]
    fn test_tmp_name_helpers() {
        assert!(is_writer_tmp_file("svc.0.2024-01-02.1.1.u.7__aB3x.tmp"));
        assert!(!is_writer_tmp_file("svc.0.2024-01-02.1.1.u.7"));
        assert_eq!(
            tmp_to_final_name("svc.0.2024-01-02.1.1.u.7__aB3x.tmp"),
            "svc.0.2024-01-02.1.1.u.7"
        );
        assert_eq!(tmp_to_final_name("plain"), "plain");
    }
}
