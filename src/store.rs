//! Abstract, read-only view of the shared directory used by command
//! handlers, and a filesystem-backed implementation of it.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Failure modes a [`FileStore`] can report.  These map onto the wire-visible
/// status codes in [`crate::handlers`], not Rust panics or unwinds.
#[derive(Debug)]
pub enum StoreError {
  /// No such file.
  NotFound,

  /// The name, once joined onto the store's root, exceeds a filesystem or
  /// path-length limit.
  NameTooLong,

  /// The name refers to a directory, not a regular file.
  IsDirectory,

  /// Any other I/O failure (permissions, etc).
  Other(io::Error)
}

impl From<io::Error> for StoreError {
  fn from(err: io::Error) -> Self {
    match err.kind() {
      io::ErrorKind::NotFound => StoreError::NotFound,
      _ => {
        if err.raw_os_error() == Some(libc_enametoolong()) {
          StoreError::NameTooLong
        } else {
          StoreError::Other(err)
        }
      }
    }
  }
}

/// `ENAMETOOLONG`.  Hard-coded rather than pulled in via a `libc` dependency
/// for a single constant; this is the value on Linux (and most other
/// unix-like targets this server is expected to run on).
fn libc_enametoolong() -> i32 {
  36
}

/// Abstract, read-only view of a shared directory.
///
/// Names are raw bytes.  By the time a handler calls into a `FileStore` the
/// wire codec has already validated that `name` matches the protocol's
/// `[A-Za-z0-9._-]+` filename charset, so implementations may assume `name`
/// is valid ASCII and contains no path separators.
pub trait FileStore: Send + Sync {
  /// List the directory's entries.
  fn list(&self) -> Result<Vec<Vec<u8>>, StoreError>;

  /// Return the size, in bytes, of the named file.
  fn size(&self, name: &[u8]) -> Result<u64, StoreError>;

  /// Read exactly `len` bytes starting at `offset` from the named file.
  fn read(&self, name: &[u8], offset: u64, len: u64) -> Result<Vec<u8>, StoreError>;
}

/// A [`FileStore`] backed by a real directory on disk.
pub struct DirStore {
  root: PathBuf
}

impl DirStore {
  /// Create a new store rooted at `root`.  Does not check that `root`
  /// exists; that's the CLI layer's job at startup (see [`crate::config`]).
  pub fn new<P: Into<PathBuf>>(root: P) -> Self {
    DirStore { root: root.into() }
  }

  fn path_for(&self, name: &[u8]) -> PathBuf {
    // Non-goal: path traversal prevention beyond the filename charset.  The
    // codec has already restricted `name` to `[A-Za-z0-9._-]+`; we join it
    // directly and rely on that charset, not on canonicalization here.
    let name = String::from_utf8_lossy(name);
    self.root.join(name.as_ref())
  }
}

impl FileStore for DirStore {
  fn list(&self) -> Result<Vec<Vec<u8>>, StoreError> {
    let entries = fs::read_dir(&self.root)?;
    let mut names = Vec::new();
    for entry in entries {
      let entry = entry?;
      let file_type = entry.file_type()?;
      if !file_type.is_file() {
        continue;
      }
      names.push(entry.file_name().to_string_lossy().into_owned().into_bytes());
    }
    Ok(names)
  }

  fn size(&self, name: &[u8]) -> Result<u64, StoreError> {
    let path = self.path_for(name);
    let meta = fs::metadata(&path)?;
    if meta.is_dir() {
      return Err(StoreError::IsDirectory);
    }
    Ok(meta.len())
  }

  fn read(&self, name: &[u8], offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
    use std::io::{Read, Seek, SeekFrom};

    let path = self.path_for(name);
    let meta = fs::metadata(&path)?;
    if meta.is_dir() {
      return Err(StoreError::IsDirectory);
    }

    let mut f = fs::File::open(&path)?;
    f.seek(SeekFrom::Start(offset))?;

    let mut buf = vec![0u8; len as usize];
    f.read_exact(&mut buf)?;
    Ok(buf)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use std::path::Path;

  fn write_file(dir: &Path, name: &str, content: &[u8]) {
    let mut f = fs::File::create(dir.join(name)).unwrap();
    f.write_all(content).unwrap();
  }

  #[test]
  fn list_returns_regular_files_only() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"hello");
    write_file(tmp.path(), "b.txt", b"world");
    fs::create_dir(tmp.path().join("subdir")).unwrap();

    let store = DirStore::new(tmp.path());
    let mut names = store.list().unwrap();
    names.sort();
    assert_eq!(names, vec![b"a.txt".to_vec(), b"b.txt".to_vec()]);
  }

  #[test]
  fn size_of_existing_file() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"hello");
    let store = DirStore::new(tmp.path());
    assert_eq!(store.size(b"a.txt").unwrap(), 5);
  }

  #[test]
  fn size_of_missing_file_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DirStore::new(tmp.path());
    assert!(matches!(store.size(b"nope"), Err(StoreError::NotFound)));
  }

  #[test]
  fn size_of_directory_is_is_directory() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("subdir")).unwrap();
    let store = DirStore::new(tmp.path());
    assert!(matches!(store.size(b"subdir"), Err(StoreError::IsDirectory)));
  }

  #[test]
  fn read_exact_slice() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"hello");
    let store = DirStore::new(tmp.path());
    let data = store.read(b"a.txt", 1, 3).unwrap();
    assert_eq!(data, b"ell");
  }

  #[test]
  fn read_past_end_is_other_error() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "a.txt", b"hello");
    let store = DirStore::new(tmp.path());
    // Handlers are responsible for bounds-checking against size() before
    // calling read(); if they don't, the underlying read_exact fails.
    assert!(store.read(b"a.txt", 3, 10).is_err());
  }
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
