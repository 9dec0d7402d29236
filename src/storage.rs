//! Where header and sample files live.
//!
//! The reader and writer only ever address files by name relative to the
//! record, so the same pipeline runs over a directory on disk or over an
//! in-memory map.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Result, WfdbError};
use crate::filter::ByteRange;

/// Named byte files backing a record.
pub trait RecordStorage {
    /// Reads a whole file as UTF-8 text.
    fn read_text(&self, name: &str) -> Result<String>;

    /// Size of a file in bytes.
    fn file_len(&self, name: &str) -> Result<u64>;

    /// Reads exactly the bytes of `range` from a file.
    fn read_range(&self, name: &str, range: ByteRange) -> Result<Vec<u8>>;

    /// Creates or replaces a file.
    fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.write_bytes(name, text.as_bytes())
    }
}

impl<T: RecordStorage + ?Sized> RecordStorage for &mut T {
    fn read_text(&self, name: &str) -> Result<String> {
        (**self).read_text(name)
    }

    fn file_len(&self, name: &str) -> Result<u64> {
        (**self).file_len(name)
    }

    fn read_range(&self, name: &str, range: ByteRange) -> Result<Vec<u8>> {
        (**self).read_range(name, range)
    }

    fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(name, bytes)
    }

    fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        (**self).write_text(name, text)
    }
}

fn past_end(name: &str, range: ByteRange, len: u64) -> WfdbError {
    WfdbError::MalformedSampleData(format!(
        "{}: range {}..{} runs past the end of the file ({} bytes)",
        name,
        range.start(),
        range.end(),
        len
    ))
}

fn utf8_text(name: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| WfdbError::InvalidHeader(format!("{} is not UTF-8: {}", name, e)))
}

/// Files in one directory on disk. Every call opens the file it needs and
/// closes it before returning.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DirectoryStorage {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn open(&self, name: &str) -> Result<File> {
        let path = self.path(name);
        File::open(&path).map_err(|e| WfdbError::FileNotFound(format!("{}: {}", path.display(), e)))
    }
}

impl RecordStorage for DirectoryStorage {
    fn read_text(&self, name: &str) -> Result<String> {
        let mut bytes = Vec::new();
        self.open(name)?.read_to_end(&mut bytes)?;
        utf8_text(name, bytes)
    }

    fn file_len(&self, name: &str) -> Result<u64> {
        Ok(self.open(name)?.metadata()?.len())
    }

    fn read_range(&self, name: &str, range: ByteRange) -> Result<Vec<u8>> {
        trace!(file = name, start = range.start(), end = range.end(), "reading byte range");
        let mut file = self.open(name)?;
        let len = file.metadata()?.len();
        if range.end() > len {
            return Err(past_end(name, range, len));
        }
        file.seek(SeekFrom::Start(range.start()))?;
        let mut buffer = vec![0u8; range.total() as usize];
        file.read_exact(&mut buffer).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => past_end(name, range, len),
            _ => WfdbError::Io(e),
        })?;
        Ok(buffer)
    }

    fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        trace!(file = name, len = bytes.len(), "writing file");
        fs::write(self.path(name), bytes)?;
        Ok(())
    }
}

/// Files held in memory, keyed by name.
///
/// # Examples
///
/// ```rust
/// use wfdb::{ByteRange, MemoryStorage, RecordStorage};
///
/// let mut storage = MemoryStorage::new();
/// storage.insert("100.dat", vec![1, 0, 2, 0]);
/// assert_eq!(storage.file_len("100.dat")?, 4);
/// assert_eq!(storage.read_range("100.dat", ByteRange::new(2, 4)?)?, vec![2, 0]);
/// assert!(storage.read_range("100.dat", ByteRange::new(2, 6)?).is_err());
/// # Ok::<(), wfdb::WfdbError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.files.insert(name.to_string(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Names of the stored files, sorted.
    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.files.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn file(&self, name: &str) -> Result<&Vec<u8>> {
        self.files
            .get(name)
            .ok_or_else(|| WfdbError::FileNotFound(name.to_string()))
    }
}

impl RecordStorage for MemoryStorage {
    fn read_text(&self, name: &str) -> Result<String> {
        utf8_text(name, self.file(name)?.clone())
    }

    fn file_len(&self, name: &str) -> Result<u64> {
        Ok(self.file(name)?.len() as u64)
    }

    fn read_range(&self, name: &str, range: ByteRange) -> Result<Vec<u8>> {
        let bytes = self.file(name)?;
        let len = bytes.len() as u64;
        if range.end() > len {
            return Err(past_end(name, range, len));
        }
        Ok(bytes[range.start() as usize..range.end() as usize].to_vec())
    }

    fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.insert(name, bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::new();
        storage.write_text("r.hea", "r 0\n").unwrap();
        storage.write_bytes("r.dat", &[1, 2, 3]).unwrap();
        assert_eq!(storage.read_text("r.hea").unwrap(), "r 0\n");
        assert_eq!(storage.file_names(), vec!["r.dat", "r.hea"]);
        assert!(matches!(storage.file_len("missing.dat"), Err(WfdbError::FileNotFound(_))));
        assert!(matches!(
            storage.read_range("r.dat", ByteRange::new(1, 4).unwrap()),
            Err(WfdbError::MalformedSampleData(_))
        ));
    }

    #[test]
    fn test_directory_storage() {
        let dir = std::env::temp_dir().join(format!("wfdb_storage_{}", std::process::id()));
        let mut storage = DirectoryStorage::new(&dir);
        storage.write_bytes("s.dat", &[9, 8, 7, 6]).unwrap();
        assert_eq!(storage.file_len("s.dat").unwrap(), 4);
        assert_eq!(storage.read_range("s.dat", ByteRange::new(1, 3).unwrap()).unwrap(), vec![8, 7]);
        assert!(matches!(
            storage.read_range("s.dat", ByteRange::new(2, 9).unwrap()),
            Err(WfdbError::MalformedSampleData(_))
        ));
        assert!(matches!(storage.read_text("none.hea"), Err(WfdbError::FileNotFound(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_utf8_header_is_invalid_header() {
        let bytes = [b'r', b' ', 0xff, 0xfe];
        let mut memory = MemoryStorage::new();
        memory.write_bytes("bad.hea", &bytes).unwrap();
        assert!(matches!(memory.read_text("bad.hea"), Err(WfdbError::InvalidHeader(_))));

        // 磁盘与内存返回同一种错误
        let dir = std::env::temp_dir().join(format!("wfdb_storage_utf8_{}", std::process::id()));
        let mut directory = DirectoryStorage::new(&dir);
        directory.write_bytes("bad.hea", &bytes).unwrap();
        assert!(matches!(directory.read_text("bad.hea"), Err(WfdbError::InvalidHeader(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mut_reference_is_storage() {
        fn write_into<S: RecordStorage>(mut storage: S) {
            storage.write_bytes("a", &[1]).unwrap();
        }
        let mut storage = MemoryStorage::new();
        write_into(&mut storage);
        assert_eq!(storage.get("a"), Some(&[1u8][..]));
    }
}
