//! Storage backends for the flat-file stores.
//!
//! The block list, action journal and alert store only ever need three
//! operations on a named text file: read it whole, append to it, or
//! replace it. `FileStorage` maps keys to paths under a root directory;
//! `MemoryStorage` keeps everything in a map for tests.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors that can occur while persisting state
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("CSV error on {key}: {source}")]
    Csv {
        key: String,
        #[source]
        source: csv::Error,
    },
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Text-file store keyed by relative name
pub trait Storage: Send + Sync {
    /// Whole contents, or `None` when the key has never been written
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Append `data` to the end of `key`, creating it if needed
    fn append(&self, key: &str, data: &str) -> Result<(), StorageError>;
    /// Replace the contents of `key` with `data`
    fn rewrite(&self, key: &str, data: &str) -> Result<(), StorageError>;
    /// Size in bytes, or `None` when the key has never been written
    fn size(&self, key: &str) -> Result<Option<u64>, StorageError>;
    /// Final byte, or `None` when the key is absent or empty
    fn last_byte(&self, key: &str) -> Result<Option<u8>, StorageError>;

    /// Append `line` as a record of a newline-delimited file
    ///
    /// A previous record left without its terminator is closed first.
    fn append_line(&self, key: &str, line: &str) -> Result<(), StorageError> {
        let mut data = String::with_capacity(line.len() + 2);
        if matches!(self.last_byte(key)?, Some(byte) if byte != b'\n') {
            data.push('\n');
        }
        data.push_str(line);
        data.push('\n');
        self.append(key, &data)
    }
}

/// Files under a root directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn ensure_parent(&self, key: &str, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(key, source))?;
        }
        Ok(())
    }
}

fn io_error(key: &str, source: io::Error) -> StorageError {
    StorageError::Io { key: key.to_string(), source }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn append(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        self.ensure_parent(key, &path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(key, e))?;
        file.write_all(data.as_bytes()).map_err(|e| io_error(key, e))?;
        // A crash after this point must not lose the record
        file.sync_data().map_err(|e| io_error(key, e))
    }

    fn rewrite(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        self.ensure_parent(key, &path)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(|e| io_error(key, e))?;
        file.write_all(data.as_bytes()).map_err(|e| io_error(key, e))?;
        file.sync_all().map_err(|e| io_error(key, e))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|e| io_error(key, e))
    }

    fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        match fs::metadata(self.path_for(key)) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn last_byte(&self, key: &str) -> Result<Option<u8>, StorageError> {
        let mut file = match fs::File::open(self.path_for(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key, e)),
        };
        let len = file.metadata().map_err(|e| io_error(key, e))?.len();
        if len == 0 {
            return Ok(None);
        }
        file.seek(SeekFrom::End(-1)).map_err(|e| io_error(key, e))?;
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte).map_err(|e| io_error(key, e))?;
        Ok(Some(byte[0]))
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(files.get(key).cloned())
    }

    fn append(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        files.entry(key.to_string()).or_default().push_str(data);
        Ok(())
    }

    fn rewrite(&self, key: &str, data: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        files.insert(key.to_string(), data.to_string());
        Ok(())
    }

    fn size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(files.get(key).map(|contents| contents.len() as u64))
    }

    fn last_byte(&self, key: &str) -> Result<Option<u8>, StorageError> {
        let files = self.files.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(files.get(key).and_then(|contents| contents.as_bytes().last().copied()))
    }
}
