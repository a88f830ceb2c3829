//! In-memory storage, used by tests and small runs.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageOutput, check_name};

type Files = Arc<RwLock<BTreeMap<String, Arc<[u8]>>>>;

/// Files held in a shared map. Clones see the same files.
///
/// An output is published when it is closed or dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Files,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of published files.
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Contents of `name`, if published.
    pub fn contents(&self, name: &str) -> Option<Arc<[u8]>> {
        self.files.read().get(name).cloned()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self
            .contents(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(Box::new(MemoryInput(Cursor::new(data))))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        check_name(name)?;
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Some(Vec::new()),
            files: Arc::clone(&self.files),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.write().remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        check_name(new_name)?;
        let mut files = self.files.write();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::NotFound(old_name.to_string()))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryInput(Cursor<Arc<[u8]>>);

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.0.get_ref().len() as u64)
    }
}

/// Buffers writes; `None` once published.
#[derive(Debug)]
struct MemoryOutput {
    name: String,
    buffer: Option<Vec<u8>>,
    files: Files,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| std::io::Error::other(format!("output '{}' is closed", self.name)))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        match self.buffer {
            Some(_) => Ok(()),
            None => Err(StorageError::Closed(self.name.clone()).into()),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(buffer) = self.buffer.take() {
            self.files.write().insert(self.name.clone(), buffer.into());
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
