//! Directory-backed storage.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::traits::{
    Storage, StorageConfig, StorageError, StorageInput, StorageOutput, check_name,
};

/// Stores every file directly inside one directory.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    config: StorageConfig,
}

impl FileStorage {
    /// Open `root`, creating it if it does not exist.
    pub fn new<P: AsRef<Path>>(root: P, config: StorageConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let display = root.display().to_string();
        fs::create_dir_all(&root).map_err(|e| StorageError::io("create directory", &display, e))?;
        if !root.is_dir() {
            return Err(StorageError::InvalidName(display).into());
        }
        Ok(FileStorage { root, config })
    }

    /// The directory files live in.
    pub fn directory(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(name))
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.path_of(name)?).map_err(|e| StorageError::io("open", name, e))?;
        let size = file
            .metadata()
            .map_err(|e| StorageError::io("stat", name, e))?
            .len();
        Ok(Box::new(FileInput {
            reader: BufReader::with_capacity(self.config.buffer_size, file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file =
            File::create(self.path_of(name)?).map_err(|e| StorageError::io("create", name, e))?;
        Ok(Box::new(FileOutput {
            name: name.to_string(),
            writer: Some(BufWriter::with_capacity(self.config.buffer_size, file)),
            sync_writes: self.config.sync_writes,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.path_of(name).is_ok_and(|p| p.is_file())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_of(name)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(StorageError::io("delete", name, e).into())
            }
            _ => Ok(()),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let root = self.root.display().to_string();
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| StorageError::io("list", &root, e))? {
            let entry = entry.map_err(|e| StorageError::io("list", &root, e))?;
            let is_file = entry.file_type().is_ok_and(|t| t.is_file());
            if let (true, Ok(name)) = (is_file, entry.file_name().into_string()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let from = self.path_of(old_name)?;
        let to = self.path_of(new_name)?;
        fs::rename(from, to).map_err(|e| StorageError::io("rename", old_name, e))?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        // Renames are only durable once the directory entry itself is synced.
        #[cfg(unix)]
        {
            let root = self.root.display().to_string();
            File::open(&self.root)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| StorageError::io("sync", &root, e))?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

#[derive(Debug)]
struct FileOutput {
    name: String,
    writer: Option<BufWriter<File>>,
    sync_writes: bool,
}

impl FileOutput {
    fn finish(&self, writer: &mut BufWriter<File>) -> Result<()> {
        writer
            .flush()
            .map_err(|e| StorageError::io("flush", &self.name, e))?;
        if self.sync_writes {
            writer
                .get_ref()
                .sync_data()
                .map_err(|e| StorageError::io("sync", &self.name, e))?;
        }
        Ok(())
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other(format!("output '{}' is closed", self.name)))?;
        writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.as_mut().map_or(Ok(()), |w| w.flush())
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| StorageError::Closed(self.name.clone()))?;
        let result = self.finish(&mut writer);
        self.writer = Some(writer);
        result
    }

    fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => self.finish(&mut writer),
            None => Ok(()),
        }
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
