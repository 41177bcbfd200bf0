//! In-memory zip editing.
//!
//! An [`ArchiveBuilder`] starts from an existing archive, keeps its entries in
//! their original order, and lets files be inserted or replaced before the
//! whole thing is serialized again. Output is deterministic: every entry is
//! deflated and stamped with the zip epoch.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::PackageError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    unix_mode: Option<u32>,
    kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl ArchiveBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every entry of a zip archive.
    ///
    /// # Errors
    /// Returns an error if `bytes` is not a readable zip archive.
    pub fn from_zip(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|error| PackageError::zip("failed to read zip archive", error))?;
        let mut builder = Self::new();

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|error| PackageError::zip("failed to read zip entry", error))?;
            let name = entry.name().to_string();
            let unix_mode = entry.unix_mode();

            let kind = if entry.is_dir() {
                EntryKind::Directory
            } else {
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|error| PackageError::io("failed to decompress zip entry", error))?;
                EntryKind::File(data)
            };

            builder.put(ArchiveEntry {
                name,
                unix_mode,
                kind,
            });
        }

        Ok(builder)
    }

    /// Insert a file, replacing any entry of the same name in place.
    /// Missing parent directories are added ahead of a new entry.
    pub fn insert_file(&mut self, name: &str, data: Vec<u8>) {
        let name = name.trim_start_matches('/');
        if !self.index.contains_key(name) {
            self.ensure_parents(name);
        }

        let unix_mode = self
            .index
            .get(name)
            .and_then(|&position| self.entries[position].unix_mode);
        self.put(ArchiveEntry {
            name: name.to_string(),
            unix_mode,
            kind: EntryKind::File(data),
        });
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        let position = *self.index.get(name)?;
        match &self.entries[position].kind {
            EntryKind::File(data) => Some(data),
            EntryKind::Directory => None,
        }
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the archive.
    ///
    /// # Errors
    /// Returns an error if an entry cannot be written.
    pub fn finish(self) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in self.entries {
            let mut options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(zip::DateTime::default());
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }

            match entry.kind {
                EntryKind::Directory => writer
                    .add_directory(entry.name.as_str(), options)
                    .map_err(|error| PackageError::zip("failed to add directory entry", error))?,
                EntryKind::File(data) => {
                    writer
                        .start_file(entry.name.as_str(), options)
                        .map_err(|error| PackageError::zip("failed to start file entry", error))?;
                    writer
                        .write_all(&data)
                        .map_err(|error| PackageError::io("failed to write file entry", error))?;
                }
            }
        }

        let cursor = writer
            .finish()
            .map_err(|error| PackageError::zip("failed to finalize zip archive", error))?;
        Ok(cursor.into_inner())
    }

    fn put(&mut self, entry: ArchiveEntry) {
        if let Some(&position) = self.index.get(&entry.name) {
            self.entries[position] = entry;
        } else {
            self.index.insert(entry.name.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    fn ensure_parents(&mut self, name: &str) {
        let mut end = 0;
        while let Some(offset) = name[end..].find('/') {
            end += offset + 1;
            let directory = &name[..end];
            if !self.index.contains_key(directory) {
                self.put(ArchiveEntry {
                    name: directory.to_string(),
                    unix_mode: None,
                    kind: EntryKind::Directory,
                });
            }
        }
    }
}

/// Read one file out of a zip archive by its exact entry name.
///
/// # Errors
/// Returns an error if the archive cannot be read or has no such file.
pub fn extract_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>, PackageError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| PackageError::zip("failed to read auxiliary archive", error))?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) if entry.is_file() => entry,
        Ok(_) | Err(zip::result::ZipError::FileNotFound) => {
            return Err(PackageError::Invalid(format!(
                "auxiliary archive has no entry named {name}"
            )));
        }
        Err(error) => return Err(PackageError::zip("failed to read auxiliary entry", error)),
    };

    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|error| PackageError::io("failed to decompress auxiliary entry", error))?;
    Ok(data)
}
