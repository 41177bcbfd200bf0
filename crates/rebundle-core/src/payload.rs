use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::PackageError;
use crate::variant::{FileClass, Variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    pub source: PathBuf,
    /// Path relative to the payload root, as found on disk.
    pub relative: PathBuf,
    pub class: FileClass,
}

impl PayloadFile {
    fn new(source: PathBuf, relative: PathBuf) -> Self {
        let class = FileClass::of(&relative);
        Self {
            source,
            relative,
            class,
        }
    }

    /// Archive entry name: `/`-separated, with the variant extension removed
    /// from variant-specific files.
    #[must_use]
    pub fn archive_name(&self) -> String {
        let destination = match self.class {
            FileClass::Common => self.relative.clone(),
            FileClass::VariantSpecific(_) => self.relative.with_extension(""),
        };

        destination
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Every file under the payload root, sorted by full path.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    files: Vec<PayloadFile>,
}

impl Payload {
    /// Recursively list the files under `root`.
    ///
    /// A missing root yields an empty payload.
    ///
    /// # Errors
    /// Returns an error if a directory below the root cannot be read.
    pub fn scan(root: &Path) -> Result<Self, PackageError> {
        if !root.exists() {
            warn!("Payload directory {} does not exist", root.display());
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|error| PackageError::walk("failed to scan payload", error))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let source = entry.into_path();
            let Ok(relative) = source.strip_prefix(root).map(Path::to_path_buf) else {
                continue;
            };
            files.push(PayloadFile::new(source, relative));
        }

        files.sort_by(|a, b| a.source.as_os_str().cmp(b.source.as_os_str()));
        debug!("Found {} payload files in {}", files.len(), root.display());

        Ok(Self { files })
    }

    #[must_use]
    pub fn files(&self) -> &[PayloadFile] {
        &self.files
    }

    /// Files to embed in the archive for `variant`, in payload order.
    pub fn files_for(&self, variant: Variant) -> impl Iterator<Item = &PayloadFile> {
        self.files
            .iter()
            .filter(move |file| file.class.applies_to(variant))
    }
}
