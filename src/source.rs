//! Workbook sources: a file on disk or an uploaded byte buffer.
//!
//! The [`SourceKey`] of a source is its identity for the load cache: a path
//! plus its modification time and length, or a hash of the buffer contents.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::LoadError;

/// Tabular file formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkbookFormat {
    /// Excel family and OpenDocument (.xls, .xlsx, .xlsm, .xlsb, .ods)
    Excel,
    /// Comma-separated values; loaded as a single sheet
    Csv,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

impl WorkbookFormat {
    /// Detect format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Guess the format from leading bytes: zip and OLE containers are workbooks,
    /// anything else is treated as CSV text.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(ZIP_MAGIC) || data.starts_with(OLE_MAGIC) {
            Self::Excel
        } else {
            Self::Csv
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkbookSource {
    Path(PathBuf),
    /// Raw bytes, e.g. from an upload. `name` is used for display and as the
    /// sheet name of CSV content.
    Bytes { name: String, data: Vec<u8> },
}

/// Identity of a source as seen by the load cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    File {
        path: PathBuf,
        modified: Option<SystemTime>,
        len: u64,
    },
    Bytes {
        name: String,
        digest: u64,
        len: usize,
    },
}

impl SourceKey {
    /// True when both keys name the same file or upload, regardless of content.
    pub fn same_origin(&self, other: &SourceKey) -> bool {
        match (self, other) {
            (SourceKey::File { path: a, .. }, SourceKey::File { path: b, .. }) => a == b,
            (SourceKey::Bytes { name: a, .. }, SourceKey::Bytes { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl WorkbookSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        WorkbookSource::Path(path.into())
    }

    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        WorkbookSource::Bytes {
            name: name.into(),
            data,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            WorkbookSource::Path(path) => path.display().to_string(),
            WorkbookSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Name used for the single sheet of a CSV source: the file stem.
    pub fn stem(&self) -> String {
        let name = match self {
            WorkbookSource::Path(path) => path.as_path(),
            WorkbookSource::Bytes { name, .. } => Path::new(name.as_str()),
        };
        name.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sheet1".to_string())
    }

    pub fn key(&self) -> Result<SourceKey, LoadError> {
        match self {
            WorkbookSource::Path(path) => {
                let meta = fs::metadata(path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(SourceKey::File {
                    path: path.clone(),
                    modified: meta.modified().ok(),
                    len: meta.len(),
                })
            }
            WorkbookSource::Bytes { name, data } => {
                let mut hasher = DefaultHasher::new();
                data.hash(&mut hasher);
                Ok(SourceKey::Bytes {
                    name: name.clone(),
                    digest: hasher.finish(),
                    len: data.len(),
                })
            }
        }
    }

    pub fn read(&self) -> Result<Cow<'_, [u8]>, LoadError> {
        match self {
            WorkbookSource::Path(path) => {
                let data = fs::read(path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(Cow::Owned(data))
            }
            WorkbookSource::Bytes { data, .. } => Ok(Cow::Borrowed(data.as_slice())),
        }
    }

    /// Format from the name's extension, falling back to sniffing the content.
    pub fn format(&self, data: &[u8]) -> WorkbookFormat {
        let by_name = match self {
            WorkbookSource::Path(path) => WorkbookFormat::from_path(path),
            WorkbookSource::Bytes { name, .. } => WorkbookFormat::from_path(Path::new(name)),
        };
        by_name.unwrap_or_else(|| WorkbookFormat::sniff(data))
    }
}
