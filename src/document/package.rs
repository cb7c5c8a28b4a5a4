use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use tracing::{debug, trace};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{DocumentError, DocumentFormat};

/// Failures inside an OOXML package, before they are attributed to a format.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("part {0} is not valid UTF-8")]
    Encoding(String),

    #[error("missing part {0}")]
    MissingPart(String),

    #[error("invalid content in {part}: {message}")]
    Invalid { part: String, message: String },
}

impl PackageError {
    pub fn invalid(part: &str, message: impl Into<String>) -> Self {
        PackageError::Invalid {
            part: part.to_string(),
            message: message.into(),
        }
    }

    pub fn into_document_error(self, format: DocumentFormat) -> DocumentError {
        DocumentError::Malformed {
            format,
            message: self.to_string(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An OOXML zip container held fully in memory.
///
/// Entries keep their original order and compression so that re-packing only
/// changes the parts a caller explicitly replaces.
#[derive(Debug)]
pub struct Package {
    entries: Vec<Entry>,
}

/// Upper bound on the total unpacked size of one package.
pub const MAX_UNPACKED_BYTES: u64 = 256 * 1024 * 1024;

impl Package {
    pub fn open(bytes: &[u8]) -> Result<Self, PackageError> {
        Self::open_with_limit(bytes, MAX_UNPACKED_BYTES)
    }

    /// Loads every entry, failing as soon as the declared or actual unpacked
    /// size of the archive passes `limit`. Declared sizes are never used to
    /// size buffers.
    pub fn open_with_limit(bytes: &[u8], limit: u64) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut unpacked = 0u64;

        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            let name = file.name().to_string();
            let budget = limit.saturating_sub(unpacked);
            if file.size() > budget {
                return Err(PackageError::invalid(
                    &name,
                    format!("entry declares {} bytes, over the {} byte limit", file.size(), limit),
                ));
            }

            let compression = file.compression();
            let is_dir = file.is_dir();
            let mut data = Vec::new();
            file.take(budget.saturating_add(1)).read_to_end(&mut data)?;
            unpacked += data.len() as u64;
            if unpacked > limit {
                return Err(PackageError::invalid(
                    &name,
                    format!("archive unpacks to more than {} bytes", limit),
                ));
            }

            trace!("Loaded package part {} ({} bytes)", name, data.len());
            entries.push(Entry {
                name,
                data,
                compression,
                is_dir,
            });
        }

        debug!("Opened package with {} entries, {} bytes unpacked", entries.len(), unpacked);
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| !entry.is_dir && entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], PackageError> {
        self.part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.name.as_str())
    }

    /// Re-packs the archive, substituting the bytes of every part named in
    /// `replacements`.
    pub fn write(&self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(method);

            if entry.is_dir {
                writer.add_directory(entry.name.clone(), options)?;
                continue;
            }

            writer.start_file(entry.name.clone(), options)?;
            let data = replacements.get(&entry.name).unwrap_or(&entry.data);
            writer.write_all(data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}
