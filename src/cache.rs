use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::NucError;

const EXTENSION: &str = "fasta";

/// Identifier-addressed artifact store. Fetch logic only talks to this trait,
/// so freshness or eviction policy can live in an implementation.
pub trait SequenceCache {
    fn has(&self, id: &str) -> bool;

    /// Raw cached bytes, or `None` when nothing is stored for `id`.
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, NucError>;

    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), NucError>;

    /// Store everything `reader` yields. Returns the number of bytes written.
    fn put_reader(&self, id: &str, reader: &mut dyn Read) -> Result<u64, NucError> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|source| NucError::Cache {
                path: PathBuf::from(id),
                source,
            })?;
        self.put(id, &buf)?;
        Ok(buf.len() as u64)
    }
}

/// One `<id>.fasta` file per record inside `dir`. Existence is the only
/// freshness check: a present file is reused as-is.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>.fasta`. Callers validate `id` first.
    #[must_use]
    pub fn path(&self, id: &str) -> PathBuf {
        self.dir.join(file_name(id))
    }

    fn partial_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!(".{}.part", file_name(id)))
    }

    fn ensure_dir(&self) -> Result<(), NucError> {
        fs::create_dir_all(&self.dir).map_err(|source| NucError::Cache {
            path: self.dir.clone(),
            source,
        })
    }

    /// Write through a sibling `.part` file and rename into place, so a failed
    /// download never leaves a file that a later run would treat as cached.
    fn write_atomic(
        &self,
        id: &str,
        fill: impl FnOnce(&mut BufWriter<File>) -> io::Result<u64>,
    ) -> Result<u64, NucError> {
        self.ensure_dir()?;
        let partial = self.partial_path(id);
        let target = self.path(id);

        let result = File::create(&partial).and_then(|file| {
            let mut writer = BufWriter::new(file);
            let written = fill(&mut writer)?;
            writer.flush()?;
            Ok(written)
        });

        let written = match result {
            Ok(n) => n,
            Err(source) => {
                let _ = fs::remove_file(&partial);
                return Err(NucError::Cache {
                    path: partial,
                    source,
                });
            }
        };

        fs::rename(&partial, &target).map_err(|source| NucError::Cache {
            path: target.clone(),
            source,
        })?;
        debug!(path = %target.display(), bytes = written, "cached record");
        Ok(written)
    }
}

impl SequenceCache for DiskCache {
    fn has(&self, id: &str) -> bool {
        self.path(id).is_file()
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, NucError> {
        let path = self.path(id);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(NucError::Cache { path, source }),
        }
    }

    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), NucError> {
        self.write_atomic(id, |w| {
            w.write_all(bytes)?;
            Ok(bytes.len() as u64)
        })
        .map(|_| ())
    }

    fn put_reader(&self, id: &str, reader: &mut dyn Read) -> Result<u64, NucError> {
        self.write_atomic(id, |w| io::copy(reader, w))
    }
}

#[must_use]
pub fn file_name(id: &str) -> String {
    format!("{id}.{EXTENSION}")
}

/// Identifiers become file names, so anything that could escape the cache
/// directory is rejected.
pub fn validate_id(id: &str) -> Result<&str, NucError> {
    let trimmed = id.trim();
    let bad = trimmed.is_empty()
        || trimmed != id
        || id == "."
        || id == ".."
        || id
            .bytes()
            .any(|b| matches!(b, b'/' | b'\\' | b'\0') || b.is_ascii_control());
    if bad {
        Err(NucError::InvalidIdentifier { id: id.to_string() })
    } else {
        Ok(id)
    }
}
