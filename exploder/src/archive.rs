use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, MANIFEST_PATH};

/// The archive this process was launched from.
///
/// Usually the running executable itself with a zip payload appended; the
/// zip reader locates the central directory from the end of the file, so any
/// leading bytes are skipped.
pub struct SelfArchive {
    path: PathBuf,
    map: Mmap,
}

impl std::fmt::Debug for SelfArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfArchive")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

impl SelfArchive {
    /// Path of the archive to explode: the configured override, or the
    /// running executable.
    pub fn locate(config: &Config) -> Result<PathBuf> {
        match &config.archive {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|source| Error::LocateSelf { source }),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<SelfArchive> {
        let path = path.as_ref();
        let path = std::fs::canonicalize(path).map_err(|source| Error::OpenArchive {
            path: path.to_path_buf(),
            source,
        })?;

        let file = std::fs::File::open(&path).map_err(|source| Error::OpenArchive {
            path: path.clone(),
            source,
        })?;

        // The mapping is read-only and the archive is not expected to change
        // while the bootstrap runs.
        let map = unsafe { Mmap::map(&file) }.map_err(|source| Error::OpenArchive {
            path: path.clone(),
            source,
        })?;

        let archive = SelfArchive { path, map };
        let entries = archive.reader()?.len();
        debug!("Archive [{}] holds {} entries", archive.path.display(), entries);

        Ok(archive)
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh zip view over the mapped archive.
    pub fn reader(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(&self.map[..])).map_err(|source| Error::ReadArchive {
            path: self.path.clone(),
            source,
        })
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let mut reader = self.reader()?;
        let mut entry = match reader.by_name(MANIFEST_PATH) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(Error::MissingManifest {
                    path: self.path.clone(),
                })
            }
            Err(source) => {
                return Err(Error::ReadArchive {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        // The declared size comes from the archive and is not trusted.
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| Error::ReadArchive {
                path: self.path.clone(),
                source: source.into(),
            })?;

        Manifest::from_bytes(&bytes).map_err(|source| Error::InvalidManifest {
            path: self.path.clone(),
            source,
        })
    }
}
