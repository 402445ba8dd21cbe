use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::SelfArchive;
use crate::error::{Error, Result};
use crate::workspace::Workspace;

/// Size of the buffer entries are streamed through. Memory use during
/// extraction does not grow with entry size.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Extracted files whose name ends with this suffix are libraries for
    /// the search path.
    pub nested_suffix: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            nested_suffix: std::env::consts::DLL_SUFFIX.to_string(),
        }
    }
}

/// Explodes every entry of `archive` into `workspace`, in stored order.
///
/// Returns the absolute paths of the extracted libraries in the order they
/// were met. Any failure aborts the extraction; whatever was already written
/// stays registered with the workspace for teardown.
#[tracing::instrument(skip_all, name = "extract")]
pub fn extract(
    archive: &SelfArchive,
    workspace: &mut Workspace,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>> {
    let mut reader = archive.reader()?;
    let mut nested = Vec::new();

    for index in 0..reader.len() {
        let mut entry = reader
            .by_index(index)
            .map_err(|source| Error::ReadEntry { index, source })?;

        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::UnsafeEntryPath { name: name.clone() })?;

        if entry.is_dir() {
            info!("Create directory [{}]", name);
            workspace.create_dir_all(&relative)?;
            continue;
        }

        info!("Saving file [{}]", name);
        let (target, file) = workspace.create_file(&relative)?;
        let written = copy_entry(&mut entry, file, &target)?;
        debug!("Wrote {} bytes to [{}]", written, target.display());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
                std::fs::set_permissions(&target, permissions).ok();
            }
        }

        if is_nested_archive(&target, &options.nested_suffix) {
            debug!("Library [{}] added to search path", target.display());
            nested.push(target);
        }
    }

    Ok(nested)
}

fn copy_entry<R: Read>(entry: &mut R, file: File, target: &Path) -> Result<u64> {
    let map_err = |source| Error::ExtractFile {
        path: target.to_path_buf(),
        source,
    };

    let mut out = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);
    let written = std::io::copy(entry, &mut out).map_err(map_err)?;
    out.flush().map_err(map_err)?;
    Ok(written)
}

fn is_nested_archive(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}
