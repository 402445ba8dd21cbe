//! The temporary directory an archive is exploded into.
//!
//! Every directory and file created through a [`Workspace`] is recorded in a
//! deletion registry at the moment it is created. [`Workspace::teardown`]
//! walks the registry newest-first, removes what it can and then removes the
//! root. Teardown also runs on drop, so an early return or a panic still
//! cleans up.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::interrupt::PendingCleanup;

const PREFIX: &str = "exploder";

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    registry: Vec<PathBuf>,
    dir: Option<TempDir>,
    cleanup: Option<PendingCleanup>,
}

impl Workspace {
    /// Creates a fresh, empty directory under `temp_root`, or the system temp
    /// dir when `None`.
    pub fn acquire(temp_root: Option<&Path>) -> Result<Workspace> {
        let base = temp_root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(&base)
            .map_err(|source| Error::CreateWorkspace {
                path: base.clone(),
                source,
            })?;

        let root = dir
            .path()
            .canonicalize()
            .map_err(|source| Error::CreateWorkspace { path: base, source })?;

        info!("Temporary directory is: {}", root.display());
        debug!("Directory [{}] will be deleted on exit", root.display());

        Ok(Workspace {
            root,
            registry: Vec::new(),
            dir: Some(dir),
            cleanup: None,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Paths scheduled for deletion, in creation order.
    #[inline(always)]
    pub fn registered(&self) -> &[PathBuf] {
        &self.registry
    }

    /// Arms `cleanup` with this workspace's root until teardown, so an
    /// interrupt removes it too.
    pub fn guard(&mut self, cleanup: PendingCleanup) {
        cleanup.arm(&self.root);
        self.cleanup = Some(cleanup);
    }

    pub fn register(&mut self, path: PathBuf) {
        debug!("[{}] will be deleted on exit", path.display());
        self.registry.push(path);
    }

    /// Creates `relative` and any missing ancestors, registering each
    /// directory actually created.
    pub fn create_dir_all(&mut self, relative: &Path) -> Result<PathBuf> {
        let components = checked_components(relative)?;
        let mut current = self.root.clone();

        for component in components {
            current.push(component);
            if current.is_dir() {
                continue;
            }
            fs::create_dir(&current).map_err(|source| Error::CreateDirectory {
                path: current.clone(),
                source,
            })?;
            self.register(current.clone());
        }

        Ok(current)
    }

    /// Creates (or truncates) the file at `relative`. The file is registered
    /// before it is created.
    pub fn create_file(&mut self, relative: &Path) -> Result<(PathBuf, File)> {
        let components = checked_components(relative)?;
        if components.is_empty() {
            return Err(Error::UnsafeEntryPath {
                name: relative.display().to_string(),
            });
        }

        if let Some(parent) = relative.parent() {
            self.create_dir_all(parent)?;
        }

        let target = components
            .iter()
            .fold(self.root.clone(), |path, component| path.join(component));

        self.register(target.clone());
        let file = File::create(&target).map_err(|source| Error::CreateFile {
            path: target.clone(),
            source,
        })?;

        Ok((target, file))
    }

    /// Removes every registered path, newest first, then the root. Individual
    /// failures are logged and skipped. Runs at most once.
    pub fn teardown(&mut self) {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => return,
        };

        for path in self.registry.drain(..).rev() {
            let result = match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir(&path),
                Ok(_) => fs::remove_file(&path),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => Err(err),
            };

            if let Err(err) = result {
                debug!("Could not delete [{}]: {}", path.display(), err);
            }
        }

        let root = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!("Deleted temporary directory [{}]", root.display()),
            Err(err) => debug!("Could not delete [{}]: {}", root.display(), err),
        }

        if let Some(cleanup) = self.cleanup.take() {
            cleanup.disarm();
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The normal components of `relative`, or an error if it could point
/// anywhere but below the workspace root.
fn checked_components(relative: &Path) -> Result<Vec<&std::ffi::OsStr>> {
    let mut out = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeEntryPath {
                    name: relative.display().to_string(),
                })
            }
        }
    }
    Ok(out)
}
