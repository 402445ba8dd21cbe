//! The isolated search path built from the libraries found during extraction.
//!
//! Libraries are searched in the order they were extracted and the first one
//! exporting a name wins. Loading is lazy: a library is only opened when a
//! lookup reaches it. Nothing is validated up front, so a broken library shows
//! up as a resolution failure.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use exploder_abi::{ExportTable, ExportsFn, ABI_VERSION, EXPORTS_SYMBOL};
use libloading::Library;
use miette::Diagnostic;
use tracing::debug;

use crate::entry::EntryPoint;
use crate::error::{Error, Result};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum LoadError {
    #[error("Cannot open shared library")]
    Open(#[source] libloading::Error),

    #[error("Library does not export `exploder_exports_v1`")]
    #[diagnostic(help("Publish an export table with `exploder_abi::export_library!`"))]
    MissingExports(#[source] libloading::Error),

    #[error("Library returned a null export table")]
    NullTable,

    #[error("Library was built for ABI version {actual}, expected {expected}")]
    AbiMismatch { expected: u32, actual: u32 },

    #[error("No library registered under the name `{name}`")]
    NotRegistered { name: String },

    #[error("Cannot unload shared library")]
    Close(#[source] libloading::Error),
}

/// A loaded library.
pub trait Module {
    fn exports(&self) -> &ExportTable;

    /// Releases the library. Its exports must not be used afterwards.
    fn close(self: Box<Self>) -> std::result::Result<(), LoadError> {
        Ok(())
    }
}

/// Turns a library path into a [`Module`].
pub trait Loader {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn Module>, LoadError>;
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn Module>, LoadError> {
        (**self).load(path)
    }
}

/// Loads native shared libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

struct DylibModule {
    table: *const ExportTable,
    library: Library,
}

impl Loader for DylibLoader {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn Module>, LoadError> {
        // Loading runs the library's initialisers; the archive is trusted.
        let library = unsafe { Library::new(path) }.map_err(LoadError::Open)?;

        let exports: ExportsFn = unsafe {
            *library
                .get::<ExportsFn>(EXPORTS_SYMBOL)
                .map_err(LoadError::MissingExports)?
        };

        let table = unsafe { exports() };
        unsafe { check_table(table) }?;

        Ok(Box::new(DylibModule { table, library }))
    }
}

/// Checks a table returned by a library's exports function.
///
/// # Safety
/// `table` must be null or point to a live `ExportTable`.
unsafe fn check_table(table: *const ExportTable) -> std::result::Result<(), LoadError> {
    if table.is_null() {
        return Err(LoadError::NullTable);
    }

    let actual = (*table).abi_version();
    if actual != ABI_VERSION {
        return Err(LoadError::AbiMismatch {
            expected: ABI_VERSION,
            actual,
        });
    }
    Ok(())
}

impl Module for DylibModule {
    fn exports(&self) -> &ExportTable {
        // The table lives in the library's static data, which stays mapped
        // until `close`.
        unsafe { &*self.table }
    }

    fn close(self: Box<Self>) -> std::result::Result<(), LoadError> {
        self.library.close().map_err(LoadError::Close)
    }
}

/// Serves export tables linked into the current binary, keyed by library
/// file name.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    tables: HashMap<OsString, &'static ExportTable>,
}

struct StaticModule(&'static ExportTable);

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Into<OsString>>(mut self, file_name: S, table: &'static ExportTable) -> Self {
        self.tables.insert(file_name.into(), table);
        self
    }
}

impl Loader for StaticLoader {
    fn load(&self, path: &Path) -> std::result::Result<Box<dyn Module>, LoadError> {
        path.file_name()
            .and_then(|name| self.tables.get(name))
            .map(|table| Box::new(StaticModule(*table)) as Box<dyn Module>)
            .ok_or_else(|| LoadError::NotRegistered {
                name: path.display().to_string(),
            })
    }
}

impl Module for StaticModule {
    fn exports(&self) -> &ExportTable {
        self.0
    }
}

pub struct IsolatedEnvironment<L: Loader = DylibLoader> {
    search_path: Vec<PathBuf>,
    loaded: Vec<Box<dyn Module>>,
    loader: L,
}

impl<L: Loader> std::fmt::Debug for IsolatedEnvironment<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedEnvironment")
            .field("search_path", &self.search_path)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

impl<L: Loader> IsolatedEnvironment<L> {
    pub fn build(search_path: Vec<PathBuf>, loader: L) -> Self {
        for (index, path) in search_path.iter().enumerate() {
            debug!("Search path [{}]: {}", index, path.display());
        }

        IsolatedEnvironment {
            search_path,
            loaded: Vec::new(),
            loader,
        }
    }

    #[inline(always)]
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Number of libraries opened so far.
    #[inline(always)]
    pub fn loaded(&self) -> usize {
        self.loaded.len()
    }

    /// Finds the entry point `name`, searching libraries in order.
    #[tracing::instrument(skip(self), name = "resolve")]
    pub fn resolve(&mut self, name: &str) -> Result<EntryPoint<'_>> {
        for index in 0..self.search_path.len() {
            if index == self.loaded.len() {
                let path = &self.search_path[index];
                debug!("Loading library [{}]", path.display());
                let module = self.loader.load(path).map_err(|source| Error::LoadLibrary {
                    path: path.clone(),
                    source,
                })?;
                self.loaded.push(module);
            }

            let found = self.loaded[index]
                .exports()
                .find(name)
                .map(|export| (export.as_main(), export.kind()));

            let path = &self.search_path[index];
            match found {
                Some((Some(main), _)) => {
                    debug!("Found [{}] in [{}]", name, path.display());
                    return Ok(EntryPoint::new(name, path.clone(), main));
                }
                Some((None, kind)) => {
                    return Err(Error::EntryPointSignature {
                        name: name.to_string(),
                        path: path.clone(),
                        kind,
                    })
                }
                None => continue,
            }
        }

        Err(Error::EntryPointNotFound {
            name: name.to_string(),
            searched: self.search_path.len(),
        })
    }

    /// Unloads every loaded library, newest first. Must happen before the
    /// workspace holding the library files is torn down.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.loaded.is_empty() {
            return;
        }

        while let Some(module) = self.loaded.pop() {
            if let Err(err) = module.close() {
                debug!("Could not unload library: {}", err);
            }
        }
        debug!("Isolated environment released");
    }
}

impl<L: Loader> Drop for IsolatedEnvironment<L> {
    fn drop(&mut self) {
        self.release();
    }
}
