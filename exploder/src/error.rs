use std::path::PathBuf;

use miette::Diagnostic;
use zip::result::ZipError;

use crate::environment::LoadError;
use crate::manifest::ManifestError;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of bootstrap failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Workspace handling, archive access or extraction.
    Io,
    /// The archive's manifest is missing or incomplete.
    Config,
    /// The entry point could not be found on the search path.
    Resolution,
    /// The entry point exists but is not callable as one.
    Signature,
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Cannot locate the running executable")]
    #[diagnostic(code(exploder::io))]
    LocateSelf {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open archive `{}`", .path.display())]
    #[diagnostic(code(exploder::io))]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read archive `{}`", .path.display())]
    #[diagnostic(
        code(exploder::io),
        help("Is a zip archive appended to this executable?")
    )]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("Cannot read archive entry #{index}")]
    #[diagnostic(code(exploder::io))]
    ReadEntry {
        index: usize,
        #[source]
        source: ZipError,
    },

    #[error("Archive entry `{name}` does not resolve to a path inside the workspace")]
    #[diagnostic(code(exploder::io))]
    UnsafeEntryPath { name: String },

    #[error("Cannot create temporary directory in `{}`", .path.display())]
    #[diagnostic(code(exploder::io))]
    CreateWorkspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create directory `{}`", .path.display())]
    #[diagnostic(code(exploder::io))]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create file `{}`", .path.display())]
    #[diagnostic(code(exploder::io))]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot extract file `{}`", .path.display())]
    #[diagnostic(code(exploder::io))]
    ExtractFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot install the {signal} interrupt handler")]
    #[diagnostic(code(exploder::io))]
    InstallSignalHandler {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive `{}` has no manifest", .path.display())]
    #[diagnostic(
        code(exploder::config),
        help("Add a META-INF/MANIFEST.MF entry declaring `Start-Class`")
    )]
    MissingManifest { path: PathBuf },

    #[error("Cannot parse the manifest of archive `{}`", .path.display())]
    #[diagnostic(code(exploder::config))]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Manifest must contain a Start-Class entry in the main part of the manifest")]
    #[diagnostic(
        code(exploder::config),
        help("Add a line such as `Start-Class: com.example.App` before the first blank line")
    )]
    MissingEntryPoint,

    #[error("Cannot load library `{}`", .path.display())]
    #[diagnostic(code(exploder::resolution))]
    LoadLibrary {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("Entry point `{name}` was not found in any of {searched} libraries")]
    #[diagnostic(
        code(exploder::resolution),
        help("Libraries are only picked up from archive entries ending in the library suffix")
    )]
    EntryPointNotFound { name: String, searched: usize },

    #[error("Export `{name}` in `{}` is not an entry point (export kind {kind})", .path.display())]
    #[diagnostic(code(exploder::signature))]
    EntryPointSignature {
        name: String,
        path: PathBuf,
        kind: u32,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LocateSelf { .. }
            | Error::OpenArchive { .. }
            | Error::ReadArchive { .. }
            | Error::ReadEntry { .. }
            | Error::UnsafeEntryPath { .. }
            | Error::CreateWorkspace { .. }
            | Error::CreateDirectory { .. }
            | Error::CreateFile { .. }
            | Error::ExtractFile { .. }
            | Error::InstallSignalHandler { .. } => ErrorKind::Io,
            Error::MissingManifest { .. }
            | Error::InvalidManifest { .. }
            | Error::MissingEntryPoint => ErrorKind::Config,
            Error::LoadLibrary { .. } | Error::EntryPointNotFound { .. } => ErrorKind::Resolution,
            Error::EntryPointSignature { .. } => ErrorKind::Signature,
        }
    }
}
