//! A self-extracting application bootstrap.
//!
//! The `exploder` binary carries a zip archive appended to itself. On start it
//! explodes the archive into a private temporary [`Workspace`], puts every
//! extracted library on an ordered [`IsolatedEnvironment`], resolves the entry
//! point named by the manifest's `Start-Class` key and calls it with the
//! process arguments. See [`Bootstrap`] for the whole run.

pub mod archive;
pub mod config;
pub mod entry;
pub mod environment;
pub mod error;
pub mod extract;
pub mod interrupt;
pub mod lifecycle;
pub mod logging;
pub mod manifest;
#[cfg(test)]
mod testing;
pub mod workspace;

pub use archive::SelfArchive;
pub use config::Config;
pub use entry::{entry_point_name, EntryPoint, Failure, InvocationResult};
pub use environment::{DylibLoader, IsolatedEnvironment, LoadError, Loader, Module, StaticLoader};
pub use error::{Error, ErrorKind, Result};
pub use extract::{extract, ExtractOptions};
pub use interrupt::PendingCleanup;
pub use lifecycle::{Bootstrap, Outcome, EXIT_FAILURE};
pub use manifest::{Manifest, ManifestError};
pub use workspace::Workspace;
