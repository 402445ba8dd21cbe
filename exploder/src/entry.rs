use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use exploder_abi::{MainFn, RawArgs, RawStr, Reporter};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::{Manifest, START_CLASS};

/// The entry point named by the manifest's `Start-Class` key.
pub fn entry_point_name(manifest: &Manifest) -> Result<&str> {
    manifest
        .get(START_CLASS)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(Error::MissingEntryPoint)
}

/// A resolved entry point. Only valid while the environment it was resolved
/// from keeps its library loaded.
pub struct EntryPoint<'env> {
    name: String,
    origin: PathBuf,
    main: MainFn,
    _env: PhantomData<&'env ()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    Completed,
    Failed(Failure),
}

/// A failed invocation: which entry point failed and what it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub entry_point: String,
    pub trace: String,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.trace)
    }
}

impl std::fmt::Debug for EntryPoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}

impl<'env> EntryPoint<'env> {
    pub(crate) fn new(name: &str, origin: PathBuf, main: MainFn) -> Self {
        EntryPoint {
            name: name.to_string(),
            origin,
            main,
            _env: PhantomData,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The library the entry point was found in.
    #[inline(always)]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Calls the entry point with `args`, passed through unchanged.
    pub fn invoke(&self, args: &[String]) -> InvocationResult {
        info!("Calling startup class [{}]", self.name);
        debug!("Startup class lives in [{}]", self.origin.display());

        let raw: Vec<RawStr<'_>> = args.iter().map(|arg| RawStr::new(arg)).collect();
        let mut trace = String::new();

        // The environment keeps the library loaded for 'env, and the guest
        // side of the ABI never unwinds into this frame.
        let status = unsafe { (self.main)(RawArgs::new(&raw), Reporter::collecting(&mut trace)) };

        if status.is_ok() {
            debug!("Startup class [{}] completed", self.name);
            return InvocationResult::Completed;
        }

        if trace.is_empty() {
            trace = format!("Startup class [{}] failed with status {}", self.name, status.0);
        }

        InvocationResult::Failed(Failure {
            entry_point: self.name.clone(),
            trace,
        })
    }
}
