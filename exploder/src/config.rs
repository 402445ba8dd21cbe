//! Startup configuration, read once from the environment.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Enables debug output when set to `1`, `true`, `yes` or `on`.
pub const DEBUG_VAR: &str = "EXPLODER_DEBUG";
/// Overrides the archive to explode; defaults to the running executable.
pub const ARCHIVE_VAR: &str = "EXPLODER_ARCHIVE";
/// Directory in which the workspace is created; defaults to the system temp dir.
pub const TMPDIR_VAR: &str = "EXPLODER_TMPDIR";
/// File name suffix marking an extracted entry as a library to load.
pub const LIBRARY_SUFFIX_VAR: &str = "EXPLODER_LIBRARY_SUFFIX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub debug: bool,
    pub archive: Option<PathBuf>,
    pub temp_root: Option<PathBuf>,
    pub library_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            archive: None,
            temp_root: None,
            library_suffix: std::env::consts::DLL_SUFFIX.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Config {
        Self::from_vars(|key| std::env::var_os(key))
    }

    /// Builds a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_vars<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let defaults = Config::default();

        Config {
            debug: var(DEBUG_VAR).map(|v| parse_flag(&v)).unwrap_or(false),
            archive: var(ARCHIVE_VAR).map(PathBuf::from),
            temp_root: var(TMPDIR_VAR).map(PathBuf::from),
            library_suffix: var(LIBRARY_SUFFIX_VAR)
                .map(|v| v.to_string_lossy().into_owned())
                .unwrap_or(defaults.library_suffix),
        }
    }
}

fn parse_flag(value: &OsStr) -> bool {
    let value = value.to_string_lossy();
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}
