//! Workspace removal when the process is interrupted.
//!
//! `SIGINT` and `SIGTERM` arrive while the main thread may be deep inside the
//! packaged application, so the signal handler only records the signal. A
//! watcher thread notices it, removes whichever workspace is armed in the
//! shared [`PendingCleanup`] and ends the process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The workspace root to remove if the process is interrupted. Cloned handles
/// share the same slot.
#[derive(Debug, Clone, Default)]
pub struct PendingCleanup(Arc<Mutex<Option<PathBuf>>>);

impl PendingCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, root: &Path) {
        debug!("[{}] will be deleted on interrupt", root.display());
        *self.slot() = Some(root.to_path_buf());
    }

    pub fn disarm(&self) {
        self.slot().take();
    }

    pub fn armed(&self) -> Option<PathBuf> {
        self.slot().clone()
    }

    /// Removes the armed directory and disarms. Returns the removed path.
    pub fn run(&self) -> Option<PathBuf> {
        let mut slot = self.slot();
        let root = slot.take()?;
        match std::fs::remove_dir_all(&root) {
            Ok(()) => debug!("Deleted temporary directory [{}]", root.display()),
            Err(err) => debug!("Could not delete [{}]: {}", root.display(), err),
        }
        Some(root)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        // A poisoned slot still holds a valid path.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Installs the `SIGINT`/`SIGTERM` handlers. On a signal the armed workspace
/// is removed and `on_signal` is called with the signal number; the binary
/// passes a function that exits the process.
#[cfg(unix)]
pub fn install<F>(cleanup: PendingCleanup, on_signal: F) -> Result<()>
where
    F: Fn(i32) + Send + 'static,
{
    unix::install(cleanup, on_signal)
}

#[cfg(not(unix))]
pub fn install<F>(_cleanup: PendingCleanup, _on_signal: F) -> Result<()>
where
    F: Fn(i32) + Send + 'static,
{
    debug!("Interrupt cleanup is not supported on this platform");
    Ok(())
}

#[cfg(unix)]
mod unix {
    use std::os::raw::c_int;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

    use super::*;

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Last signal received, 0 when none is pending.
    static RECEIVED: AtomicI32 = AtomicI32::new(0);

    extern "C" fn record(signal: c_int) {
        RECEIVED.store(signal, Ordering::SeqCst);
    }

    pub(super) fn install<F>(cleanup: PendingCleanup, on_signal: F) -> Result<()>
    where
        F: Fn(i32) + Send + 'static,
    {
        let action = SigAction::new(
            SigHandler::Handler(record),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for kind in [Signal::SIGINT, Signal::SIGTERM] {
            unsafe { signal::sigaction(kind, &action) }.map_err(|errno| {
                Error::InstallSignalHandler {
                    signal: kind.as_str(),
                    source: errno.into(),
                }
            })?;
        }

        std::thread::Builder::new()
            .name("exploder-interrupt".into())
            .spawn(move || loop {
                std::thread::sleep(POLL_INTERVAL);
                let received = RECEIVED.swap(0, Ordering::SeqCst);
                if received == 0 {
                    continue;
                }

                warn!("Interrupted by signal {}, cleaning up", received);
                cleanup.run();
                on_signal(received);
            })
            .map_err(|source| Error::InstallSignalHandler {
                signal: "watcher",
                source,
            })?;

        debug!("Interrupt handlers installed (SIGINT, SIGTERM)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_removes_the_armed_directory_once() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("explodedXYZ");
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("lib/app.so"), b"payload").unwrap();

        let cleanup = PendingCleanup::new();
        let shared = cleanup.clone();
        cleanup.arm(&root);
        assert_eq!(shared.armed(), Some(root.clone()));

        assert_eq!(shared.run(), Some(root.clone()));
        assert!(!root.exists());
        assert_eq!(cleanup.armed(), None);
        assert_eq!(cleanup.run(), None);
    }

    #[test]
    fn disarmed_cleanup_leaves_the_directory() {
        let base = tempfile::tempdir().unwrap();
        let cleanup = PendingCleanup::new();
        cleanup.arm(base.path());
        cleanup.disarm();

        assert_eq!(cleanup.run(), None);
        assert!(base.path().is_dir());
    }

    #[test]
    fn missing_directory_is_tolerated() {
        let base = tempfile::tempdir().unwrap();
        let cleanup = PendingCleanup::new();
        cleanup.arm(&base.path().join("already-gone"));
        assert!(cleanup.run().is_some());
    }
}
