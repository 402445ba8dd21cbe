//! Library-side half of the ABI: turns a plain Rust entry point into one that
//! is safe to call across the boundary.

use std::any::Any;
use std::error::Error;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};

use crate::{RawArgs, Reporter, Status};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Calls `main` with the bootstrap's arguments.
///
/// An `Err` is reported with its full cause chain and a panic with its
/// payload; either way the call returns [`Status::FAILED`] instead of
/// unwinding into the caller.
pub fn run_main<F, E>(main: F, args: RawArgs<'_>, reporter: Reporter<'_>) -> Status
where
    F: FnOnce(&[String]) -> Result<(), E>,
    E: Into<BoxError>,
{
    let args: Vec<String> = args
        .as_slice()
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect();

    match panic::catch_unwind(AssertUnwindSafe(|| main(&args))) {
        Ok(Ok(())) => Status::OK,
        Ok(Err(error)) => {
            let error: BoxError = error.into();
            reporter.report(&render_error(&*error));
            Status::FAILED
        }
        Err(payload) => {
            reporter.report(&render_panic(&*payload));
            Status::FAILED
        }
    }
}

pub fn render_error(error: &(dyn Error + 'static)) -> String {
    let mut out = format!("Error: {}", error);
    let mut source = error.source();
    if source.is_some() {
        out.push_str("\n\nCaused by:");
    }
    let mut depth = 0;
    while let Some(cause) = source {
        let _ = write!(out, "\n    {}: {}", depth, cause);
        depth += 1;
        source = cause.source();
    }
    out
}

pub fn render_panic(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "Box<dyn Any>"
    };
    format!("Entry point panicked: {}", message)
}
