use std::process::ExitCode;

use exploder::{interrupt, logging, Bootstrap, Config, PendingCleanup, EXIT_FAILURE};
use tracing::warn;

fn main() -> ExitCode {
    let config = Config::from_env();
    logging::init(config.debug);

    let cleanup = PendingCleanup::new();
    if let Err(error) = interrupt::install(cleanup.clone(), |_| {
        std::process::exit(i32::from(EXIT_FAILURE))
    }) {
        warn!("{}; the workspace will not be removed on interrupt", error);
    }

    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    Bootstrap::new(config)
        .with_cleanup(cleanup)
        .run(args)
        .report()
}
