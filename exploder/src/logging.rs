use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. Lines carry the level, the active
/// operation span and the emitting module. `RUST_LOG` refines the default
/// level chosen by `debug`. Colour is only used when stderr is a terminal.
pub fn init(debug: bool) {
    let ansi = std::io::stderr().is_terminal();

    // Already installed when embedded in another process; keep theirs.
    let _ = tracing::subscriber::set_global_default(subscriber(debug, ansi, std::io::stderr));
}

fn subscriber<W>(debug: bool, ansi: bool, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .without_time()
        .finish()
}
