//! Drives one bootstrap from start to exit status.
//!
//! The run is strictly linear:
//! `Start -> WorkspaceAcquired -> Extracted -> EnvironmentBuilt -> ManifestRead
//! -> Invoked -> Cleaned -> Terminated`. Whatever happens after the workspace
//! is acquired, the isolated environment is closed and then the workspace is
//! torn down before [`Bootstrap::run`] returns.

use std::process::ExitCode;

use tracing::debug;

use crate::archive::SelfArchive;
use crate::config::Config;
use crate::entry::{entry_point_name, Failure, InvocationResult};
use crate::environment::{DylibLoader, IsolatedEnvironment, Loader};
use crate::error::{Error, Result};
use crate::extract::{extract, ExtractOptions};
use crate::interrupt::PendingCleanup;
use crate::workspace::Workspace;

/// Exit status for every kind of failure.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// Anything going wrong before the entry point was called.
    SetupFailed(Error),
    ApplicationFailed(Failure),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::SetupFailed(_) | Outcome::ApplicationFailed(_) => EXIT_FAILURE,
        }
    }

    /// Prints the failure, if any, to stderr and returns the exit status.
    pub fn report(self) -> ExitCode {
        let code = self.exit_code();
        match self {
            Outcome::Completed => {}
            Outcome::SetupFailed(error) => eprintln!("{:?}", miette::Report::new(error)),
            Outcome::ApplicationFailed(failure) => eprintln!("{}", failure),
        }
        ExitCode::from(code)
    }
}

pub struct Bootstrap<L: Loader = DylibLoader> {
    config: Config,
    loader: L,
    cleanup: Option<PendingCleanup>,
}

impl Bootstrap<DylibLoader> {
    pub fn new(config: Config) -> Self {
        Bootstrap {
            config,
            loader: DylibLoader,
            cleanup: None,
        }
    }
}

impl<L: Loader> Bootstrap<L> {
    /// Replaces how nested archives are loaded.
    pub fn with_loader<M: Loader>(self, loader: M) -> Bootstrap<M> {
        Bootstrap {
            config: self.config,
            loader,
            cleanup: self.cleanup,
        }
    }

    /// Arms `cleanup` with the workspace while it is live.
    pub fn with_cleanup(mut self, cleanup: PendingCleanup) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[tracing::instrument(skip_all, name = "bootstrap")]
    pub fn run(self, args: Vec<String>) -> Outcome {
        debug!("State: Start");

        let mut workspace = match Workspace::acquire(self.config.temp_root.as_deref()) {
            Ok(workspace) => workspace,
            Err(error) => return self.terminate(Outcome::SetupFailed(error)),
        };
        if let Some(cleanup) = &self.cleanup {
            workspace.guard(cleanup.clone());
        }
        debug!("State: WorkspaceAcquired");

        let outcome = match self.launch(&mut workspace, &args) {
            Ok(InvocationResult::Completed) => Outcome::Completed,
            Ok(InvocationResult::Failed(failure)) => Outcome::ApplicationFailed(failure),
            Err(error) => Outcome::SetupFailed(error),
        };

        workspace.teardown();
        debug!("State: Cleaned");

        self.terminate(outcome)
    }

    fn terminate(&self, outcome: Outcome) -> Outcome {
        debug!("State: Terminated({})", outcome.exit_code());
        outcome
    }

    fn launch(&self, workspace: &mut Workspace, args: &[String]) -> Result<InvocationResult> {
        let path = SelfArchive::locate(&self.config)?;
        let archive = SelfArchive::open(path)?;

        let options = ExtractOptions {
            nested_suffix: self.config.library_suffix.clone(),
        };
        let nested = extract(&archive, workspace, &options)?;
        debug!("State: Extracted ({} libraries)", nested.len());

        let mut environment = IsolatedEnvironment::build(nested, &self.loader);
        debug!("State: EnvironmentBuilt");

        let result = invoke(&archive, &mut environment, args);
        environment.close();
        result
    }
}

fn invoke<L: Loader>(
    archive: &SelfArchive,
    environment: &mut IsolatedEnvironment<L>,
    args: &[String],
) -> Result<InvocationResult> {
    let manifest = archive.manifest()?;
    let name = entry_point_name(&manifest)?;
    debug!("State: ManifestRead (Start-Class: {})", name);

    let entry = environment.resolve(name)?;
    let result = entry.invoke(args);
    debug!("State: Invoked");

    Ok(result)
}
