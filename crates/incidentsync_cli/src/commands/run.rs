//! Run command implementation.

use crate::settings::Settings;
use incidentsync_engine::Supervisor;
use std::time::Duration;
use tracing::info;

/// How long loops may finish in-flight work after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// How long the runtime waits for abandoned loop threads before exiting.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the supervisor until Ctrl-C.
pub fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    // The blocking HTTP clients must be created outside the runtime.
    let supervisor =
        Supervisor::new(settings.build_context()?).with_shutdown_grace(SHUTDOWN_GRACE);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("incidentsync")
        .build()?;

    let result = runtime.block_on(supervisor.run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result?;

    let forward = supervisor.forward().stats();
    let retry = supervisor.reconciler().stats();
    info!(
        delivered = forward.delivered + retry.delivered,
        deferred = forward.deferred,
        discarded = retry.discarded,
        errors = forward.errors + retry.errors,
        "incidentsync stopped"
    );
    Ok(())
}
