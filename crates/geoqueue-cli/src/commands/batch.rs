use std::process::ExitCode;
use std::sync::Arc;

use geoqueue_core::{
    BatchEvent, BatchOrchestrator, BatchSummary, GeocoderConfig, ResolutionChainBuilder,
    RunReport, RunState,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use super::print_json;
use crate::cli::BatchArgs;
use crate::error::CliError;
use crate::store::JsonFileStore;

pub async fn run(args: &BatchArgs, config: GeocoderConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let store = Arc::new(JsonFileStore::load(&args.input)?);
    let chain = ResolutionChainBuilder::new(config.clone()).build();
    if chain.is_empty() {
        return Err(CliError::Command(String::from(
            "no provider is available; check the provider list and API keys",
        )));
    }

    let orchestrator = Arc::new(BatchOrchestrator::new(
        Arc::new(chain),
        store.clone(),
        store.clone(),
        config.orchestrator_config(),
    ));
    let listener = tokio::spawn(report_progress(orchestrator.subscribe()));

    let mut handle = Arc::clone(&orchestrator).spawn();
    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupt received; stopping after the current batch");
            orchestrator.stop();
            handle.await
        }
    };
    let result = joined.map_err(|error| CliError::Command(format!("batch task aborted: {error}")))?;
    let snapshot = orchestrator.snapshot();

    // Dropping the last sender lets the listener drain and exit.
    drop(orchestrator);
    if let Err(error) = listener.await {
        warn!(error = %error, "progress listener ended abnormally");
    }

    let (summary, failure) = match result {
        Ok(RunReport::Completed(job)) => (BatchSummary::from_job(RunState::Completed, &job), None),
        Ok(RunReport::Stopped(job)) => (BatchSummary::from_job(RunState::Stopped, &job), None),
        Ok(RunReport::AlreadyRunning) => {
            return Err(CliError::Command(String::from("a batch run is already active")));
        }
        Err(error) => (BatchSummary::failed(&snapshot, error.to_string()), Some(error)),
    };

    if failure.is_none() && !args.dry_run {
        let output = args.output.as_deref().unwrap_or(&args.input);
        store
            .save(output)
            .map_err(|error| CliError::Store(format!("{}: {error}", output.display())))?;
        info!(path = %output.display(), "records written");
    }

    print_json(&summary, pretty)?;
    match failure {
        Some(error) => Err(error.into()),
        None => Ok(ExitCode::SUCCESS),
    }
}

async fn report_progress(mut events: broadcast::Receiver<BatchEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => eprintln!("{}", progress_line(&event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "progress listener fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn progress_line(event: &BatchEvent) -> String {
    let state = event.state();
    let eta = state
        .estimated_seconds_remaining
        .map(|seconds| format!(", ~{seconds}s left"))
        .unwrap_or_default();
    let line = format!(
        "[{:>3}%] {}/{} processed ({} ok, {} errors{eta})",
        state.percentage, state.processed, state.total, state.successful, state.errors
    );
    match event {
        BatchEvent::Progress(_) => line,
        BatchEvent::Completed(_) => format!("✓ {line}"),
        BatchEvent::Stopped(_) => format!("■ stopped {line}"),
        BatchEvent::Error { error, .. } => format!("✗ {error} {line}"),
    }
}
