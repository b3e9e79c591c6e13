//! Run command - headless tracker.
//!
//! Polls the vehicle feed, reconciles each snapshot and logs the resulting
//! presentation events until Ctrl+C.

use std::sync::Arc;

use livetransit::animation::MotionAnimator;
use livetransit::config::{ConfigKey, LiveConfig};
use livetransit::engine::{PresentationSink, ReconciliationEngine, VehicleEvent};
use livetransit::persistence::JsonFileSelectionPersistence;
use livetransit::poller::{Poller, Visibility};
use livetransit::projection::WebMercatorProjection;
use livetransit::selection::SelectionStore;
use livetransit::source::HttpSnapshotSource;
use livetransit::trips::TripTable;
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Arguments for the run command.
pub struct RunArgs {
    pub api_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub trip_table: Option<String>,
}

/// Sink that writes presentation events to the log.
#[derive(Debug, Default)]
pub struct LoggingSink {
    events: u64,
}

impl PresentationSink for LoggingSink {
    fn on_event(&mut self, event: VehicleEvent) {
        self.events += 1;
        match event {
            VehicleEvent::Created(view) => info!(
                id = %view.id,
                line = %view.line,
                mode = %view.mode,
                lat = view.position.lat,
                lon = view.position.lon,
                "Vehicle appeared: {}",
                view.label
            ),
            VehicleEvent::Updated {
                view,
                restyle,
                pop,
                motion,
            } => debug!(
                id = %view.id,
                heading = ?view.heading,
                restyle,
                pop,
                motion = ?motion,
                "Vehicle moved"
            ),
            VehicleEvent::Removed { id } => info!(id = %id, "Vehicle gone"),
        }
    }
}

/// Run the run command.
pub fn run(args: RunArgs, mut config: LiveConfig) -> Result<(), CliError> {
    if let Some(url) = args.api_url {
        ConfigKey::PollApiUrl.set(&mut config, &url)?;
    }
    if let Some(ms) = args.interval_ms {
        ConfigKey::PollIntervalMs.set(&mut config, &ms.to_string())?;
    }
    if let Some(path) = args.trip_table {
        ConfigKey::StorageTripTable.set(&mut config, &path)?;
    }
    config.validate()?;

    let trips = load_trips(&config)?;
    let selection = SelectionStore::load(Arc::new(JsonFileSelectionPersistence::new(
        &config.storage.selection_file,
    )));
    let engine = ReconciliationEngine::new(
        selection,
        Arc::new(trips),
        Arc::new(WebMercatorProjection::new(config.animation.projection_zoom)),
    )
    .with_bearing_estimator(config.bearing.estimator())
    .with_animator(MotionAnimator::new(config.animation.clone()));

    let source = HttpSnapshotSource::reqwest(&config.poll.api_url, config.poll.request_timeout)?;

    println!("Tracking vehicles from {}", config.poll.api_url);
    println!("  Poll interval: {} ms", config.poll.interval.as_millis());
    println!("  Selection:     {}", engine.selection());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async move {
        let handle = Poller::new(source, engine, LoggingSink::default(), &config.poll)
            .with_frame_interval(config.animation.frame_interval)
            .spawn(Visibility::Visible);

        let shutdown = handle.shutdown_token();
        ctrlc::set_handler(move || {
            println!();
            println!("Received shutdown signal, stopping...");
            shutdown.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

        Ok::<_, CliError>(handle.join().await)
    })?;

    info!(
        cycles = summary.cycles,
        failures = summary.failures,
        skipped = summary.skipped,
        "Tracker stopped"
    );
    println!(
        "Stopped after {} cycles ({} failed, {} skipped).",
        summary.cycles, summary.failures, summary.skipped
    );
    Ok(())
}

/// Load the trip table, running with an empty one if the file is absent.
fn load_trips(config: &LiveConfig) -> Result<TripTable, CliError> {
    let path = &config.storage.trip_table;
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Trip table not found, every vehicle will be shown as unknown"
        );
        return Ok(TripTable::new());
    }
    Ok(TripTable::load(path)?)
}
