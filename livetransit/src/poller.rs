//! Periodic snapshot polling.
//!
//! The [`Poller`] is a single tokio task that owns the
//! [`ReconciliationEngine`] and drives it from four inputs:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Poller task                          │
//! │                                                               │
//! │  shutdown token ───► exit                                     │
//! │  visibility     ───► suspend / resume + catch-up cycle        │
//! │  commands       ───► selection edit + refresh                 │
//! │  poll tick      ───► start cycle (no-op while one in flight)  │
//! │  fetch complete ───► reconcile, release busy guard            │
//! │  frame tick     ───► advance animations                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The fetch future is polled alongside the frame tick, so animations keep
//! running while a request is outstanding. Entity state is only touched from
//! this task.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::animation::DEFAULT_FRAME_INTERVAL;
use crate::engine::{PresentationSink, ReconciliationEngine, SelectionCommand};
use crate::error::SourceError;
use crate::snapshot::VehicleSnapshot;
use crate::source::{SnapshotSource, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};

// =============================================================================
// Configuration
// =============================================================================

/// Default interval between snapshot fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Polling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Live feed endpoint.
    pub api_url: String,
    /// Interval between cycles.
    pub interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// =============================================================================
// Busy guard
// =============================================================================

/// Flag allowing at most one cycle in flight.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the flag, or `None` if a cycle is already running.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`BusyFlag`] on drop.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// Control surface
// =============================================================================

/// Host visibility. Polling is suspended while hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Requests sent to a running poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerCommand {
    /// Run a cycle now, unless one is already in flight or the host is hidden.
    Refresh,
    /// Edit the selection, then refresh. While hidden only the edit is applied;
    /// the catch-up cycle on resume picks it up.
    Select(SelectionCommand),
}

/// Counters reported when the poller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerSummary {
    /// Cycles that fetched and reconciled successfully.
    pub cycles: u64,
    /// Cycles aborted by a fetch error.
    pub failures: u64,
    /// Cycle requests ignored because one was already in flight.
    pub skipped: u64,
}

/// Handle to a spawned poller.
#[derive(Debug)]
pub struct PollerHandle {
    visibility: watch::Sender<Visibility>,
    commands: mpsc::UnboundedSender<PollerCommand>,
    shutdown: CancellationToken,
    busy: BusyFlag,
    task: JoinHandle<PollerSummary>,
}

impl PollerHandle {
    /// Report a host visibility change.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_replace(visibility);
    }

    /// Request an immediate cycle.
    pub fn refresh(&self) {
        let _ = self.commands.send(PollerCommand::Refresh);
    }

    /// Edit the selection; the poller refreshes afterwards.
    pub fn select(&self, command: SelectionCommand) {
        let _ = self.commands.send(PollerCommand::Select(command));
    }

    /// Whether a cycle is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the poller to stop.
    pub async fn join(self) -> PollerSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Poller task failed");
                PollerSummary::default()
            }
        }
    }
}

// =============================================================================
// Poller
// =============================================================================

type FetchFuture<'a> = BoxFuture<'a, Result<Vec<VehicleSnapshot>, SourceError>>;

/// A fetch in progress, holding the busy guard until it is dropped.
struct InFlight<'a> {
    fetch: FetchFuture<'a>,
    _guard: BusyGuard,
}

async fn wait_fetch(
    in_flight: &mut Option<InFlight<'_>>,
) -> Result<Vec<VehicleSnapshot>, SourceError> {
    match in_flight {
        Some(cycle) => Pin::as_mut(&mut cycle.fetch).await,
        None => std::future::pending().await,
    }
}

/// Start a cycle unless one is already in flight.
fn start_cycle<'a, S: SnapshotSource>(
    source: &'a S,
    busy: &BusyFlag,
    in_flight: &mut Option<InFlight<'a>>,
    summary: &mut PollerSummary,
) {
    match busy.try_acquire() {
        Some(guard) => {
            *in_flight = Some(InFlight {
                fetch: Box::pin(source.fetch()),
                _guard: guard,
            });
        }
        None => {
            summary.skipped += 1;
            debug!("Cycle already in flight, skipping");
        }
    }
}

/// Polls a [`SnapshotSource`] and feeds an engine.
pub struct Poller<S, P> {
    source: S,
    engine: ReconciliationEngine,
    sink: P,
    interval: Duration,
    frame_interval: Duration,
    busy: BusyFlag,
}

impl<S, P> Poller<S, P>
where
    S: SnapshotSource + 'static,
    P: PresentationSink + Send + 'static,
{
    pub fn new(source: S, engine: ReconciliationEngine, sink: P, config: &PollConfig) -> Self {
        Self {
            source,
            engine,
            sink,
            interval: config.interval,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            busy: BusyFlag::new(),
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Spawn the poller on the current runtime.
    pub fn spawn(self, initial: Visibility) -> PollerHandle {
        let (visibility_tx, visibility_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let busy = self.busy.clone();

        let task = tokio::spawn(self.run(shutdown.clone(), visibility_rx, command_rx));

        PollerHandle {
            visibility: visibility_tx,
            commands: command_tx,
            shutdown,
            busy,
            task,
        }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(
        self,
        shutdown: CancellationToken,
        mut visibility: watch::Receiver<Visibility>,
        mut commands: mpsc::UnboundedReceiver<PollerCommand>,
    ) -> PollerSummary {
        let Poller {
            source,
            mut engine,
            mut sink,
            interval,
            frame_interval,
            busy,
        } = self;

        let mut poll_tick = tokio::time::interval(interval);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frame_tick = tokio::time::interval(frame_interval);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = PollerSummary::default();
        let mut in_flight: Option<InFlight<'_>> = None;
        let mut visible = *visibility.borrow_and_update() == Visibility::Visible;
        let mut visibility_open = true;
        let mut commands_open = true;

        info!(
            source = source.name(),
            interval_ms = interval.as_millis() as u64,
            visible,
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    break;
                }

                changed = visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    let now_visible = *visibility.borrow_and_update() == Visibility::Visible;
                    if now_visible && !visible {
                        info!("Host visible, resuming polling");
                        poll_tick.reset();
                        start_cycle(&source, &busy, &mut in_flight, &mut summary);
                    } else if !now_visible && visible {
                        info!("Host hidden, suspending polling");
                    }
                    visible = now_visible;
                }

                command = commands.recv(), if commands_open => {
                    match command {
                        None => commands_open = false,
                        Some(PollerCommand::Refresh) => {
                            if visible {
                                start_cycle(&source, &busy, &mut in_flight, &mut summary);
                            } else {
                                debug!("Refresh ignored while hidden");
                            }
                        }
                        Some(PollerCommand::Select(selection)) => {
                            engine.apply_selection(selection, &mut sink);
                            if visible {
                                start_cycle(&source, &busy, &mut in_flight, &mut summary);
                            }
                        }
                    }
                }

                result = wait_fetch(&mut in_flight), if in_flight.is_some() => {
                    // Keep the guard alive until reconciliation is done
                    let finished = in_flight.take();
                    match result {
                        Ok(records) => {
                            let stats = engine.reconcile(&records, Instant::now(), &mut sink);
                            summary.cycles += 1;
                            debug!(count = records.len(), %stats, "Cycle complete");
                        }
                        Err(e) => {
                            summary.failures += 1;
                            warn!(
                                source = source.name(),
                                error = %e,
                                "Snapshot fetch failed, keeping current vehicles"
                            );
                        }
                    }
                    drop(finished);
                }

                _ = poll_tick.tick(), if visible => {
                    start_cycle(&source, &busy, &mut in_flight, &mut summary);
                }

                _ = frame_tick.tick(), if visible => {
                    engine.advance_animations(Instant::now(), &mut sink);
                }
            }
        }

        drop(in_flight);
        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            skipped = summary.skipped,
            "Poller stopped"
        );
        summary
    }
}
