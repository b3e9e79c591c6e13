//! Integration tests for the reconciliation pipeline.
//!
//! These tests drive the full flow:
//! - JSON feed body → snapshot decoding → trip lookup → selection filter
//! - bearing inference and animation across cycles
//! - selection persistence across engine restarts
//! - the poller task with a mock HTTP transport
//!
//! Run with: `cargo test --test reconcile_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;

use livetransit::category::{CategoryToken, TransportMode};
use livetransit::engine::{
    PresentationSink, RecordingSink, ReconciliationEngine, SelectionCommand, VehicleEvent,
};
use livetransit::error::SourceError;
use livetransit::geo::GeoPoint;
use livetransit::persistence::JsonFileSelectionPersistence;
use livetransit::poller::{PollConfig, Poller, Visibility};
use livetransit::projection::WebMercatorProjection;
use livetransit::selection::{SelectionMode, SelectionStore};
use livetransit::snapshot::decode_snapshot;
use livetransit::source::{AsyncHttpClient, HttpSnapshotSource};
use livetransit::trips::TripTable;

// ============================================================================
// Helper Functions
// ============================================================================

const TRIPS: &str = r#"{
    "T1": {"line": "14", "headsign": "Mörby centrum", "type": 401},
    "T2": {"line": "43x", "headsign": "Bålsta", "type": 109},
    "B1": {"line": "1", "headsign": "Frihamnen", "type": 700, "desc": "Blåbuss"},
    "B2": {"line": "471", "type": 700, "desc": "Ersättningsbuss"},
    "F1": {"line": "80", "type": 1000, "desc": "Pendelbåt"}
}"#;

fn engine_in(dir: &TempDir) -> ReconciliationEngine {
    let persistence = Arc::new(JsonFileSelectionPersistence::new(
        dir.path().join("selected_lines.v7.json"),
    ));
    ReconciliationEngine::new(
        SelectionStore::load(persistence),
        Arc::new(TripTable::from_json_str(TRIPS).unwrap()),
        Arc::new(WebMercatorProjection::new(13.0)),
    )
}

fn feed(body: &str) -> Vec<livetransit::snapshot::VehicleSnapshot> {
    decode_snapshot(body.as_bytes()).unwrap()
}

fn updated(event: &VehicleEvent) -> (&livetransit::engine::VehicleView, bool) {
    match event {
        VehicleEvent::Updated { view, pop, .. } => (view, *pop),
        other => panic!("expected update, got {:?}", other),
    }
}

// ============================================================================
// Engine Tests
// ============================================================================

/// A rail vehicle appears without heading, then moves ~50 m east and gains
/// an eastward heading with a one-shot pop.
#[test]
fn test_rail_vehicle_gains_heading_after_moving_east() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    let mut sink = RecordingSink::new();
    let now = Instant::now();

    engine.reconcile(
        &feed(r#"[{"id": "A", "lat": 59.33, "lon": 18.06, "tripId": "T1"}]"#),
        now,
        &mut sink,
    );

    let events = sink.drain();
    assert_eq!(events.len(), 1);
    let VehicleEvent::Created(view) = &events[0] else {
        panic!("expected create");
    };
    assert_eq!(view.id, "A");
    assert_eq!(view.line, "14");
    assert_eq!(view.mode, TransportMode::Rail);
    assert_eq!(view.heading, None);
    assert!(!view.style.has_heading);

    engine.reconcile(
        &feed(r#"[{"id": "A", "lat": 59.33, "lon": 18.06088, "tripId": "T1"}]"#),
        now + Duration::from_secs(3),
        &mut sink,
    );

    let events = sink.drain();
    let (view, pop) = updated(&events[0]);
    let heading = view.heading.expect("heading should be established");
    assert!((heading - 90.0).abs() < 1.0, "Expected ~90°, got {}°", heading);
    assert!(pop);
    assert!(engine.entity("A").unwrap().bearing.established);
}

/// Unknown trips are shown under an empty selection and hidden otherwise.
#[test]
fn test_unknown_trip_visibility_depends_on_selection() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    let mut sink = RecordingSink::new();
    let body = r#"[
        {"id": "A", "lat": 59.33, "lon": 18.06, "tripId": "T1"},
        {"id": "U", "lat": 59.31, "lon": 18.02, "tripId": "MISSING"}
    ]"#;

    engine.reconcile(&feed(body), Instant::now(), &mut sink);
    assert_eq!(engine.len(), 2);
    let unknown = engine.entity("U").unwrap();
    assert!(unknown.meta.unknown);
    assert_eq!(unknown.label_text(), "?");

    engine.apply_selection(SelectionCommand::ToggleLine("14".to_string()), &mut sink);
    engine.reconcile(&feed(body), Instant::now(), &mut sink);

    assert_eq!(engine.len(), 1);
    assert!(engine.entity("U").is_none());
}

/// Bus categories filter by description; line codes keep working for rail.
#[test]
fn test_mixed_line_and_category_selection() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    let mut sink = RecordingSink::new();
    let body = r#"[
        {"id": "metro", "lat": 59.33, "lon": 18.06, "tripId": "T1"},
        {"id": "pendel", "lat": 59.34, "lon": 18.05, "tripId": "T2"},
        {"id": "blue", "lat": 59.32, "lon": 18.07, "tripId": "B1"},
        {"id": "repl", "lat": 59.35, "lon": 18.01, "tripId": "B2"},
        {"id": "ferry", "lat": 59.32, "lon": 18.10, "tripId": "F1"}
    ]"#;

    engine.apply_selection(SelectionCommand::SetFromText("43X".to_string()), &mut sink);
    engine.apply_selection(
        SelectionCommand::ToggleCategory(CategoryToken::BusReplacement),
        &mut sink,
    );
    engine.reconcile(&feed(body), Instant::now(), &mut sink);

    let mut ids: Vec<&str> = engine.entities().map(|e| e.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["pendel", "repl"]);
    assert_eq!(
        engine
            .visible_categories(TransportMode::Bus)
            .into_iter()
            .collect::<Vec<_>>(),
        vec![CategoryToken::BusReplacement]
    );
}

/// The selection file written by one engine is picked up by the next.
#[test]
fn test_selection_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut sink = RecordingSink::new();

    {
        let mut engine = engine_in(&dir);
        engine.apply_selection(SelectionCommand::ToggleLine("14".to_string()), &mut sink);
        engine.apply_selection(
            SelectionCommand::ToggleCategory(CategoryToken::BoatCommuter),
            &mut sink,
        );
    }

    let engine = engine_in(&dir);
    assert_eq!(engine.selection().mode(), SelectionMode::Partial);
    assert!(engine.selection().contains("14"));
    assert!(engine.selection().has_category(CategoryToken::BoatCommuter));
}

/// A corrupt selection file degrades to "show everything".
#[test]
fn test_corrupt_selection_file_shows_everything() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("selected_lines.v7.json"), "{{{").unwrap();

    let engine = engine_in(&dir);
    assert_eq!(engine.selection().mode(), SelectionMode::All);
}

/// Animation frames converge on the newest destination after a retarget.
#[test]
fn test_retargeted_animation_ends_at_newest_position() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    let mut sink = RecordingSink::new();
    let start = Instant::now();

    engine.reconcile(
        &feed(r#"[{"id": "A", "lat": 59.33, "lon": 18.06, "tripId": "T1"}]"#),
        start,
        &mut sink,
    );
    engine.reconcile(
        &feed(r#"[{"id": "A", "lat": 59.331, "lon": 18.062, "tripId": "T1"}]"#),
        start,
        &mut sink,
    );
    engine.advance_animations(start + Duration::from_millis(100), &mut sink);
    engine.reconcile(
        &feed(r#"[{"id": "A", "lat": 59.332, "lon": 18.064, "tripId": "T1"}]"#),
        start + Duration::from_millis(100),
        &mut sink,
    );
    assert_eq!(engine.animating_count(), 1);

    engine.advance_animations(start + Duration::from_secs(5), &mut sink);

    let a = engine.entity("A").unwrap();
    assert_eq!(a.displayed_position, GeoPoint::new(59.332, 18.064));
    assert_eq!(engine.animating_count(), 0);
}

// ============================================================================
// Poller Tests
// ============================================================================

/// Mock transport replaying one body per call, repeating the last.
struct MockTransport {
    bodies: Mutex<Vec<Result<String, u16>>>,
    calls: Arc<AtomicUsize>,
}

impl AsyncHttpClient for MockTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut bodies = self.bodies.lock().unwrap();
            if bodies.len() > 1 {
                bodies.remove(0)
            } else {
                bodies[0].clone()
            }
        };
        match next {
            Ok(body) => Ok(body.into_bytes()),
            Err(status) => Err(SourceError::Status {
                status,
                url: url.to_string(),
            }),
        }
    }
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<VehicleEvent>>>);

impl PresentationSink for SharedSink {
    fn on_event(&mut self, event: VehicleEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[tokio::test(start_paused = true)]
async fn test_poller_end_to_end_with_transport_failure() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = MockTransport {
        bodies: Mutex::new(vec![
            Ok(r#"[{"id": "A", "lat": 59.33, "lon": 18.06, "tripId": "T1"}]"#.to_string()),
            Err(500),
            Ok(r#"[{"id": "A", "lat": 59.33, "lon": 18.06088, "tripId": "T1"}]"#.to_string()),
            Ok("[]".to_string()),
        ]),
        calls: Arc::clone(&calls),
    };
    let source = HttpSnapshotSource::new("http://feed.test/vehicles", transport);
    let sink = SharedSink::default();
    let config = PollConfig::default().with_interval(Duration::from_secs(3));

    let handle = Poller::new(source, engine_in(&dir), sink.clone(), &config)
        .spawn(Visibility::Visible);

    tokio::time::sleep(Duration::from_millis(9500)).await;
    handle.shutdown();
    let summary = handle.join().await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.failures, 1);

    let events = sink.0.lock().unwrap();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            VehicleEvent::Created(_) => "created",
            VehicleEvent::Updated { .. } => "updated",
            VehicleEvent::Removed { .. } => "removed",
        })
        .collect();
    assert_eq!(kinds, vec!["created", "updated", "removed"]);

    let (view, pop) = updated(&events[1]);
    assert!(pop);
    assert!(view.heading.is_some());
}
