//! Snapshot reconciliation.
//!
//! The [`ReconciliationEngine`] owns every tracked vehicle. Each cycle it takes
//! a fresh snapshot and brings the tracked population in line with it:
//!
//! ```text
//! snapshot ─► trip lookup ─► selection filter ─┬─► new id      ─► Created
//!                                              ├─► known id    ─► bearing + animation ─► Updated
//!                                              └─► filtered    ─► Removed (if tracked)
//! tracked ids missing from the passing set ───────────────────────► Removed
//! ```
//!
//! The engine never renders. Every decision is reported to a
//! [`PresentationSink`] as a [`VehicleEvent`], and animation frames are
//! reported through [`PresentationSink::on_frame`].
//!
//! All methods take `&mut self`; the poller drives the engine from a single
//! task, so entity state is never touched concurrently.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::animation::{MotionAnimator, MotionOutcome};
use crate::bearing::BearingEstimator;
use crate::category::{CategoryToken, TransportMode};
use crate::entity::{VehicleEntity, VehicleMeta};
use crate::geo::GeoPoint;
use crate::normalize::normalize_line;
use crate::projection::ScreenProjection;
use crate::selection::{FilterSubject, ModeGroup, SelectionMode, SelectionState, SelectionStore};
use crate::snapshot::VehicleSnapshot;
use crate::style::VehicleStyle;
use crate::trips::TripLookup;

// =============================================================================
// Presentation interface
// =============================================================================

/// Everything the presentation layer needs to draw one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub id: String,
    pub line: String,
    pub mode: TransportMode,
    pub category: Option<CategoryToken>,
    pub unknown: bool,
    /// Target position for this cycle.
    pub position: GeoPoint,
    /// Heading in degrees, or `None` when unknown.
    pub heading: Option<f64>,
    pub style: VehicleStyle,
    pub label: String,
}

/// A change to the tracked population.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleEvent {
    /// A vehicle appeared.
    Created(VehicleView),
    /// A tracked vehicle received a new snapshot.
    Updated {
        view: VehicleView,
        /// The style differs from the one last applied.
        restyle: bool,
        /// One-shot highlight: the heading was just established.
        pop: bool,
        motion: MotionOutcome,
    },
    /// A vehicle disappeared or stopped passing the filter.
    Removed { id: String },
}

impl VehicleEvent {
    pub fn id(&self) -> &str {
        match self {
            VehicleEvent::Created(view) => &view.id,
            VehicleEvent::Updated { view, .. } => &view.id,
            VehicleEvent::Removed { id } => id,
        }
    }
}

/// Consumer of engine decisions.
pub trait PresentationSink {
    /// A vehicle was created, updated or removed.
    fn on_event(&mut self, event: VehicleEvent);

    /// An animation produced an intermediate position.
    fn on_frame(&mut self, _id: &str, _position: &GeoPoint) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn on_event(&mut self, _event: VehicleEvent) {}
}

/// Sink that records everything, for tests and diagnostics.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<VehicleEvent>,
    pub frames: Vec<(String, GeoPoint)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear the recorded events.
    pub fn drain(&mut self) -> Vec<VehicleEvent> {
        self.frames.clear();
        std::mem::take(&mut self.events)
    }
}

impl PresentationSink for RecordingSink {
    fn on_event(&mut self, event: VehicleEvent) {
        self.events.push(event);
    }

    fn on_frame(&mut self, id: &str, position: &GeoPoint) {
        self.frames.push((id.to_string(), *position));
    }
}

// =============================================================================
// Selection commands
// =============================================================================

/// A user edit to the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    ShowAll,
    ShowNone,
    ToggleLine(String),
    ToggleCategory(CategoryToken),
    SetFromText(String),
    /// Show nothing and drop every vehicle immediately.
    Clear,
}

// =============================================================================
// Engine
// =============================================================================

/// Counters for one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Records rejected by the selection filter.
    pub filtered: usize,
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} removed, {} filtered",
            self.created, self.updated, self.removed, self.filtered
        )
    }
}

/// Owner of all tracked vehicles.
pub struct ReconciliationEngine {
    entities: HashMap<String, VehicleEntity>,
    selection: SelectionStore,
    trips: Arc<dyn TripLookup>,
    projection: Arc<dyn ScreenProjection>,
    bearing: BearingEstimator,
    animator: MotionAnimator,
}

impl ReconciliationEngine {
    pub fn new(
        selection: SelectionStore,
        trips: Arc<dyn TripLookup>,
        projection: Arc<dyn ScreenProjection>,
    ) -> Self {
        Self {
            entities: HashMap::new(),
            selection,
            trips,
            projection,
            bearing: BearingEstimator::default(),
            animator: MotionAnimator::default(),
        }
    }

    pub fn with_bearing_estimator(mut self, bearing: BearingEstimator) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_animator(mut self, animator: MotionAnimator) -> Self {
        self.animator = animator;
        self
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn entity(&self, id: &str) -> Option<&VehicleEntity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &VehicleEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of vehicles with an animation in flight.
    pub fn animating_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_animating()).count()
    }

    /// Resolve line metadata for a record.
    ///
    /// A missing trip id or a lookup miss yields an unknown vehicle.
    pub fn resolve_meta(&self, snapshot: &VehicleSnapshot) -> VehicleMeta {
        let Some(info) = snapshot
            .trip_id
            .as_deref()
            .and_then(|trip| self.trips.lookup(trip))
        else {
            return VehicleMeta::unknown();
        };

        let mode = match (info.route_type, snapshot.type_tag.as_deref()) {
            (Some(route_type), _) => TransportMode::from_route_type(route_type),
            (None, Some(tag)) => TransportMode::from_tag(tag),
            (None, None) => TransportMode::Rail,
        };

        VehicleMeta {
            line: normalize_line(&info.line),
            headsign: info.headsign,
            mode,
            description: info
                .description
                .or_else(|| snapshot.description.clone())
                .unwrap_or_default(),
            unknown: false,
        }
    }

    /// Reconcile the tracked population against a new snapshot.
    pub fn reconcile(
        &mut self,
        snapshot: &[VehicleSnapshot],
        now: Instant,
        sink: &mut dyn PresentationSink,
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();

        if self.selection.mode() == SelectionMode::None {
            stats.removed = self.remove_all(sink);
            return stats;
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(snapshot.len());

        for record in snapshot {
            let meta = self.resolve_meta(record);
            let subject = FilterSubject {
                mode: meta.mode,
                line: &meta.line,
                description: &meta.description,
                unknown: meta.unknown,
            };

            if !self.selection.passes(&subject) {
                stats.filtered += 1;
                if self.remove(&record.id, sink) {
                    stats.removed += 1;
                }
                continue;
            }

            seen.insert(record.id.clone());
            if self.entities.contains_key(&record.id) {
                self.update(record, meta, now, sink);
                stats.updated += 1;
            } else {
                self.create(record, meta, sink);
                stats.created += 1;
            }
        }

        let stale: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if self.remove(&id, sink) {
                stats.removed += 1;
            }
        }

        debug!(
            count = self.entities.len(),
            created = stats.created,
            updated = stats.updated,
            removed = stats.removed,
            filtered = stats.filtered,
            "Reconciled snapshot"
        );
        stats
    }

    fn create(
        &mut self,
        record: &VehicleSnapshot,
        meta: VehicleMeta,
        sink: &mut dyn PresentationSink,
    ) {
        debug!(vehicle_id = %record.id, line = %meta.line, mode = %meta.mode, "Creating vehicle");

        let mut entity = VehicleEntity::new(record.id.clone(), meta, record.position);
        entity.trip_id = record.trip_id.clone();
        entity.speed_kmh = record.speed_kmh;
        entity.timestamp = record.timestamp;

        let style = entity.resolve_style();
        let view = view_of(&entity, style.clone());
        entity.last_style = Some(style);

        self.entities.insert(record.id.clone(), entity);
        sink.on_event(VehicleEvent::Created(view));
    }

    fn update(
        &mut self,
        record: &VehicleSnapshot,
        meta: VehicleMeta,
        now: Instant,
        sink: &mut dyn PresentationSink,
    ) {
        let Some(entity) = self.entities.get_mut(&record.id) else {
            return;
        };

        let was_established = entity.bearing.established;
        let previous = entity.position;
        let resolution = self.bearing.resolve(
            &mut entity.bearing,
            &record.position,
            Some(&previous),
            record.bearing,
        );
        let pop = !was_established && entity.bearing.established;

        entity.meta = meta;
        entity.trip_id = record.trip_id.clone();
        entity.speed_kmh = record.speed_kmh;
        entity.timestamp = record.timestamp;
        entity.previous_position = Some(previous);
        entity.position = record.position;
        entity.heading = resolution.bearing;

        let from = entity.displayed_position;
        let distance_px = self.projection.screen_distance(&from, &record.position);
        let motion = self.animator.animate(
            &mut entity.animation,
            from,
            record.position,
            distance_px,
            now,
        );
        if motion == MotionOutcome::Immediate {
            entity.displayed_position = record.position;
            sink.on_frame(&record.id, &record.position);
        }

        let style = entity.resolve_style();
        let restyle = entity.last_style.as_ref() != Some(&style);
        if restyle {
            entity.last_style = Some(style.clone());
        }

        debug!(
            vehicle_id = %record.id,
            heading_source = %resolution.source,
            pop,
            restyle,
            "Updating vehicle"
        );

        let view = view_of(entity, style);
        sink.on_event(VehicleEvent::Updated {
            view,
            restyle,
            pop,
            motion,
        });
    }

    /// Stop tracking `id`, cancelling its animation. Returns whether it was
    /// tracked.
    pub fn remove(&mut self, id: &str, sink: &mut dyn PresentationSink) -> bool {
        let Some(mut entity) = self.entities.remove(id) else {
            return false;
        };
        MotionAnimator::cancel(&mut entity.animation);
        debug!(vehicle_id = %id, "Removing vehicle");
        sink.on_event(VehicleEvent::Removed { id: entity.id });
        true
    }

    /// Drop every tracked vehicle. Returns how many were removed.
    pub fn remove_all(&mut self, sink: &mut dyn PresentationSink) -> usize {
        let ids: Vec<String> = self.entities.keys().cloned().collect();
        let count = ids.len();
        for id in ids {
            self.remove(&id, sink);
        }
        if count > 0 {
            info!(count, "Removed all vehicles");
        }
        count
    }

    /// Apply a selection edit.
    ///
    /// Only [`SelectionCommand::Clear`] touches the tracked population
    /// directly; every other edit takes effect on the next cycle.
    pub fn apply_selection(
        &mut self,
        command: SelectionCommand,
        sink: &mut dyn PresentationSink,
    ) {
        match command {
            SelectionCommand::ShowAll => self.selection.show_all(),
            SelectionCommand::ShowNone => self.selection.show_none(),
            SelectionCommand::ToggleLine(line) => self.selection.toggle_line(&line),
            SelectionCommand::ToggleCategory(token) => self.selection.toggle_category(token),
            SelectionCommand::SetFromText(text) => {
                self.selection.set_from_text(&text);
            }
            SelectionCommand::Clear => {
                self.selection.show_none();
                self.remove_all(sink);
            }
        }
    }

    /// Sample every in-flight animation at `now`.
    ///
    /// Finished and cancelled animations are dropped.
    pub fn advance_animations(&mut self, now: Instant, sink: &mut dyn PresentationSink) {
        for entity in self.entities.values_mut() {
            let Some(animation) = entity.animation.as_ref() else {
                continue;
            };
            let mut displayed = entity.displayed_position;
            let done = animation.advance(now, |position| {
                displayed = *position;
                sink.on_frame(&entity.id, position);
            });
            entity.displayed_position = displayed;
            if done {
                entity.animation = None;
            }
        }
    }

    /// Category tokens of `mode` among visible vehicles.
    pub fn visible_categories(&self, mode: TransportMode) -> BTreeSet<CategoryToken> {
        self.entities
            .values()
            .filter(|e| !e.meta.unknown && e.meta.mode == mode)
            .filter_map(|e| e.meta.category())
            .collect()
    }

    /// Whether any visible vehicle has the given mode.
    pub fn has_visible_mode(&self, mode: TransportMode) -> bool {
        self.entities
            .values()
            .any(|e| !e.meta.unknown && e.meta.mode == mode)
    }

    /// Whether a filter chip group renders as active.
    pub fn group_active(&self, group: &ModeGroup) -> bool {
        group.is_active(self.selection.state(), self.has_visible_mode(group.mode))
    }
}

impl fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("entities", &self.entities.len())
            .field("selection", &self.selection)
            .field("bearing", &self.bearing)
            .field("animator", &self.animator)
            .finish()
    }
}

fn view_of(entity: &VehicleEntity, style: VehicleStyle) -> VehicleView {
    VehicleView {
        id: entity.id.clone(),
        line: entity.meta.line.clone(),
        mode: entity.meta.mode,
        category: entity.meta.category(),
        unknown: entity.meta.unknown,
        position: entity.position,
        heading: entity.heading,
        label: entity.label_text(),
        style,
    }
}
