//! LiveTransit - live transit vehicle tracking core
//!
//! This library turns a periodically polled feed of vehicle positions into a
//! stable, animated population of map markers. It reconciles each snapshot
//! against the vehicles already shown, infers headings when the feed omits
//! them, times eased motion from screen-space distance, and applies the
//! user's persisted line/category filter. Drawing is left to a
//! [`engine::PresentationSink`] implementation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use livetransit::config::LiveConfig;
//! use livetransit::engine::{NullSink, ReconciliationEngine};
//! use livetransit::persistence::JsonFileSelectionPersistence;
//! use livetransit::poller::{Poller, Visibility};
//! use livetransit::projection::WebMercatorProjection;
//! use livetransit::selection::SelectionStore;
//! use livetransit::source::HttpSnapshotSource;
//! use livetransit::trips::TripTable;
//!
//! let config = LiveConfig::load()?;
//! let selection = SelectionStore::load(Arc::new(JsonFileSelectionPersistence::new(
//!     &config.storage.selection_file,
//! )));
//! let engine = ReconciliationEngine::new(
//!     selection,
//!     Arc::new(TripTable::load(&config.storage.trip_table)?),
//!     Arc::new(WebMercatorProjection::new(config.animation.projection_zoom)),
//! );
//! let source = HttpSnapshotSource::reqwest(&config.poll.api_url, config.poll.request_timeout)?;
//! let handle = Poller::new(source, engine, NullSink, &config.poll).spawn(Visibility::Visible);
//! ```

pub mod animation;
pub mod bearing;
pub mod category;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geo;
pub mod logging;
pub mod normalize;
pub mod persistence;
pub mod poller;
pub mod projection;
pub mod selection;
pub mod snapshot;
pub mod source;
pub mod style;
pub mod trips;

pub use engine::{PresentationSink, ReconciliationEngine, SelectionCommand, VehicleEvent};
pub use error::{ConfigError, PersistenceError, SourceError, TripTableError};
pub use geo::GeoPoint;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
