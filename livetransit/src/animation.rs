//! Eased motion between successive vehicle positions.
//!
//! Each tracked vehicle owns at most one [`Animation`]. Starting a new one
//! cancels the previous animation synchronously, so a vehicle that receives
//! two snapshots in quick succession ends up with a single motion heading for
//! the newest destination.
//!
//! Animations are plain state: they record where they started, where they are
//! going, and when. The poller's frame tick calls [`Animation::advance`] with
//! the current instant, which samples the eased position and hands it to an
//! observer. Keeping time external makes the whole thing deterministic under
//! test.
//!
//! # Timing
//!
//! ```text
//! duration = clamp(screen_distance_px * ms_per_px, min_duration, max_duration)
//! ```

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::geo::GeoPoint;

/// Default lower bound on animation duration.
pub const DEFAULT_MIN_DURATION: Duration = Duration::from_millis(350);

/// Hard upper bound on animation duration, regardless of poll interval.
pub const MAX_DURATION_CAP: Duration = Duration::from_millis(2500);

/// Fraction of the poll interval an animation may occupy.
pub const POLL_FRACTION: f64 = 0.85;

/// Default milliseconds of animation per pixel travelled.
pub const DEFAULT_MS_PER_PX: f64 = 7.0;

/// Default frame interval (~60 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Moves smaller than this on both axes are applied without animating.
pub const DEFAULT_EPSILON_DEG: f64 = 1e-8;

/// Zoom level used by the default screen projection.
pub const DEFAULT_PROJECTION_ZOOM: f64 = 13.0;

/// Animation tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationConfig {
    /// Shortest animation.
    pub min_duration: Duration,
    /// Longest animation.
    pub max_duration: Duration,
    /// Linear duration factor per screen pixel.
    pub ms_per_px: f64,
    /// Interval between animation frames.
    pub frame_interval: Duration,
    /// Degenerate-move threshold in degrees.
    pub epsilon_deg: f64,
    /// Zoom for the built-in Web Mercator projection.
    pub projection_zoom: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: Self::max_duration_for_poll(Duration::from_millis(3000)),
            ms_per_px: DEFAULT_MS_PER_PX,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            epsilon_deg: DEFAULT_EPSILON_DEG,
            projection_zoom: DEFAULT_PROJECTION_ZOOM,
        }
    }
}

impl AnimationConfig {
    /// Default configuration with the maximum derived from a poll interval.
    pub fn for_poll_interval(poll_interval: Duration) -> Self {
        Self {
            max_duration: Self::max_duration_for_poll(poll_interval),
            ..Default::default()
        }
    }

    /// `min(0.85 * poll_interval, 2500 ms)`.
    ///
    /// Animations must finish before the next snapshot arrives, otherwise
    /// every vehicle would be perpetually mid-flight.
    pub fn max_duration_for_poll(poll_interval: Duration) -> Duration {
        let micros = (poll_interval.as_micros() as f64 * POLL_FRACTION).round() as u64;
        Duration::from_micros(micros).min(MAX_DURATION_CAP)
    }

    pub fn with_min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = duration;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn with_ms_per_px(mut self, ms_per_px: f64) -> Self {
        self.ms_per_px = ms_per_px;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_projection_zoom(mut self, zoom: f64) -> Self {
        self.projection_zoom = zoom;
        self
    }
}

/// Cubic ease-in-out on `t` in [0, 1].
///
/// Inputs outside the unit interval are clamped.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Animation duration for a move of `distance_px` screen pixels.
pub fn compute_duration(distance_px: f64, config: &AnimationConfig) -> Duration {
    // A misconfigured max below min would make clamp panic.
    let max = config.max_duration.max(config.min_duration);
    if !distance_px.is_finite() || distance_px <= 0.0 {
        return config.min_duration;
    }
    let raw_ms = distance_px * config.ms_per_px;
    if !raw_ms.is_finite() {
        return max;
    }
    Duration::from_micros((raw_ms * 1000.0).round() as u64).clamp(config.min_duration, max)
}

/// A single in-flight motion.
#[derive(Debug)]
pub struct Animation {
    from: GeoPoint,
    to: GeoPoint,
    started: Instant,
    duration: Duration,
    token: CancellationToken,
}

impl Animation {
    pub fn from(&self) -> GeoPoint {
        self.from
    }

    pub fn to(&self) -> GeoPoint {
        self.to
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Token cancelled when this animation is replaced or its vehicle removed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel this animation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Linear progress in [0, 1] at `now`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Eased position at `now`.
    pub fn position_at(&self, now: Instant) -> GeoPoint {
        self.from.lerp(&self.to, ease_in_out_cubic(self.progress(now)))
    }

    /// Sample one frame and report it to `observer`.
    ///
    /// Returns `true` once the animation has reached its destination or was
    /// cancelled; the caller should then drop it. A cancelled animation does
    /// not invoke the observer.
    pub fn advance<F>(&self, now: Instant, mut observer: F) -> bool
    where
        F: FnMut(&GeoPoint),
    {
        if self.is_cancelled() {
            return true;
        }
        let progress = self.progress(now);
        let position = self.from.lerp(&self.to, ease_in_out_cubic(progress));
        observer(&position);
        progress >= 1.0
    }
}

/// How a requested motion was carried out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionOutcome {
    /// The move was too small to animate; the destination applies now.
    Immediate,
    /// A new animation was installed with this duration.
    Scheduled(Duration),
}

/// Creates and replaces per-vehicle animations.
#[derive(Debug, Clone, Default)]
pub struct MotionAnimator {
    config: AnimationConfig,
}

impl MotionAnimator {
    pub fn new(config: AnimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Start moving from `from` to `to`, replacing whatever is in `slot`.
    ///
    /// The previous animation, if any, is cancelled before anything else
    /// happens. `distance_px` is the screen-space length of the move as
    /// reported by the map projection.
    pub fn animate(
        &self,
        slot: &mut Option<Animation>,
        from: GeoPoint,
        to: GeoPoint,
        distance_px: f64,
        now: Instant,
    ) -> MotionOutcome {
        Self::cancel(slot);

        if from.approx_eq(&to, self.config.epsilon_deg) {
            return MotionOutcome::Immediate;
        }

        let duration = compute_duration(distance_px, &self.config);
        trace!(
            distance_px,
            duration_ms = duration.as_millis() as u64,
            "Scheduling animation"
        );
        *slot = Some(Animation {
            from,
            to,
            started: now,
            duration,
            token: CancellationToken::new(),
        });
        MotionOutcome::Scheduled(duration)
    }

    /// Cancel and clear the animation in `slot`, if any.
    pub fn cancel(slot: &mut Option<Animation>) {
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
    }
}
