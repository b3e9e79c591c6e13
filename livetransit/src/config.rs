//! Configuration file support.
//!
//! Settings live in an INI file at `~/.livetransit/config.ini`:
//!
//! ```ini
//! [poll]
//! api_url = https://metro.etfnordic.workers.dev
//! interval_ms = 3000
//! request_timeout_secs = 10
//!
//! [animation]
//! min_duration_ms = 350
//! ; defaults to min(0.85 * poll interval, 2500)
//! max_duration_ms = 2500
//! ms_per_px = 7
//! frame_interval_ms = 16
//! zoom = 13
//!
//! [bearing]
//! movement_threshold_deg = 0.00002
//!
//! [storage]
//! trip_table = ~/.livetransit/trips.json
//! selection_file = ~/.livetransit/selected_lines.v7.json
//! log_dir = ~/.livetransit/logs
//! ```
//!
//! A missing file yields defaults. Unknown sections and keys are ignored so
//! newer files keep working with older binaries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::animation::AnimationConfig;
use crate::bearing::{BearingEstimator, DEFAULT_MOVEMENT_THRESHOLD_DEG};
use crate::error::ConfigError;
use crate::persistence::SELECTION_FILE_NAME;
use crate::poller::PollConfig;

/// Name of the per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = ".livetransit";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Highest zoom level accepted for the built-in projection.
const MAX_ZOOM: f64 = 22.0;

/// The per-user configuration directory.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Heading estimation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BearingConfig {
    /// Minimum per-axis movement, in degrees, before a heading is derived.
    pub movement_threshold_deg: f64,
}

impl Default for BearingConfig {
    fn default() -> Self {
        Self {
            movement_threshold_deg: DEFAULT_MOVEMENT_THRESHOLD_DEG,
        }
    }
}

impl BearingConfig {
    pub fn estimator(&self) -> BearingEstimator {
        BearingEstimator::new(self.movement_threshold_deg)
    }
}

/// File locations.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Trip table JSON file.
    pub trip_table: PathBuf,
    /// Persisted selection file.
    pub selection_file: PathBuf,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = config_dir();
        Self {
            trip_table: dir.join("trips.json"),
            selection_file: dir.join(SELECTION_FILE_NAME),
            log_dir: dir.join("logs"),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiveConfig {
    pub poll: PollConfig,
    pub animation: AnimationConfig,
    pub bearing: BearingConfig,
    pub storage: StorageConfig,
}

impl LiveConfig {
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_animation(mut self, animation: AnimationConfig) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_bearing(mut self, bearing: BearingConfig) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_ini(&ini)?;

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Build a configuration from parsed INI data.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut explicit_max = false;

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
                explicit_max |= *key == ConfigKey::AnimationMaxDurationMs;
            }
        }

        if !explicit_max {
            config.animation.max_duration =
                AnimationConfig::max_duration_for_poll(config.poll.interval);
        }
        config.validate()?;
        Ok(config)
    }

    /// Render as INI data.
    ///
    /// The maximum animation duration is only written when it differs from
    /// the value derived from the poll interval.
    pub fn to_ini(&self) -> Ini {
        let derived_max = AnimationConfig::max_duration_for_poll(self.poll.interval);
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            if *key == ConfigKey::AnimationMaxDurationMs
                && self.animation.max_duration == derived_max
            {
                continue;
            }
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)?;
        tracing::info!(path = %path.display(), "Saved config file");
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.animation.max_duration < self.animation.min_duration {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::AnimationMaxDurationMs.name(),
                value: self.animation.max_duration.as_millis().to_string(),
                reason: format!(
                    "must not be below animation.min_duration_ms ({})",
                    self.animation.min_duration.as_millis()
                ),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Settable configuration keys, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PollApiUrl,
    PollIntervalMs,
    PollRequestTimeoutSecs,
    AnimationMinDurationMs,
    AnimationMaxDurationMs,
    AnimationMsPerPx,
    AnimationFrameIntervalMs,
    AnimationZoom,
    BearingMovementThresholdDeg,
    StorageTripTable,
    StorageSelectionFile,
    StorageLogDir,
}

const ALL_KEYS: [ConfigKey; 12] = [
    ConfigKey::PollApiUrl,
    ConfigKey::PollIntervalMs,
    ConfigKey::PollRequestTimeoutSecs,
    ConfigKey::AnimationMinDurationMs,
    ConfigKey::AnimationMaxDurationMs,
    ConfigKey::AnimationMsPerPx,
    ConfigKey::AnimationFrameIntervalMs,
    ConfigKey::AnimationZoom,
    ConfigKey::BearingMovementThresholdDeg,
    ConfigKey::StorageTripTable,
    ConfigKey::StorageSelectionFile,
    ConfigKey::StorageLogDir,
];

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::PollApiUrl | ConfigKey::PollIntervalMs | ConfigKey::PollRequestTimeoutSecs => {
                "poll"
            }
            ConfigKey::AnimationMinDurationMs
            | ConfigKey::AnimationMaxDurationMs
            | ConfigKey::AnimationMsPerPx
            | ConfigKey::AnimationFrameIntervalMs
            | ConfigKey::AnimationZoom => "animation",
            ConfigKey::BearingMovementThresholdDeg => "bearing",
            ConfigKey::StorageTripTable | ConfigKey::StorageSelectionFile | ConfigKey::StorageLogDir => {
                "storage"
            }
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::PollApiUrl => "api_url",
            ConfigKey::PollIntervalMs => "interval_ms",
            ConfigKey::PollRequestTimeoutSecs => "request_timeout_secs",
            ConfigKey::AnimationMinDurationMs => "min_duration_ms",
            ConfigKey::AnimationMaxDurationMs => "max_duration_ms",
            ConfigKey::AnimationMsPerPx => "ms_per_px",
            ConfigKey::AnimationFrameIntervalMs => "frame_interval_ms",
            ConfigKey::AnimationZoom => "zoom",
            ConfigKey::BearingMovementThresholdDeg => "movement_threshold_deg",
            ConfigKey::StorageTripTable => "trip_table",
            ConfigKey::StorageSelectionFile => "selection_file",
            ConfigKey::StorageLogDir => "log_dir",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text.
    pub fn get(&self, config: &LiveConfig) -> String {
        match self {
            ConfigKey::PollApiUrl => config.poll.api_url.clone(),
            ConfigKey::PollIntervalMs => config.poll.interval.as_millis().to_string(),
            ConfigKey::PollRequestTimeoutSecs => config.poll.request_timeout.as_secs().to_string(),
            ConfigKey::AnimationMinDurationMs => {
                config.animation.min_duration.as_millis().to_string()
            }
            ConfigKey::AnimationMaxDurationMs => {
                config.animation.max_duration.as_millis().to_string()
            }
            ConfigKey::AnimationMsPerPx => config.animation.ms_per_px.to_string(),
            ConfigKey::AnimationFrameIntervalMs => {
                config.animation.frame_interval.as_millis().to_string()
            }
            ConfigKey::AnimationZoom => config.animation.projection_zoom.to_string(),
            ConfigKey::BearingMovementThresholdDeg => {
                config.bearing.movement_threshold_deg.to_string()
            }
            ConfigKey::StorageTripTable => config.storage.trip_table.display().to_string(),
            ConfigKey::StorageSelectionFile => config.storage.selection_file.display().to_string(),
            ConfigKey::StorageLogDir => config.storage.log_dir.display().to_string(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut LiveConfig, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::PollApiUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(self.invalid(value, "expected an http(s) URL"));
                }
                config.poll.api_url = value.to_string();
            }
            ConfigKey::PollIntervalMs => {
                let interval = Duration::from_millis(self.positive_int(value)?);
                // A derived max follows the interval; an explicit one is kept.
                if config.animation.max_duration
                    == AnimationConfig::max_duration_for_poll(config.poll.interval)
                {
                    config.animation.max_duration = AnimationConfig::max_duration_for_poll(interval);
                }
                config.poll.interval = interval;
            }
            ConfigKey::PollRequestTimeoutSecs => {
                config.poll.request_timeout = Duration::from_secs(self.positive_int(value)?);
            }
            ConfigKey::AnimationMinDurationMs => {
                config.animation.min_duration = Duration::from_millis(self.int(value)?);
            }
            ConfigKey::AnimationMaxDurationMs => {
                config.animation.max_duration = Duration::from_millis(self.int(value)?);
            }
            ConfigKey::AnimationMsPerPx => {
                config.animation.ms_per_px = self.non_negative_float(value)?;
            }
            ConfigKey::AnimationFrameIntervalMs => {
                config.animation.frame_interval = Duration::from_millis(self.positive_int(value)?);
            }
            ConfigKey::AnimationZoom => {
                let zoom = self.non_negative_float(value)?;
                if zoom > MAX_ZOOM {
                    return Err(self.invalid(value, "zoom must be between 0 and 22"));
                }
                config.animation.projection_zoom = zoom;
            }
            ConfigKey::BearingMovementThresholdDeg => {
                config.bearing.movement_threshold_deg = self.non_negative_float(value)?;
            }
            ConfigKey::StorageTripTable => config.storage.trip_table = self.path(value)?,
            ConfigKey::StorageSelectionFile => config.storage.selection_file = self.path(value)?,
            ConfigKey::StorageLogDir => config.storage.log_dir = self.path(value)?,
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn int(&self, value: &str) -> Result<u64, ConfigError> {
        value
            .parse::<u64>()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn positive_int(&self, value: &str) -> Result<u64, ConfigError> {
        match self.int(value)? {
            0 => Err(self.invalid(value, "must be greater than zero")),
            n => Ok(n),
        }
    }

    fn non_negative_float(&self, value: &str) -> Result<f64, ConfigError> {
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(self.invalid(value, "expected a non-negative number")),
        }
    }

    fn path(&self, value: &str) -> Result<PathBuf, ConfigError> {
        if value.is_empty() {
            return Err(self.invalid(value, "path must not be empty"));
        }
        Ok(expand_tilde(value))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_tilde(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.poll.interval, Duration::from_millis(3000));
        assert_eq!(config.animation.min_duration, Duration::from_millis(350));
        assert_eq!(config.animation.max_duration, Duration::from_millis(2500));
        assert_eq!(config.bearing.movement_threshold_deg, 0.00002);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = LiveConfig::load_from(&temp.path().join("config.ini")).unwrap();
        assert_eq!(config, LiveConfig::default());
    }

    #[test]
    fn test_load_values_and_ignore_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(
            &path,
            "[poll]\ninterval_ms = 5000\nfuture_key = 1\n\n[bearing]\nmovement_threshold_deg = 0.0001\n\n[extra]\nx = y\n",
        )
        .unwrap();

        let config = LiveConfig::load_from(&path).unwrap();
        assert_eq!(config.poll.interval, Duration::from_millis(5000));
        assert_eq!(config.bearing.movement_threshold_deg, 0.0001);
    }

    #[test]
    fn test_max_duration_derived_from_poll_interval() {
        let mut ini = Ini::new();
        ini.with_section(Some("poll")).set("interval_ms", "1000");
        let config = LiveConfig::from_ini(&ini).unwrap();
        assert_eq!(config.animation.max_duration.as_millis(), 850);
    }

    #[test]
    fn test_explicit_max_duration_wins() {
        let mut ini = Ini::new();
        ini.with_section(Some("poll")).set("interval_ms", "1000");
        ini.with_section(Some("animation")).set("max_duration_ms", "600");
        let config = LiveConfig::from_ini(&ini).unwrap();
        assert_eq!(config.animation.max_duration, Duration::from_millis(600));
    }

    #[test]
    fn test_setting_interval_rederives_max_duration() {
        let mut config = LiveConfig::default();
        ConfigKey::PollIntervalMs.set(&mut config, "1000").unwrap();
        assert_eq!(config.animation.max_duration, Duration::from_millis(850));

        ConfigKey::AnimationMaxDurationMs
            .set(&mut config, "700")
            .unwrap();
        ConfigKey::PollIntervalMs.set(&mut config, "2000").unwrap();
        assert_eq!(config.animation.max_duration, Duration::from_millis(700));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = LiveConfig::default();
        assert!(matches!(
            ConfigKey::PollIntervalMs.set(&mut config, "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(ConfigKey::PollIntervalMs.set(&mut config, "0").is_err());
        assert!(ConfigKey::AnimationZoom.set(&mut config, "30").is_err());
        assert!(ConfigKey::PollApiUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::BearingMovementThresholdDeg
            .set(&mut config, "-1")
            .is_err());
    }

    #[test]
    fn test_max_below_min_is_rejected() {
        let mut ini = Ini::new();
        ini.with_section(Some("animation")).set("min_duration_ms", "500");
        ini.with_section(Some("animation")).set("max_duration_ms", "100");
        assert!(LiveConfig::from_ini(&ini).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sub").join("config.ini");

        let mut config = LiveConfig::default();
        ConfigKey::PollApiUrl
            .set(&mut config, "http://localhost:8080/vehicles")
            .unwrap();
        ConfigKey::AnimationZoom.set(&mut config, "12.5").unwrap();
        ConfigKey::StorageTripTable
            .set(&mut config, "/data/trips.json")
            .unwrap();
        config.save_to(&path).unwrap();

        let loaded = LiveConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(
            "poll.interval_ms".parse::<ConfigKey>().unwrap(),
            ConfigKey::PollIntervalMs
        );
        assert!(matches!(
            "poll.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
            assert_eq!(key.to_string(), key.name());
        }
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/trips.json"), home.join("trips.json"));
        }
        assert_eq!(expand_tilde("/abs/trips.json"), PathBuf::from("/abs/trips.json"));
    }
}
