//! Configuration for the simulation engine

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

const SNAPSHOT_DIR_ENV: &str = "UNOC_SNAPSHOT_DIR";
const EVENT_LOG_CAPACITY_ENV: &str = "UNOC_EVENT_LOG_CAPACITY";
const UTILIZATION_THRESHOLD_ENV: &str = "UNOC_UTILIZATION_THRESHOLD";

/// Constants of the linear optical budget model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// Always subtracted from the budget
    #[serde(default = "default_maintenance_margin")]
    pub maintenance_margin_db: f64,
    /// Loss per connector
    #[serde(default = "default_connector_loss")]
    pub connector_loss_db: f64,
    /// Loss per splice
    #[serde(default = "default_splice_loss")]
    pub splice_loss_db: f64,
    /// Fiber attenuation when the wavelength is unknown
    #[serde(default = "default_attenuation")]
    pub default_attenuation_db_per_km: f64,
    /// Receiver floor for devices without `sensitivity_min_dbm`
    #[serde(default = "default_sensitivity")]
    pub default_sensitivity_dbm: f64,
    /// Fiber attenuation by wavelength in nm
    #[serde(default = "default_attenuation_table")]
    pub attenuation_db_per_km: BTreeMap<u32, f64>,
}

fn default_maintenance_margin() -> f64 {
    3.0
}

fn default_connector_loss() -> f64 {
    0.5
}

fn default_splice_loss() -> f64 {
    0.1
}

fn default_attenuation() -> f64 {
    0.40
}

fn default_sensitivity() -> f64 {
    -30.0
}

fn default_attenuation_table() -> BTreeMap<u32, f64> {
    BTreeMap::from([(1310, 0.35), (1490, 0.35), (1550, 0.25), (1577, 0.30)])
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            maintenance_margin_db: default_maintenance_margin(),
            connector_loss_db: default_connector_loss(),
            splice_loss_db: default_splice_loss(),
            default_attenuation_db_per_km: default_attenuation(),
            default_sensitivity_dbm: default_sensitivity(),
            attenuation_db_per_km: default_attenuation_table(),
        }
    }
}

impl BudgetConfig {
    /// Attenuation for a wavelength, falling back to the default figure
    pub fn attenuation_for(&self, wavelength_nm: Option<u32>) -> f64 {
        wavelength_nm
            .and_then(|nm| self.attenuation_db_per_km.get(&nm).copied())
            .unwrap_or(self.default_attenuation_db_per_km)
    }
}

/// Core configuration for the simulator
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfig {
    /// Directory holding named snapshot files
    #[serde(default = "default_snapshot_dir")]
    #[ts(type = "string")]
    pub snapshot_dir: PathBuf,
    /// Number of entries kept in the event log
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    /// Buffer size of the state-change broadcast channel
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// Utilization above which a link alarm is raised
    #[serde(default = "default_utilization_threshold")]
    pub utilization_threshold_percent: f64,
    #[serde(default)]
    pub budget: BudgetConfig,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

fn default_event_log_capacity() -> usize {
    100
}

fn default_notification_capacity() -> usize {
    256
}

fn default_utilization_threshold() -> f64 {
    80.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            event_log_capacity: default_event_log_capacity(),
            notification_capacity: default_notification_capacity(),
            utilization_threshold_percent: default_utilization_threshold(),
            budget: BudgetConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Defaults overlaid with `UNOC_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(SNAPSHOT_DIR_ENV) {
            config.snapshot_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var(EVENT_LOG_CAPACITY_ENV) {
            match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => config.event_log_capacity = capacity,
                _ => tracing::warn!("{} '{}' is not a positive integer, ignoring", EVENT_LOG_CAPACITY_ENV, raw),
            }
        }

        if let Ok(raw) = std::env::var(UTILIZATION_THRESHOLD_ENV) {
            match raw.parse::<f64>() {
                Ok(threshold) if (0.0..=100.0).contains(&threshold) => {
                    config.utilization_threshold_percent = threshold
                }
                _ => tracing::warn!("{} '{}' is not a percentage, ignoring", UTILIZATION_THRESHOLD_ENV, raw),
            }
        }

        config
    }

    /// Configuration writing snapshots to `dir`
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }
}
