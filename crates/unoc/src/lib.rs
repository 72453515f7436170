//! # UNOC - access network digital twin
//!
//! Simulation engine for a fiber access network: PON and point-to-point last
//! mile plus ERPS-style aggregation rings. Operators inject faults, reconfigure
//! links and watch the cascade.
//!
//! ## Core Capabilities
//!
//! - **Reversible commands**: every simulated action can be undone and redone
//! - **Fault propagation**: fiber cuts take down everything downstream
//! - **Ring protection**: a failed ring segment unblocks the protection link
//! - **Optical budget**: received power per end device with a loss breakdown
//! - **Alarm lifecycle**: loss of signal and utilization alarms, raised and cleared

pub mod alarms;
pub mod budget;
pub mod commands;
pub mod config;
pub mod events;
pub mod model;
pub mod protection;
pub mod simulator;
pub mod snapshot;
pub mod store;
pub mod topology;

#[cfg(test)]
mod test_fixtures;


pub use alarms::{Alarm, AlarmKind, AlarmManager, AlarmSeverity, AlarmStatus};
pub use budget::{BudgetOutcome, BudgetReport, LossBreakdown, OpticalBudget, SignalStatus};
pub use commands::{CommandHistory, CompositeCommand, HistoryStatus, SimulationCommand};
pub use config::{BudgetConfig, SimulatorConfig};
pub use events::{FullStateChanged, TopologyStats};
pub use model::{
    Device, DeviceStatus, DeviceType, Link, LinkStatus, LinkTechnology, ObjectKind, Ring,
    TopologyDocument, TopologySnapshot,
};
pub use protection::{RingState, RingStatus};
pub use simulator::{FiberCutOutcome, Simulator};
pub use store::{InMemoryStore, TopologyStore};
pub use topology::{
    engine::{BlastRadius, Path, PathEngine},
    graph::TopologyGraph,
    invariants::{InvariantChecker, InvariantViolation},
};

/// Main error type for simulator operations
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ObjectKind, id: String },

    #[error("Validation error: {message}")]
    Validation { id: Option<String>, message: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Signal budget not applicable to {device_type} '{device_id}'")]
    NotApplicable { device_id: String, device_type: String },

    #[error("Unsupported topology version {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimulatorError {
    pub fn not_found(kind: ObjectKind, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(id: Option<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            id,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
