//! Alarm lifecycle - raise on threshold breach, clear on recovery
//!
//! At most one ACTIVE alarm exists per (object, kind). Alarms are never
//! deleted, only moved to CLEARED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::budget::SignalStatus;
use crate::model::{Link, LinkTechnology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmSeverity {
    Warning,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmStatus {
    Active,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum AffectedObjectType {
    Device,
    Link,
}

/// Stable alarm label, serialized as the alarm description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
pub enum AlarmKind {
    #[serde(rename = "Loss of Signal")]
    LossOfSignal,
    #[serde(rename = "High Utilization")]
    HighUtilization,
    #[serde(rename = "SLA Violation Risk")]
    SlaViolationRisk,
}

impl AlarmKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LossOfSignal => "Loss of Signal",
            Self::HighUtilization => "High Utilization",
            Self::SlaViolationRisk => "SLA Violation Risk",
        }
    }

    pub fn severity(&self) -> AlarmSeverity {
        match self {
            Self::LossOfSignal => AlarmSeverity::Critical,
            Self::SlaViolationRisk => AlarmSeverity::Major,
            Self::HighUtilization => AlarmSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Alarm {
    pub id: Uuid,
    pub severity: AlarmSeverity,
    pub status: AlarmStatus,
    pub timestamp_raised: DateTime<Utc>,
    pub timestamp_cleared: Option<DateTime<Utc>>,
    pub affected_object_type: AffectedObjectType,
    pub affected_object_id: String,
    pub description: AlarmKind,
}

impl Alarm {
    pub fn is_active(&self) -> bool {
        self.status == AlarmStatus::Active
    }
}

/// A lifecycle transition produced by a check
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmChange {
    Raised(Alarm),
    Cleared(Alarm),
}

impl AlarmChange {
    pub fn alarm(&self) -> &Alarm {
        match self {
            Self::Raised(alarm) | Self::Cleared(alarm) => alarm,
        }
    }

    pub fn describe(&self) -> String {
        let (verb, alarm) = match self {
            Self::Raised(alarm) => ("raised", alarm),
            Self::Cleared(alarm) => ("cleared", alarm),
        };
        format!(
            "{:?} '{}' {} for {} '{}'",
            alarm.severity,
            alarm.description.label(),
            verb,
            match alarm.affected_object_type {
                AffectedObjectType::Device => "device",
                AffectedObjectType::Link => "link",
            },
            alarm.affected_object_id
        )
    }
}

/// Owns every alarm raised during the simulation
#[derive(Debug)]
pub struct AlarmManager {
    alarms: Vec<Alarm>,
    utilization_threshold_percent: f64,
}

impl AlarmManager {
    pub fn new(utilization_threshold_percent: f64) -> Self {
        Self {
            alarms: Vec::new(),
            utilization_threshold_percent,
        }
    }

    pub fn all(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn active(&self) -> Vec<Alarm> {
        self.alarms.iter().filter(|a| a.is_active()).cloned().collect()
    }

    pub fn find_active(&self, object_id: &str, kind: AlarmKind) -> Option<&Alarm> {
        self.alarms
            .iter()
            .find(|a| a.is_active() && a.affected_object_id == object_id && a.description == kind)
    }

    /// Clear every active alarm; records are kept.
    ///
    /// Snapshot restore calls this before re-evaluating the restored topology.
    pub fn clear_all(&mut self) -> Vec<AlarmChange> {
        let active: Vec<(String, AlarmKind)> = self
            .alarms
            .iter()
            .filter(|a| a.is_active())
            .map(|a| (a.affected_object_id.clone(), a.description))
            .collect();

        active
            .into_iter()
            .filter_map(|(object_id, kind)| self.clear(&object_id, kind))
            .collect()
    }

    /// Raise or clear the utilization alarm of a link.
    ///
    /// PtP links only alarm when they carry a guaranteed bandwidth, and then as
    /// an SLA risk; all other links raise a plain high-utilization warning.
    pub fn check_utilization_alarm(&mut self, link: &Link) -> Vec<AlarmChange> {
        let over = link.utilization_percent() > self.utilization_threshold_percent;
        let wanted = match link.technology() {
            Some(LinkTechnology::PtP) if over && link.guaranteed_bandwidth_gbps() > 0.0 => {
                Some(AlarmKind::SlaViolationRisk)
            }
            Some(LinkTechnology::PtP) => None,
            _ if over => Some(AlarmKind::HighUtilization),
            _ => None,
        };

        let mut changes = Vec::new();
        for kind in [AlarmKind::HighUtilization, AlarmKind::SlaViolationRisk] {
            let change = if wanted == Some(kind) {
                self.raise(AffectedObjectType::Link, &link.id, kind)
            } else {
                self.clear(&link.id, kind)
            };
            changes.extend(change);
        }
        changes
    }

    /// Raise or clear the loss-of-signal alarm of an end device
    pub fn check_signal_alarm(&mut self, device_id: &str, signal: SignalStatus) -> Option<AlarmChange> {
        if signal == SignalStatus::Los {
            self.raise(AffectedObjectType::Device, device_id, AlarmKind::LossOfSignal)
        } else {
            self.clear(device_id, AlarmKind::LossOfSignal)
        }
    }

    fn raise(&mut self, object_type: AffectedObjectType, object_id: &str, kind: AlarmKind) -> Option<AlarmChange> {
        if self.find_active(object_id, kind).is_some() {
            return None;
        }

        let alarm = Alarm {
            id: Uuid::new_v4(),
            severity: kind.severity(),
            status: AlarmStatus::Active,
            timestamp_raised: Utc::now(),
            timestamp_cleared: None,
            affected_object_type: object_type,
            affected_object_id: object_id.to_string(),
            description: kind,
        };
        tracing::info!("[ALARMS] {} raised on '{}'", kind.label(), object_id);
        self.alarms.push(alarm.clone());
        Some(AlarmChange::Raised(alarm))
    }

    fn clear(&mut self, object_id: &str, kind: AlarmKind) -> Option<AlarmChange> {
        let alarm = self
            .alarms
            .iter_mut()
            .find(|a| a.is_active() && a.affected_object_id == object_id && a.description == kind)?;

        alarm.status = AlarmStatus::Cleared;
        alarm.timestamp_cleared = Some(Utc::now());
        tracing::info!("[ALARMS] {} cleared on '{}'", kind.label(), object_id);
        Some(AlarmChange::Cleared(alarm.clone()))
    }
}
