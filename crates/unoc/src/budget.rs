//! Optical power budget along the path from a head-end to an end device
//!
//! Linear dB model: transmit power minus fiber, connector, splice and
//! splitter losses and a fixed maintenance margin.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::BudgetConfig;
use crate::model::{
    property_f64, property_str, Device, DeviceType, Link, LinkTechnology, ObjectKind,
    TopologySnapshot,
};
use crate::topology::engine::{Path, PathEngine, PathOutcome};
use crate::topology::graph::TopologyGraph;
use crate::{Result, SimulatorError};

/// Transmit power assumed for head-ends without `transmit_power_dbm`
const DEFAULT_TRANSMIT_POWER_DBM: f64 = 0.0;

/// Signal classification of an end device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub enum SignalStatus {
    #[serde(rename = "online")]
    Online,
    /// Loss of signal
    #[serde(rename = "LOS")]
    Los,
}

/// Per-component losses of a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct LossBreakdown {
    pub transmit_power_dbm: f64,
    pub fiber_loss_db: f64,
    pub connector_loss_db: f64,
    pub splice_loss_db: f64,
    pub splitter_loss_db: f64,
    pub maintenance_margin_db: f64,
}

impl LossBreakdown {
    pub fn total_loss_db(&self) -> f64 {
        self.fiber_loss_db
            + self.connector_loss_db
            + self.splice_loss_db
            + self.splitter_loss_db
            + self.maintenance_margin_db
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BudgetReport {
    pub device_id: String,
    pub head_end_id: String,
    pub path: Path,
    pub path_technology: LinkTechnology,
    pub wavelength_nm: Option<u32>,
    pub attenuation_db_per_km: f64,
    pub breakdown: LossBreakdown,
    pub total_loss_db: f64,
    pub received_power_dbm: f64,
    pub sensitivity_dbm: f64,
    pub status: SignalStatus,
}

/// The first element on the nearest path that carries no light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct UnavailableElement {
    pub kind: ObjectKind,
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetOutcome {
    Ok(BudgetReport),
    NoPath {
        device_id: String,
        unavailable: Option<UnavailableElement>,
    },
}

impl BudgetOutcome {
    /// Classification fed into the alarm manager; no path means no light
    pub fn signal_status(&self) -> SignalStatus {
        match self {
            Self::Ok(report) => report.status,
            Self::NoPath { .. } => SignalStatus::Los,
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::Ok(report) => &report.device_id,
            Self::NoPath { device_id, .. } => device_id,
        }
    }
}

/// Calculator for end-device received power
pub struct OpticalBudget<'a> {
    config: &'a BudgetConfig,
    devices: HashMap<&'a str, &'a Device>,
    links: HashMap<&'a str, &'a Link>,
    graph: &'a TopologyGraph,
    /// `graph` without links that carry no light
    forwarding: TopologyGraph,
}

impl<'a> OpticalBudget<'a> {
    pub fn new(config: &'a BudgetConfig, topology: &'a TopologySnapshot, graph: &'a TopologyGraph) -> Self {
        Self {
            config,
            devices: topology.devices.iter().map(|d| (d.id.as_str(), d)).collect(),
            links: topology.links.iter().map(|l| (l.id.as_str(), l)).collect(),
            graph,
            forwarding: graph.restricted(|e| e.status.is_forwarding()),
        }
    }

    /// Ids of every device whose signal is budgeted, in topology order
    pub fn end_devices(&self) -> Vec<&'a str> {
        self.graph
            .nodes
            .values()
            .filter(|n| n.device_type.is_end_device())
            .filter_map(|n| self.devices.get(n.id.as_str()).copied())
            .map(|d| d.id.as_str())
            .collect()
    }

    pub fn compute(&self, device_id: &str) -> Result<BudgetOutcome> {
        let device = self
            .devices
            .get(device_id)
            .copied()
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Device, device_id))?;

        if !device.device_type.is_end_device() {
            return Err(SimulatorError::NotApplicable {
                device_id: device_id.to_string(),
                device_type: device.device_type.to_string(),
            });
        }

        let head_ends = self.graph.head_ends();
        let live_head_ends: Vec<&str> = head_ends
            .iter()
            .copied()
            .filter(|id| self.graph.get_node(id).is_some_and(|n| n.is_available()))
            .collect();
        match PathEngine::shortest_path_from_any(&self.forwarding, &live_head_ends, device_id, |n| n.is_available()) {
            PathOutcome::Found { head_end, path } => Ok(BudgetOutcome::Ok(self.report(device, &head_end, path))),
            PathOutcome::NoPath => {
                let unavailable = match PathEngine::shortest_path_from_any(self.graph, &head_ends, device_id, |_| true) {
                    PathOutcome::Found { path, .. } => self.first_unavailable(&path),
                    PathOutcome::NoPath => None,
                };
                tracing::debug!("[BUDGET] no path to '{}' (unavailable: {:?})", device_id, unavailable);
                Ok(BudgetOutcome::NoPath {
                    device_id: device_id.to_string(),
                    unavailable,
                })
            }
        }
    }

    fn report(&self, device: &Device, head_end_id: &str, path: Path) -> BudgetReport {
        let transmit_power_dbm = self
            .devices
            .get(head_end_id)
            .map(|d| property_f64(&d.properties, "transmit_power_dbm", DEFAULT_TRANSMIT_POWER_DBM))
            .unwrap_or(DEFAULT_TRANSMIT_POWER_DBM);

        let wavelength_nm = Self::wavelength_for(device);
        let attenuation = self.config.attenuation_for(wavelength_nm);

        let path_links: Vec<&Link> = path
            .links
            .iter()
            .filter_map(|id| self.links.get(id.as_str()).copied())
            .collect();

        let fiber_loss_db: f64 = path_links.iter().map(|l| l.length_km() * attenuation).sum();
        let connector_loss_db: f64 = path_links
            .iter()
            .map(|l| l.connector_count() * self.config.connector_loss_db)
            .sum();
        let splice_loss_db: f64 = path_links
            .iter()
            .map(|l| l.splice_count() * self.config.splice_loss_db)
            .sum();

        let path_technology = path_links
            .last()
            .and_then(|l| l.technology())
            .unwrap_or(LinkTechnology::Pon);

        let splitter_loss_db: f64 = match path_technology {
            LinkTechnology::Pon => path
                .nodes
                .iter()
                .filter_map(|id| self.devices.get(id.as_str()))
                .filter(|d| d.device_type == DeviceType::Splitter)
                .map(|d| property_f64(&d.properties, "insertion_loss_db", 0.0))
                .sum(),
            LinkTechnology::PtP => 0.0,
        };

        let breakdown = LossBreakdown {
            transmit_power_dbm,
            fiber_loss_db,
            connector_loss_db,
            splice_loss_db,
            splitter_loss_db,
            maintenance_margin_db: self.config.maintenance_margin_db,
        };
        let total_loss_db = breakdown.total_loss_db();
        let received_power_dbm = transmit_power_dbm - total_loss_db;
        let sensitivity_dbm = property_f64(
            &device.properties,
            "sensitivity_min_dbm",
            self.config.default_sensitivity_dbm,
        );
        let status = if received_power_dbm >= sensitivity_dbm {
            SignalStatus::Online
        } else {
            SignalStatus::Los
        };

        tracing::debug!(
            "[BUDGET] {} via {}: rx {:.2} dBm (loss {:.2} dB, floor {:.2} dBm) -> {:?}",
            device.id,
            head_end_id,
            received_power_dbm,
            total_loss_db,
            sensitivity_dbm,
            status
        );

        BudgetReport {
            device_id: device.id.clone(),
            head_end_id: head_end_id.to_string(),
            path,
            path_technology,
            wavelength_nm,
            attenuation_db_per_km: attenuation,
            breakdown,
            total_loss_db,
            received_power_dbm,
            sensitivity_dbm,
            status,
        }
    }

    /// Downstream wavelength from an explicit `wavelength_nm` or the device technology
    fn wavelength_for(device: &Device) -> Option<u32> {
        if let Some(nm) = device.properties.get("wavelength_nm").and_then(|v| v.as_u64()) {
            return u32::try_from(nm).ok();
        }

        let technology = property_str(&device.properties, "technology")?.to_ascii_uppercase();
        if technology.starts_with("XGS") {
            Some(1577)
        } else if technology == "GPON" {
            Some(1490)
        } else {
            None
        }
    }

    fn first_unavailable(&self, path: &Path) -> Option<UnavailableElement> {
        for (idx, node_id) in path.nodes.iter().enumerate() {
            if let Some(node) = self.graph.get_node(node_id) {
                if !node.is_available() {
                    return Some(UnavailableElement {
                        kind: ObjectKind::Device,
                        id: node_id.clone(),
                        status: node.status.to_string(),
                    });
                }
            }
            if let Some(edge) = path.links.get(idx).and_then(|id| self.graph.get_edge(id)) {
                if !edge.status.is_forwarding() {
                    return Some(UnavailableElement {
                        kind: ObjectKind::Link,
                        id: edge.id.clone(),
                        status: edge.status.to_string(),
                    });
                }
            }
        }
        None
    }
}
