//! Topological invariants - Rules that must hold for every loaded topology
//!
//! Seeding and snapshot restore run the checker before anything touches the
//! store. Error-level violations reject the topology; warnings are logged.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

use crate::model::TopologySnapshot;
use crate::{Result, SimulatorError};

/// A violation of a topological invariant
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InvariantViolation {
    pub invariant_name: String,
    pub severity: ViolationSeverity,
    pub message: String,
    /// Id of the offending device, link or ring
    pub object_id: String,
}

/// Severity levels for invariant violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub enum ViolationSeverity {
    /// Could cause odd simulation results, tolerated
    Warning,
    /// Violates a required invariant, topology is rejected
    Error,
}

impl InvariantViolation {
    fn error(name: &str, object_id: &str, message: String) -> Self {
        Self {
            invariant_name: name.to_string(),
            severity: ViolationSeverity::Error,
            message,
            object_id: object_id.to_string(),
        }
    }

    fn warning(name: &str, object_id: &str, message: String) -> Self {
        Self {
            invariant_name: name.to_string(),
            severity: ViolationSeverity::Warning,
            message,
            object_id: object_id.to_string(),
        }
    }
}

/// Invariant checker for topology validation
pub struct InvariantChecker {
    /// Enable strict mode (all warnings become errors)
    strict_mode: bool,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Check all invariants against a topology
    pub fn check_all(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        violations.extend(self.check_unique_ids(topology));
        violations.extend(self.check_no_orphan_links(topology));
        violations.extend(self.check_no_self_loops(topology));
        violations.extend(self.check_ring_membership(topology));
        violations.extend(self.check_rpl_within_ring(topology));

        if self.strict_mode {
            for v in &mut violations {
                if v.severity == ViolationSeverity::Warning {
                    v.severity = ViolationSeverity::Error;
                }
            }
        }

        violations
    }

    /// Fail on the first error-level violation, log the warnings
    pub fn ensure_valid(&self, topology: &TopologySnapshot) -> Result<()> {
        let violations = self.check_all(topology);
        for v in &violations {
            if v.severity == ViolationSeverity::Warning {
                tracing::warn!("[INVARIANTS] {}: {}", v.invariant_name, v.message);
            }
        }

        match violations
            .into_iter()
            .find(|v| v.severity == ViolationSeverity::Error)
        {
            Some(v) => Err(SimulatorError::validation(Some(v.object_id), v.message)),
            None => Ok(()),
        }
    }

    fn check_unique_ids(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for device in &topology.devices {
            if !seen.insert(device.id.as_str()) {
                violations.push(InvariantViolation::error(
                    "unique_device_ids",
                    &device.id,
                    format!("Device id '{}' is defined more than once", device.id),
                ));
            }
        }

        let mut seen = HashSet::new();
        for link in &topology.links {
            if !seen.insert(link.id.as_str()) {
                violations.push(InvariantViolation::error(
                    "unique_link_ids",
                    &link.id,
                    format!("Link id '{}' is defined more than once", link.id),
                ));
            }
        }

        let mut seen = HashSet::new();
        for ring in &topology.rings {
            if !seen.insert(ring.id.as_str()) {
                violations.push(InvariantViolation::error(
                    "unique_ring_ids",
                    &ring.id,
                    format!("Ring id '{}' is defined more than once", ring.id),
                ));
            }
        }

        violations
    }

    /// Every link endpoint must name an existing device
    fn check_no_orphan_links(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        let device_ids: HashSet<&str> = topology.devices.iter().map(|d| d.id.as_str()).collect();

        topology
            .links
            .iter()
            .filter_map(|link| {
                let missing: Vec<&str> = [link.source.as_str(), link.target.as_str()]
                    .into_iter()
                    .filter(|id| !device_ids.contains(id))
                    .collect();
                if missing.is_empty() {
                    None
                } else {
                    Some(InvariantViolation::error(
                        "no_orphan_links",
                        &link.id,
                        format!("Link '{}' references non-existent devices: {:?}", link.id, missing),
                    ))
                }
            })
            .collect()
    }

    fn check_no_self_loops(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        topology
            .links
            .iter()
            .filter(|link| link.source == link.target)
            .map(|link| {
                InvariantViolation::warning(
                    "no_self_loops",
                    &link.id,
                    format!("Link '{}' is a self-loop on device '{}'", link.id, link.source),
                )
            })
            .collect()
    }

    /// Ring members must exist and belong to exactly one ring
    fn check_ring_membership(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let device_ids: HashSet<&str> = topology.devices.iter().map(|d| d.id.as_str()).collect();
        let mut owner: HashMap<&str, &str> = HashMap::new();

        for ring in &topology.rings {
            for node in &ring.nodes {
                if !device_ids.contains(node.as_str()) {
                    violations.push(InvariantViolation::error(
                        "ring_members_exist",
                        &ring.id,
                        format!("Ring '{}' lists unknown device '{}'", ring.id, node),
                    ));
                }
                if let Some(other) = owner.insert(node.as_str(), ring.id.as_str()) {
                    if other != ring.id {
                        violations.push(InvariantViolation::error(
                            "single_ring_membership",
                            node,
                            format!(
                                "Device '{}' belongs to both ring '{}' and ring '{}'",
                                node, other, ring.id
                            ),
                        ));
                    }
                }
            }
        }

        violations
    }

    /// The RPL must exist and connect two members of its ring
    fn check_rpl_within_ring(&self, topology: &TopologySnapshot) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for ring in &topology.rings {
            match topology.links.iter().find(|l| l.id == ring.rpl_link_id) {
                None => violations.push(InvariantViolation::error(
                    "rpl_exists",
                    &ring.id,
                    format!(
                        "Ring '{}' names unknown RPL link '{}'",
                        ring.id, ring.rpl_link_id
                    ),
                )),
                Some(rpl) if !ring.spans(rpl) => violations.push(InvariantViolation::error(
                    "rpl_within_ring",
                    &ring.id,
                    format!(
                        "RPL '{}' of ring '{}' does not connect two ring members",
                        rpl.id, ring.id
                    ),
                )),
                Some(_) => {}
            }
        }

        violations
    }
}
