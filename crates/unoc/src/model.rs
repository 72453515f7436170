//! Data model for the simulated access network

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Result, SimulatorError};

/// Topology document version accepted by seed loading and snapshots
pub const SUPPORTED_TOPOLOGY_VERSION: &str = "1.0.0";

/// Open key/value attributes that vary by hardware type
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// Read a numeric property, falling back to `default` when absent or not a number
pub fn property_f64(properties: &PropertyMap, key: &str, default: f64) -> f64 {
    properties
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

/// Read a string property
pub fn property_str<'a>(properties: &'a PropertyMap, key: &str) -> Option<&'a str> {
    properties.get(key).and_then(|v| v.as_str())
}

/// Kind of object an id refers to, used in errors and alarms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Device,
    Link,
    Ring,
    Snapshot,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Device => "device",
            Self::Link => "link",
            Self::Ring => "ring",
            Self::Snapshot => "snapshot",
        };
        f.write_str(s)
    }
}

/// Hardware class of a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    Olt,
    Ont,
    Splitter,
    AonSwitch,
    BusinessNt,
    Other(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Olt => "OLT",
            Self::Ont => "ONT",
            Self::Splitter => "Splitter",
            Self::AonSwitch => "AON Switch",
            Self::BusinessNt => "Business NT",
            Self::Other(s) => s,
        }
    }

    /// Devices that transmit downstream light (OLT / AON switch)
    pub fn is_head_end(&self) -> bool {
        matches!(self, Self::Olt | Self::AonSwitch)
    }

    /// Subscriber-side devices whose received power is budgeted
    pub fn is_end_device(&self) -> bool {
        matches!(self, Self::Ont | Self::BusinessNt)
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OLT" => Self::Olt,
            "ONT" => Self::Ont,
            "Splitter" => Self::Splitter,
            "AON Switch" => Self::AonSwitch,
            "Business NT" => Self::BusinessNt,
            _ => Self::Other(s),
        }
    }
}

impl From<DeviceType> for String {
    fn from(t: DeviceType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Maintenance,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(SimulatorError::validation(
                None,
                format!("invalid device status '{other}' (expected online, offline or maintenance)"),
            )),
        }
    }
}

/// Operational status of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
    Degraded,
    Blocking,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Degraded => "degraded",
            Self::Blocking => "blocking",
        }
    }

    /// Whether traffic is carried over a link in this state
    pub fn is_forwarding(&self) -> bool {
        matches!(self, Self::Up | Self::Degraded)
    }

    /// Whether this status is a fault that ring protection reacts to
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Down | Self::Degraded)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "degraded" => Ok(Self::Degraded),
            "blocking" => Ok(Self::Blocking),
            other => Err(SimulatorError::validation(
                None,
                format!("invalid link status '{other}' (expected up, down, degraded or blocking)"),
            )),
        }
    }
}

/// Physical transport technology of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub enum LinkTechnology {
    #[serde(rename = "PON")]
    Pon,
    #[serde(rename = "PtP")]
    PtP,
}

impl LinkTechnology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pon => "PON",
            Self::PtP => "PtP",
        }
    }
}

/// A network element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Device {
    pub id: String,
    #[serde(rename = "type")]
    #[ts(type = "string")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: PropertyMap,
    /// [lat, lon]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<(f64, f64)>,
}

impl Device {
    pub fn new(id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            device_type,
            status: DeviceStatus::Online,
            properties: PropertyMap::new(),
            coordinates: None,
        }
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}

/// A fiber connection between two devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    pub status: LinkStatus,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub properties: PropertyMap,
}

impl Link {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            status: LinkStatus::Up,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_status(mut self, status: LinkStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn touches(&self, device_id: &str) -> bool {
        self.source == device_id || self.target == device_id
    }

    pub fn length_km(&self) -> f64 {
        property_f64(&self.properties, "length_km", 0.0)
    }

    pub fn connector_count(&self) -> f64 {
        property_f64(&self.properties, "connector_count", 0.0)
    }

    pub fn splice_count(&self) -> f64 {
        property_f64(&self.properties, "splice_count", 0.0)
    }

    pub fn utilization_percent(&self) -> f64 {
        property_f64(&self.properties, "utilization_percent", 0.0)
    }

    pub fn guaranteed_bandwidth_gbps(&self) -> f64 {
        property_f64(&self.properties, "guaranteed_bandwidth_gbps", 0.0)
    }

    /// Declared technology, if any
    pub fn technology(&self) -> Option<LinkTechnology> {
        match property_str(&self.properties, "link_technology") {
            Some("PON") => Some(LinkTechnology::Pon),
            Some("PtP") => Some(LinkTechnology::PtP),
            _ => None,
        }
    }
}

/// An ERPS-style protection ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Ring {
    pub id: String,
    pub name: String,
    pub nodes: Vec<String>,
    pub rpl_link_id: String,
}

impl Ring {
    pub fn contains(&self, device_id: &str) -> bool {
        self.nodes.iter().any(|n| n == device_id)
    }

    /// Whether both endpoints of `link` are members of this ring
    pub fn spans(&self, link: &Link) -> bool {
        self.contains(&link.source) && self.contains(&link.target)
    }
}

/// Devices, links and rings as one serializable unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    #[serde(default)]
    pub rings: Vec<Ring>,
}

/// Versioned topology document used for seeding and snapshot files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDocument {
    pub version: String,
    #[serde(flatten)]
    pub topology: TopologySnapshot,
}

impl TopologyDocument {
    pub fn new(topology: TopologySnapshot) -> Self {
        Self {
            version: SUPPORTED_TOPOLOGY_VERSION.to_string(),
            topology,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(raw)?;
        doc.check_version()?;
        Ok(doc)
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != SUPPORTED_TOPOLOGY_VERSION {
            return Err(SimulatorError::UnsupportedVersion {
                found: self.version.clone(),
                expected: SUPPORTED_TOPOLOGY_VERSION.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("down".parse::<LinkStatus>().unwrap(), LinkStatus::Down);
        assert_eq!("maintenance".parse::<DeviceStatus>().unwrap(), DeviceStatus::Maintenance);

        let err = "broken".parse::<LinkStatus>().unwrap_err();
        assert!(matches!(err, SimulatorError::Validation { .. }));
    }

    #[test]
    fn test_device_type_keeps_unknown_labels() {
        let parsed: DeviceType = serde_json::from_str("\"Media Converter\"").unwrap();
        assert_eq!(parsed, DeviceType::Other("Media Converter".to_string()));
        assert_eq!(serde_json::to_string(&DeviceType::AonSwitch).unwrap(), "\"AON Switch\"");
        assert!(DeviceType::BusinessNt.is_end_device());
        assert!(!DeviceType::Splitter.is_head_end());
    }

    #[test]
    fn test_document_rejects_unknown_version() {
        let raw = r#"{"version": "0.9.0", "devices": [], "links": []}"#;
        let err = TopologyDocument::from_json_str(raw).unwrap_err();
        assert!(matches!(err, SimulatorError::UnsupportedVersion { .. }));

        let ok = r#"{"version": "1.0.0", "devices": [{"id": "OLT-1", "type": "OLT", "status": "online"}], "links": []}"#;
        let doc = TopologyDocument::from_json_str(ok).unwrap();
        assert_eq!(doc.topology.devices[0].device_type, DeviceType::Olt);
        assert!(doc.topology.rings.is_empty());
    }

    #[test]
    fn test_link_typed_properties() {
        let link = Link::new("L1", "A", "B")
            .with_property("length_km", 2.5)
            .with_property("link_technology", "PtP");
        assert_eq!(link.length_km(), 2.5);
        assert_eq!(link.connector_count(), 0.0);
        assert_eq!(link.technology(), Some(LinkTechnology::PtP));
        assert!(link.touches("B"));
    }
}
