//! Shared reference network for unit tests
//!
//! ```text
//!   CORE-01 -> CORE-02 -> CORE-03 -> CORE-01   (ring, RPL ring-c3-c1)
//!      |          |
//!   OLT-01     AON-01 -> BNT-01                 (PtP)
//!      |
//!   SPLITTER-01 -> ONT-01, ONT-02               (PON)
//! ```

use serde_json::json;

use crate::model::{Device, DeviceType, Link, Ring, TopologySnapshot};
use crate::store::InMemoryStore;

pub const RPL_LINK: &str = "ring-c3-c1";

pub fn reference_topology() -> TopologySnapshot {
    let core = || DeviceType::Other("Core Router".to_string());

    let devices = vec![
        Device::new("CORE-01", core()),
        Device::new("CORE-02", core()),
        Device::new("CORE-03", core()),
        Device::new("OLT-01", DeviceType::Olt).with_property("transmit_power_dbm", 4.0),
        Device::new("AON-01", DeviceType::AonSwitch).with_property("transmit_power_dbm", 2.0),
        Device::new("SPLITTER-01", DeviceType::Splitter).with_property("insertion_loss_db", 10.5),
        Device::new("ONT-01", DeviceType::Ont)
            .with_property("technology", "GPON")
            .with_property("sensitivity_min_dbm", -28.0),
        Device::new("ONT-02", DeviceType::Ont).with_property("technology", "GPON"),
        Device::new("BNT-01", DeviceType::BusinessNt).with_property("sensitivity_min_dbm", -24.0),
    ];

    let links = vec![
        Link::new("ring-c1-c2", "CORE-01", "CORE-02"),
        Link::new("ring-c2-c3", "CORE-02", "CORE-03"),
        Link::new(RPL_LINK, "CORE-03", "CORE-01"),
        Link::new("link-c1-olt1", "CORE-01", "OLT-01"),
        Link::new("link-c2-aon1", "CORE-02", "AON-01"),
        Link::new("link-olt1-spl1", "OLT-01", "SPLITTER-01")
            .with_property("length_km", 2.5)
            .with_property("link_technology", "PON")
            .with_property("utilization_percent", 40.0),
        Link::new("link-spl1-ont1", "SPLITTER-01", "ONT-01")
            .with_property("length_km", 0.8)
            .with_property("link_technology", "PON"),
        Link::new("link-spl1-ont2", "SPLITTER-01", "ONT-02")
            .with_property("length_km", 1.2)
            .with_property("connector_count", 2)
            .with_property("splice_count", 3)
            .with_property("link_technology", "PON"),
        Link::new("link-aon1-bnt1", "AON-01", "BNT-01")
            .with_property("length_km", 5.0)
            .with_property("connector_count", 2)
            .with_property("splice_count", 4)
            .with_property("link_technology", "PtP")
            .with_property("guaranteed_bandwidth_gbps", json!(1.0))
            .with_property("utilization_percent", 50.0),
    ];

    let rings = vec![Ring {
        id: "RING-CORE".to_string(),
        name: "Core Ring".to_string(),
        nodes: vec![
            "CORE-01".to_string(),
            "CORE-02".to_string(),
            "CORE-03".to_string(),
        ],
        rpl_link_id: RPL_LINK.to_string(),
    }];

    TopologySnapshot { devices, links, rings }
}

pub fn reference_store() -> InMemoryStore {
    InMemoryStore::from_topology(reference_topology()).expect("reference topology is valid")
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Route engine logs to the test writer; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("unoc=debug")
        .try_init();
}
