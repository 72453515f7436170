//! Topology store - the system of record for devices, links and rings
//!
//! The simulation engine only talks to the [`TopologyStore`] trait. A database
//! backed implementation lives outside this crate; [`InMemoryStore`] is the
//! default used for seeding, tests and snapshot restore.

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::model::{
    Device, DeviceStatus, Link, LinkStatus, ObjectKind, PropertyMap, Ring, TopologySnapshot,
};
use crate::topology::invariants::InvariantChecker;
use crate::{Result, SimulatorError};

/// Contract every topology backend implements
#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn get_device(&self, id: &str) -> Result<Device>;

    async fn get_link(&self, id: &str) -> Result<Link>;

    async fn list_devices(&self) -> Result<Vec<Device>>;

    async fn list_links(&self) -> Result<Vec<Link>>;

    async fn list_rings(&self) -> Result<Vec<Ring>>;

    async fn set_device_status(&self, id: &str, status: DeviceStatus) -> Result<()>;

    async fn set_link_status(&self, id: &str, status: LinkStatus) -> Result<()>;

    /// Replace the property map of a link
    async fn set_link_properties(&self, id: &str, properties: PropertyMap) -> Result<()>;

    /// Replace the whole content of the store (snapshot restore, reseed)
    async fn replace_all(&self, topology: TopologySnapshot) -> Result<()>;

    /// Read devices, links and rings as one consistent unit
    async fn snapshot(&self) -> Result<TopologySnapshot> {
        Ok(TopologySnapshot {
            devices: self.list_devices().await?,
            links: self.list_links().await?,
            rings: self.list_rings().await?,
        })
    }
}

#[derive(Debug, Default)]
struct StoreContents {
    devices: IndexMap<String, Device>,
    links: IndexMap<String, Link>,
    rings: IndexMap<String, Ring>,
}

impl StoreContents {
    fn from_snapshot(topology: TopologySnapshot) -> Self {
        Self {
            devices: topology.devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
            links: topology.links.into_iter().map(|l| (l.id.clone(), l)).collect(),
            rings: topology.rings.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }
}

/// In-process store keeping insertion (seed) order
#[derive(Debug, Default)]
pub struct InMemoryStore {
    contents: RwLock<StoreContents>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store, rejecting topologies that break structural invariants
    pub fn from_topology(topology: TopologySnapshot) -> Result<Self> {
        InvariantChecker::new().ensure_valid(&topology)?;
        Ok(Self {
            contents: RwLock::new(StoreContents::from_snapshot(topology)),
        })
    }
}

#[async_trait]
impl TopologyStore for InMemoryStore {
    async fn get_device(&self, id: &str) -> Result<Device> {
        let contents = self.contents.read().await;
        contents
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Device, id))
    }

    async fn get_link(&self, id: &str) -> Result<Link> {
        let contents = self.contents.read().await;
        contents
            .links
            .get(id)
            .cloned()
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Link, id))
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.contents.read().await.devices.values().cloned().collect())
    }

    async fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.contents.read().await.links.values().cloned().collect())
    }

    async fn list_rings(&self) -> Result<Vec<Ring>> {
        Ok(self.contents.read().await.rings.values().cloned().collect())
    }

    async fn set_device_status(&self, id: &str, status: DeviceStatus) -> Result<()> {
        let mut contents = self.contents.write().await;
        let device = contents
            .devices
            .get_mut(id)
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Device, id))?;
        device.status = status;
        Ok(())
    }

    async fn set_link_status(&self, id: &str, status: LinkStatus) -> Result<()> {
        let mut contents = self.contents.write().await;
        let link = contents
            .links
            .get_mut(id)
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Link, id))?;
        link.status = status;
        Ok(())
    }

    async fn set_link_properties(&self, id: &str, properties: PropertyMap) -> Result<()> {
        let mut contents = self.contents.write().await;
        let link = contents
            .links
            .get_mut(id)
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Link, id))?;
        link.properties = properties;
        Ok(())
    }

    async fn replace_all(&self, topology: TopologySnapshot) -> Result<()> {
        InvariantChecker::new().ensure_valid(&topology)?;
        *self.contents.write().await = StoreContents::from_snapshot(topology);
        Ok(())
    }

    async fn snapshot(&self) -> Result<TopologySnapshot> {
        let contents = self.contents.read().await;
        Ok(TopologySnapshot {
            devices: contents.devices.values().cloned().collect(),
            links: contents.links.values().cloned().collect(),
            rings: contents.rings.values().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceType;

    fn small_topology() -> TopologySnapshot {
        TopologySnapshot {
            devices: vec![
                Device::new("OLT-1", DeviceType::Olt),
                Device::new("ONT-1", DeviceType::Ont),
            ],
            links: vec![Link::new("L1", "OLT-1", "ONT-1")],
            rings: vec![],
        }
    }

    #[tokio::test]
    async fn test_mutators_reject_unknown_ids() {
        let store = InMemoryStore::from_topology(small_topology()).unwrap();

        let err = store.set_link_status("nope", LinkStatus::Down).await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound { kind: ObjectKind::Link, .. }));

        let err = store.set_device_status("nope", DeviceStatus::Offline).await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound { kind: ObjectKind::Device, .. }));

        let err = store.set_link_properties("nope", PropertyMap::new()).await.unwrap_err();
        assert!(matches!(err, SimulatorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reads_reflect_latest_write() {
        let store = InMemoryStore::from_topology(small_topology()).unwrap();
        store.set_link_status("L1", LinkStatus::Degraded).await.unwrap();
        assert_eq!(store.get_link("L1").await.unwrap().status, LinkStatus::Degraded);

        store.set_device_status("ONT-1", DeviceStatus::Maintenance).await.unwrap();
        let devices = store.list_devices().await.unwrap();
        assert_eq!(devices[1].status, DeviceStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_seed_rejects_dangling_link() {
        let mut topology = small_topology();
        topology.links.push(Link::new("L2", "OLT-1", "GHOST"));

        let err = InMemoryStore::from_topology(topology).unwrap_err();
        assert!(matches!(err, SimulatorError::Validation { .. }));
    }
}
