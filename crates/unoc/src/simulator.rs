//! Simulator - the engine facade
//!
//! Owns the published state (graph, history, alarms, event log) behind one
//! lock. Every mutating operation holds the write lock for the whole unit:
//! mutate the store, rebuild the graph, re-evaluate rings and alarms, then
//! publish. Notifications go out after the lock is released.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock, RwLockWriteGuard};
use ts_rs::TS;

use crate::alarms::{Alarm, AlarmManager};
use crate::budget::{BudgetOutcome, OpticalBudget, SignalStatus};
use crate::commands::{
    CommandHistory, CompositeCommand, HistoryStatus, SimulationCommand, UpdateDeviceStatus,
    UpdateLinkProperties, UpdateLinkStatus,
};
use crate::config::SimulatorConfig;
use crate::events::{EventLog, FullStateChanged, StateBroadcaster, TopologyStats};
use crate::model::{
    Device, DeviceStatus, Link, LinkStatus, ObjectKind, PropertyMap, TopologyDocument,
    TopologySnapshot,
};
use crate::protection::{RingProtection, RingStatus};
use crate::snapshot::{SnapshotFile, SnapshotStore};
use crate::store::{InMemoryStore, TopologyStore};
use crate::topology::engine::{Path, PathEngine};
use crate::topology::graph::TopologyGraph;
use crate::topology::invariants::InvariantChecker;
use crate::{Result, SimulatorError};

/// Result of a fiber cut scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FiberCutOutcome {
    Applied {
        node_id: String,
        devices_affected: usize,
        links_affected: usize,
    },
    /// Everything in the blast radius was already offline/down
    NoChange { node_id: String },
}

/// Last published, internally consistent state
struct EngineState {
    topology: TopologySnapshot,
    graph: TopologyGraph,
    history: CommandHistory,
    alarms: AlarmManager,
    events: EventLog,
    rings: Vec<RingStatus>,
}

impl EngineState {
    fn new(config: &SimulatorConfig) -> Self {
        Self {
            topology: TopologySnapshot::default(),
            graph: TopologyGraph::new(),
            history: CommandHistory::new(),
            alarms: AlarmManager::new(config.utilization_threshold_percent),
            events: EventLog::new(config.event_log_capacity),
            rings: Vec::new(),
        }
    }

    fn full_state(&self) -> FullStateChanged {
        FullStateChanged {
            topology: self.topology.clone(),
            stats: TopologyStats::from_topology(&self.topology),
            history_status: self.history.status(),
            active_alarms: self.alarms.active(),
            rings: self.rings.clone(),
        }
    }

    fn find_link(&self, link_id: &str) -> Result<Link> {
        self.topology
            .links
            .iter()
            .find(|l| l.id == link_id)
            .cloned()
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Link, link_id))
    }

    fn find_device(&self, device_id: &str) -> Result<Device> {
        self.topology
            .devices
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Device, device_id))
    }
}

/// The simulation engine
pub struct Simulator {
    store: Arc<dyn TopologyStore>,
    state: RwLock<EngineState>,
    broadcaster: StateBroadcaster,
    snapshots: SnapshotStore,
    config: SimulatorConfig,
}

impl Simulator {
    /// Build the engine on top of an already seeded store.
    ///
    /// Validates the topology, blocks every RPL and evaluates alarms once.
    pub async fn start(store: Arc<dyn TopologyStore>, config: SimulatorConfig) -> Result<Self> {
        let topology = store.snapshot().await?;
        InvariantChecker::new().ensure_valid(&topology)?;

        let simulator = Self {
            state: RwLock::new(EngineState::new(&config)),
            broadcaster: StateBroadcaster::new(config.notification_capacity),
            snapshots: SnapshotStore::new(config.snapshot_dir.clone()),
            store,
            config,
        };

        {
            let mut state = simulator.state.write().await;
            state.events.record("SYSTEM: simulation engine started");
            for message in RingProtection::initialize_rings(simulator.store.as_ref()).await? {
                state.events.record(message);
            }
            simulator.refresh(&mut state).await?;
        }

        tracing::info!(
            "[SIMULATOR] started with {} devices, {} links",
            topology.devices.len(),
            topology.links.len()
        );
        Ok(simulator)
    }

    /// Start on an in-memory store seeded from a versioned topology document
    pub async fn from_document(document: TopologyDocument, config: SimulatorConfig) -> Result<Self> {
        document.check_version()?;
        let store = InMemoryStore::from_topology(document.topology)?;
        Self::start(Arc::new(store), config).await
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FullStateChanged>> {
        self.broadcaster.subscribe()
    }

    // Queries, served from the last published state

    pub async fn get_topology_snapshot(&self) -> TopologySnapshot {
        self.state.read().await.topology.clone()
    }

    pub async fn get_stats(&self) -> TopologyStats {
        TopologyStats::from_topology(&self.state.read().await.topology)
    }

    pub async fn get_full_state(&self) -> FullStateChanged {
        self.state.read().await.full_state()
    }

    pub async fn history_status(&self) -> HistoryStatus {
        self.state.read().await.history.status()
    }

    /// Event log, newest first
    pub async fn get_events(&self) -> Vec<String> {
        self.state.read().await.events.entries()
    }

    pub async fn get_alarms(&self, include_cleared: bool) -> Vec<Alarm> {
        let state = self.state.read().await;
        if include_cleared {
            state.alarms.all().to_vec()
        } else {
            state.alarms.active()
        }
    }

    pub async fn ring_status(&self) -> Vec<RingStatus> {
        self.state.read().await.rings.clone()
    }

    /// Minimal-hop path over `up` links; empty when the nodes are not
    /// connected or either id is unknown
    pub async fn trace_path(&self, start_id: &str, end_id: &str) -> Path {
        let state = self.state.read().await;
        PathEngine::trace_path(&state.graph, start_id, end_id)
    }

    pub async fn list_snapshots(&self) -> Result<Vec<String>> {
        self.snapshots.list().await
    }

    // Mutations

    /// Set a link status. A failure of a ring member link unblocks the RPL in
    /// the same history entry.
    pub async fn update_link_status(&self, link_id: &str, status: &str) -> Result<Link> {
        let new_status: LinkStatus = status.parse()?;
        let state = self.state.write().await;
        state.find_link(link_id)?;

        let primary = UpdateLinkStatus::new(link_id, new_status);
        let failover = if new_status.is_failure() {
            RingProtection::failover_command(self.store.as_ref(), link_id).await?
        } else {
            None
        };

        let command: Box<dyn SimulationCommand> = match failover {
            Some(failover) => Box::new(
                CompositeCommand::new(format!("Link failure on {link_id} with ring failover"))
                    .with(primary)
                    .with(failover),
            ),
            None => Box::new(primary),
        };

        let published = self.commit(state, command).await?;
        find_in(&published.topology.links, |l| l.id == link_id, ObjectKind::Link, link_id)
    }

    pub async fn update_device_status(&self, device_id: &str, status: &str) -> Result<Device> {
        let new_status: DeviceStatus = status.parse()?;
        let state = self.state.write().await;
        state.find_device(device_id)?;

        let published = self
            .commit(state, Box::new(UpdateDeviceStatus::new(device_id, new_status)))
            .await?;
        find_in(&published.topology.devices, |d| d.id == device_id, ObjectKind::Device, device_id)
    }

    pub async fn update_link_utilization(&self, link_id: &str, percent: f64) -> Result<Link> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(SimulatorError::validation(
                Some(link_id.to_string()),
                format!("utilization {percent} is outside 0..=100"),
            ));
        }

        let state = self.state.write().await;
        state.find_link(link_id)?;

        let mut changes = PropertyMap::new();
        changes.insert("utilization_percent".to_string(), serde_json::Value::from(percent));
        let published = self
            .commit(state, Box::new(UpdateLinkProperties::new(link_id, changes)))
            .await?;
        find_in(&published.topology.links, |l| l.id == link_id, ObjectKind::Link, link_id)
    }

    /// Optical budget of an end device; the classification feeds the alarm manager
    pub async fn update_device_signal(&self, device_id: &str) -> Result<BudgetOutcome> {
        let mut state = self.state.write().await;

        let outcome = {
            let budget = OpticalBudget::new(&self.config.budget, &state.topology, &state.graph);
            budget.compute(device_id)?
        };

        if let Some(change) = state.alarms.check_signal_alarm(device_id, outcome.signal_status()) {
            state.events.record(format!("ALARM: {}", change.describe()));
            let published = Arc::new(state.full_state());
            drop(state);
            self.broadcaster.broadcast(published);
        }

        Ok(outcome)
    }

    /// Take the cut node and everything downstream of it offline, and every
    /// link touching that set down, as one undoable step
    pub async fn fiber_cut(&self, node_id: &str) -> Result<FiberCutOutcome> {
        let state = self.state.write().await;
        let radius = PathEngine::downstream_impact(&state.graph, node_id)
            .ok_or_else(|| SimulatorError::not_found(ObjectKind::Device, node_id))?;

        let mut composite = CompositeCommand::new(format!("Fiber cut at {node_id}"));
        let mut devices_affected = 0;
        let mut links_affected = 0;

        for device_id in &radius.devices {
            let status = state.graph.get_node(device_id).map(|n| n.status);
            if status != Some(DeviceStatus::Offline) {
                composite.push(UpdateDeviceStatus::new(device_id.clone(), DeviceStatus::Offline));
                devices_affected += 1;
            }
        }
        for link_id in &radius.links {
            let status = state.graph.get_edge(link_id).map(|e| e.status);
            if status != Some(LinkStatus::Down) {
                composite.push(UpdateLinkStatus::new(link_id.clone(), LinkStatus::Down));
                links_affected += 1;
            }
        }

        if composite.is_empty() {
            tracing::info!("[SIMULATOR] fiber cut at '{}' changed nothing", node_id);
            return Ok(FiberCutOutcome::NoChange {
                node_id: node_id.to_string(),
            });
        }

        self.commit(state, Box::new(composite)).await?;
        Ok(FiberCutOutcome::Applied {
            node_id: node_id.to_string(),
            devices_affected,
            links_affected,
        })
    }

    pub async fn undo(&self) -> Result<String> {
        let mut state = self.state.write().await;
        let summary = state.history.undo(self.store.as_ref()).await?;
        tracing::info!("[SIMULATOR] undo: {}", summary);
        state.events.record(format!("SIMULATION: Undo - {summary}"));
        self.publish(state).await?;
        Ok(summary)
    }

    pub async fn redo(&self) -> Result<String> {
        let mut state = self.state.write().await;
        let summary = state.history.redo(self.store.as_ref()).await?;
        tracing::info!("[SIMULATOR] redo: {}", summary);
        state.events.record(format!("SIMULATION: Redo - {summary}"));
        self.publish(state).await?;
        Ok(summary)
    }

    pub async fn clear_history(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.history.clear();
        state.events.record("SYSTEM: command history cleared");
        self.publish(state).await?;
        Ok(())
    }

    /// Persist topology and event log under `name`
    pub async fn save_snapshot(&self, name: &str) -> Result<PathBuf> {
        let mut state = self.state.write().await;
        let file = SnapshotFile::new(state.topology.clone(), state.events.entries());
        let path = self.snapshots.save(name, &file).await?;
        state.events.record(format!("SYSTEM: snapshot '{name}' saved"));
        Ok(path)
    }

    /// Replace the store with a saved snapshot and start a fresh history
    pub async fn load_snapshot(&self, name: &str) -> Result<()> {
        let file = self.snapshots.load(name).await?;
        InvariantChecker::new().ensure_valid(&file.document.topology)?;

        let mut state = self.state.write().await;
        self.store.replace_all(file.document.topology).await?;

        state.history.clear();
        state.rings.clear();
        state.events.restore(file.events);
        state.events.record(format!("SYSTEM: snapshot '{name}' loaded"));
        for change in state.alarms.clear_all() {
            state.events.record(format!("ALARM: {}", change.describe()));
        }
        for message in RingProtection::initialize_rings(self.store.as_ref()).await? {
            state.events.record(message);
        }

        tracing::info!("[SIMULATOR] restored snapshot '{}'", name);
        self.publish(state).await?;
        Ok(())
    }

    // Internals

    async fn commit(
        &self,
        mut state: RwLockWriteGuard<'_, EngineState>,
        command: Box<dyn SimulationCommand>,
    ) -> Result<Arc<FullStateChanged>> {
        let summary = state.history.execute(command, self.store.as_ref()).await?;
        tracing::info!("[SIMULATOR] {}", summary);
        state.events.record(format!("SIMULATION: {summary}"));
        self.publish(state).await
    }

    /// Re-evaluate under the held lock, then notify once it is released
    async fn publish(&self, mut state: RwLockWriteGuard<'_, EngineState>) -> Result<Arc<FullStateChanged>> {
        self.refresh(&mut state).await?;
        let published = Arc::new(state.full_state());
        drop(state);

        self.broadcaster.broadcast(published.clone());
        Ok(published)
    }

    /// Rebuild the graph from the store and re-check rings and alarms
    async fn refresh(&self, state: &mut EngineState) -> Result<()> {
        let topology = self.store.snapshot().await?;
        state.graph = TopologyGraph::build(&topology.devices, &topology.links);

        let rings = RingProtection::ring_states(&topology);
        for message in RingProtection::transitions(&state.rings, &rings) {
            tracing::info!("[ERPS] {}", message);
            state.events.record(message);
        }
        state.rings = rings;

        for link in &topology.links {
            for change in state.alarms.check_utilization_alarm(link) {
                state.events.record(format!("ALARM: {}", change.describe()));
            }
        }

        let signals: Vec<(String, SignalStatus)> = {
            let budget = OpticalBudget::new(&self.config.budget, &topology, &state.graph);
            budget
                .end_devices()
                .into_iter()
                .map(|id| -> Result<(String, SignalStatus)> {
                    Ok((id.to_string(), budget.compute(id)?.signal_status()))
                })
                .collect::<Result<_>>()?
        };
        for (device_id, signal) in signals {
            if let Some(change) = state.alarms.check_signal_alarm(&device_id, signal) {
                state.events.record(format!("ALARM: {}", change.describe()));
            }
        }

        state.topology = topology;
        Ok(())
    }
}

fn find_in<T: Clone>(items: &[T], matches: impl Fn(&T) -> bool, kind: ObjectKind, id: &str) -> Result<T> {
    items
        .iter()
        .find(|item| matches(item))
        .cloned()
        .ok_or_else(|| SimulatorError::not_found(kind, id))
}
