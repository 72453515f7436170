//! Event log and full-state notifications
//!
//! The event log is the human readable trail shown to operators. The
//! broadcaster hands every published state to attached transports.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;

use crate::alarms::Alarm;
use crate::commands::HistoryStatus;
use crate::model::{LinkStatus, TopologySnapshot};
use crate::protection::RingStatus;

/// Bounded, newest-first list of timestamped messages
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, message: impl AsRef<str>) {
        let stamped = format!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), message.as_ref());
        self.entries.push_front(stamped);
        self.entries.truncate(self.capacity);
    }

    /// Newest first
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Replace the log with previously persisted entries (newest first)
    pub fn restore(&mut self, entries: Vec<String>) {
        self.entries = entries.into_iter().take(self.capacity).collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headline counters of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct TopologyStats {
    pub devices_total: usize,
    pub devices_online: usize,
    pub links_total: usize,
    pub links_up: usize,
    /// Offline devices plus links that are neither up nor blocking
    pub alarms: usize,
}

impl TopologyStats {
    pub fn from_topology(topology: &TopologySnapshot) -> Self {
        let devices_total = topology.devices.len();
        let devices_online = topology.devices.iter().filter(|d| d.is_online()).count();
        let links_total = topology.links.len();
        let links_up = topology.links.iter().filter(|l| l.status == LinkStatus::Up).count();
        let faulty_links = topology
            .links
            .iter()
            .filter(|l| !matches!(l.status, LinkStatus::Up | LinkStatus::Blocking))
            .count();

        Self {
            devices_total,
            devices_online,
            links_total,
            links_up,
            alarms: (devices_total - devices_online) + faulty_links,
        }
    }
}

/// Payload emitted after every successful mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FullStateChanged {
    #[serde(flatten)]
    pub topology: TopologySnapshot,
    pub stats: TopologyStats,
    pub history_status: HistoryStatus,
    pub active_alarms: Vec<Alarm>,
    pub rings: Vec<RingStatus>,
}

/// Broadcasts published states to all subscribers
pub struct StateBroadcaster {
    sender: broadcast::Sender<Arc<FullStateChanged>>,
}

impl StateBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn broadcast(&self, state: Arc<FullStateChanged>) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(state);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FullStateChanged>> {
        self.sender.subscribe()
    }
}
