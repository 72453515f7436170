//! Graph projection of the network topology
//!
//! Nodes are devices, edges are links. The graph is rebuilt from the store
//! after every mutation and is never the system of record.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Device, DeviceStatus, DeviceType, Link, LinkStatus};

/// A device in the topology graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
}

impl GraphNode {
    pub fn is_available(&self) -> bool {
        self.status != DeviceStatus::Offline
    }
}

impl From<&Device> for GraphNode {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            device_type: device.device_type.clone(),
            status: device.status,
        }
    }
}

/// A link in the topology graph, directed from source to target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub status: LinkStatus,
}

impl GraphEdge {
    /// The endpoint opposite to `node_id`, if the edge touches it
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

impl From<&Link> for GraphEdge {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id.clone(),
            source: link.source.clone(),
            target: link.target.clone(),
            status: link.status,
        }
    }
}

/// The topology graph structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyGraph {
    pub nodes: IndexMap<String, GraphNode>,
    pub edges: IndexMap<String, GraphEdge>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    /// Full rebuild from store contents
    pub fn build(devices: &[Device], links: &[Link]) -> Self {
        let mut graph = Self::new();
        for device in devices {
            graph.add_node(GraphNode::from(device));
        }
        for link in links {
            graph.add_edge(GraphEdge::from(link));
        }
        graph
    }

    /// Copy of this graph keeping only edges accepted by `keep`
    pub fn restricted(&self, keep: impl Fn(&GraphEdge) -> bool) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .filter(|(_, e)| keep(e))
                .map(|(id, e)| (id.clone(), e.clone()))
                .collect(),
        }
    }

    /// Copy of this graph with only `up` links
    pub fn up_only(&self) -> Self {
        self.restricted(|e| e.status == LinkStatus::Up)
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.insert(edge.id.clone(), edge);
    }

    pub fn get_node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    pub fn get_edge(&self, edge_id: &str) -> Option<&GraphEdge> {
        self.edges.get(edge_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Get all edges leaving a node
    pub fn edges_from(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges.values().filter(|e| e.source == node_id).collect()
    }

    /// Get all edges touching a node, in either direction
    pub fn incident_edges(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges
            .values()
            .filter(|e| e.source == node_id || e.target == node_id)
            .collect()
    }

    /// Nodes reachable via outgoing edges
    pub fn successors(&self, node_id: &str) -> Vec<&str> {
        self.edges_from(node_id)
            .into_iter()
            .map(|e| e.target.as_str())
            .collect()
    }

    /// Head-end devices sorted lexicographically by id
    pub fn head_ends(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .nodes
            .values()
            .filter(|n| n.device_type.is_head_end())
            .map(|n| n.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
