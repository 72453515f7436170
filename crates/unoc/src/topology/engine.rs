//! Path engine - reachability, path finding and fault propagation

use super::graph::{GraphNode, TopologyGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use ts_rs::TS;

/// A path through the topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct Path {
    pub nodes: Vec<String>,
    pub links: Vec<String>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hops (links) on the path
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// How links are followed during a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Source to target only, the direction light travels from a head-end
    Downstream,
    /// Either direction
    Undirected,
}

/// Result of a head-end search
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found { head_end: String, path: Path },
    NoPath,
}

/// Devices and links made unusable by a cut at one node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct BlastRadius {
    /// Cut node first, then its descendants in discovery order
    pub devices: Vec<String>,
    pub links: Vec<String>,
}

/// Engine for topology algorithms
pub struct PathEngine;

impl PathEngine {
    /// Minimal-hop path between two nodes.
    ///
    /// `passable` filters the nodes a path may enter (the start node is
    /// always accepted). Ties are broken by edge order in the graph.
    pub fn find_shortest_path(
        graph: &TopologyGraph,
        from: &str,
        to: &str,
        traversal: Traversal,
        passable: impl Fn(&GraphNode) -> bool,
    ) -> Option<Path> {
        if !graph.contains_node(from) || !graph.contains_node(to) {
            return None;
        }

        if from == to {
            return Some(Path {
                nodes: vec![from.to_string()],
                links: Vec::new(),
            });
        }

        let mut prev: HashMap<&str, (&str, &str)> = HashMap::new(); // node -> (prev_node, link_id)
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(from);
        queue.push_back(from);

        while let Some(node_id) = queue.pop_front() {
            let edges = match traversal {
                Traversal::Downstream => graph.edges_from(node_id),
                Traversal::Undirected => graph.incident_edges(node_id),
            };
            for edge in edges {
                let Some(next) = edge.other_end(node_id) else {
                    continue;
                };
                if visited.contains(next) {
                    continue;
                }
                match graph.get_node(next) {
                    Some(node) if passable(node) => {}
                    _ => continue,
                }

                visited.insert(next);
                prev.insert(next, (node_id, edge.id.as_str()));

                if next == to {
                    return Some(Self::reconstruct(&prev, from, to));
                }
                queue.push_back(next);
            }
        }

        None
    }

    fn reconstruct(prev: &HashMap<&str, (&str, &str)>, from: &str, to: &str) -> Path {
        let mut path = Path::new();
        let mut current = to;

        while current != from {
            path.nodes.push(current.to_string());
            match prev.get(current) {
                Some((prev_node, link_id)) => {
                    path.links.push(link_id.to_string());
                    current = prev_node;
                }
                None => break,
            }
        }
        path.nodes.push(from.to_string());
        path.nodes.reverse();
        path.links.reverse();

        path
    }

    /// Try each head-end in the given order and return the first that reaches
    /// `end` downstream.
    ///
    /// The order of `start_set` is significant; callers pass head-ends sorted by id.
    pub fn shortest_path_from_any(
        graph: &TopologyGraph,
        start_set: &[&str],
        end: &str,
        passable: impl Fn(&GraphNode) -> bool,
    ) -> PathOutcome {
        for head_end in start_set {
            if let Some(path) =
                Self::find_shortest_path(graph, head_end, end, Traversal::Downstream, &passable)
            {
                return PathOutcome::Found {
                    head_end: head_end.to_string(),
                    path,
                };
            }
        }
        PathOutcome::NoPath
    }

    /// Shortest path using only links whose status is `up`.
    ///
    /// Returns an empty path when the nodes are not connected.
    pub fn trace_path(graph: &TopologyGraph, start: &str, end: &str) -> Path {
        let up = graph.up_only();
        Self::find_shortest_path(&up, start, end, Traversal::Undirected, |_| true).unwrap_or_default()
    }

    /// Everything reachable from `node_id` following link direction, plus the node itself
    pub fn descendants(graph: &TopologyGraph, node_id: &str) -> Vec<String> {
        if !graph.contains_node(node_id) {
            return Vec::new();
        }

        let mut order = vec![node_id.to_string()];
        let mut visited: HashSet<&str> = HashSet::from([node_id]);
        let mut queue = VecDeque::from([node_id]);

        while let Some(current) = queue.pop_front() {
            for next in graph.successors(current) {
                if visited.insert(next) {
                    order.push(next.to_string());
                    queue.push_back(next);
                }
            }
        }

        order
    }

    /// Blast radius of a physical cut at `cut_node_id`
    pub fn downstream_impact(graph: &TopologyGraph, cut_node_id: &str) -> Option<BlastRadius> {
        if !graph.contains_node(cut_node_id) {
            return None;
        }

        let devices = Self::descendants(graph, cut_node_id);
        let in_radius: HashSet<&str> = devices.iter().map(String::as_str).collect();
        let links = graph
            .edges
            .values()
            .filter(|e| in_radius.contains(e.source.as_str()) || in_radius.contains(e.target.as_str()))
            .map(|e| e.id.clone())
            .collect();

        Some(BlastRadius { devices, links })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, DeviceStatus, DeviceType, Link, LinkStatus};

    //   OLT-A -> SPL -> ONT-1
    //                -> ONT-2
    //   OLT-B -> SW  -> ONT-2 (down)
    fn create_test_graph() -> TopologyGraph {
        let devices = vec![
            Device::new("OLT-B", DeviceType::Olt),
            Device::new("OLT-A", DeviceType::Olt),
            Device::new("SPL", DeviceType::Splitter),
            Device::new("SW", DeviceType::Other("Aggregation Switch".to_string())),
            Device::new("ONT-1", DeviceType::Ont),
            Device::new("ONT-2", DeviceType::Ont),
            Device::new("ISO", DeviceType::Ont),
        ];
        let links = vec![
            Link::new("a-spl", "OLT-A", "SPL"),
            Link::new("spl-1", "SPL", "ONT-1"),
            Link::new("spl-2", "SPL", "ONT-2"),
            Link::new("b-sw", "OLT-B", "SW"),
            Link::new("sw-2", "SW", "ONT-2").with_status(LinkStatus::Down),
        ];
        TopologyGraph::build(&devices, &links)
    }

    #[test]
    fn test_find_shortest_path_is_undirected() {
        let graph = create_test_graph();

        let path = PathEngine::find_shortest_path(&graph, "ONT-1", "OLT-A", Traversal::Undirected, |_| true)
            .unwrap();
        assert_eq!(path.nodes, vec!["ONT-1", "SPL", "OLT-A"]);
        assert_eq!(path.links, vec!["spl-1", "a-spl"]);
        assert_eq!(path.len(), 2);

        let upstream = PathEngine::find_shortest_path(&graph, "ONT-1", "OLT-A", Traversal::Downstream, |_| true);
        assert!(upstream.is_none());
    }

    #[test]
    fn test_head_end_order_is_respected() {
        let graph = create_test_graph();
        let head_ends = graph.head_ends();
        assert_eq!(head_ends, vec!["OLT-A", "OLT-B"]);

        match PathEngine::shortest_path_from_any(&graph, &head_ends, "ONT-2", |_| true) {
            PathOutcome::Found { head_end, path } => {
                assert_eq!(head_end, "OLT-A");
                assert_eq!(path.nodes, vec!["OLT-A", "SPL", "ONT-2"]);
            }
            PathOutcome::NoPath => panic!("expected a path"),
        }

        let outcome = PathEngine::shortest_path_from_any(&graph, &["OLT-B", "OLT-A"], "ONT-2", |_| true);
        assert!(matches!(outcome, PathOutcome::Found { ref head_end, .. } if head_end == "OLT-B"));

        let outcome = PathEngine::shortest_path_from_any(&graph, &head_ends, "ISO", |_| true);
        assert_eq!(outcome, PathOutcome::NoPath);
    }

    #[test]
    fn test_passable_filter_blocks_offline_nodes() {
        let mut graph = create_test_graph();
        graph.nodes.get_mut("SPL").unwrap().status = DeviceStatus::Offline;

        let path = PathEngine::find_shortest_path(&graph, "OLT-A", "ONT-1", Traversal::Downstream, |n| {
            n.is_available()
        });
        assert!(path.is_none());
    }

    #[test]
    fn test_trace_path_uses_up_links_only() {
        let graph = create_test_graph();

        let path = PathEngine::trace_path(&graph, "OLT-B", "ONT-2");
        assert!(path.nodes.is_empty());
        assert!(path.links.is_empty());

        let path = PathEngine::trace_path(&graph, "OLT-A", "ONT-2");
        assert_eq!(path.links, vec!["a-spl", "spl-2"]);

        let path = PathEngine::trace_path(&graph, "SPL", "SPL");
        assert_eq!(path.nodes, vec!["SPL"]);
    }

    #[test]
    fn test_downstream_impact_follows_direction() {
        let graph = create_test_graph();

        let radius = PathEngine::downstream_impact(&graph, "SPL").unwrap();
        assert_eq!(radius.devices, vec!["SPL", "ONT-1", "ONT-2"]);
        assert_eq!(radius.links, vec!["a-spl", "spl-1", "spl-2", "sw-2"]);

        let leaf = PathEngine::downstream_impact(&graph, "ONT-1").unwrap();
        assert_eq!(leaf.devices, vec!["ONT-1"]);
        assert_eq!(leaf.links, vec!["spl-1"]);

        assert!(PathEngine::downstream_impact(&graph, "missing").is_none());
    }
}
