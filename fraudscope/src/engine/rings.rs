// fraudscope/src/engine/rings.rs
//
// Fraud-ring detection over the relationship graph.
//
//   1. Weakly-connected components by BFS over undirected adjacency.
//      Per-node state: Unvisited → Visiting (queued) → Assigned(component).
//      Start nodes are taken in account-id order, so discovery is stable.
//   2. Components with fewer than 3 accounts are dropped.
//   3. Cyclicity: a component is a ring when it holds a strongly-connected
//      component of 2+ accounts, i.e. money can return to where it started.
//      A plain chain or star has only singleton SCCs and is rejected.
//   4. Stats are recomputed from every suspicious transaction with both ends
//      inside the ring, not from the collapsed edges.
//
// Ring ids (RING_001, …) are per call; nothing persists across calls.

use std::collections::{HashSet, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::NodeIndex;
use tracing::debug;

use crate::engine::graph::RelationshipGraph;
use crate::records::{round_dp, FraudRing};

pub const MIN_RING_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    Visiting,
    Assigned(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct RingParams {
    pub max_rings:       usize,
    pub display_members: usize,
}

impl From<&crate::config::NetworkSettings> for RingParams {
    fn from(n: &crate::config::NetworkSettings) -> Self {
        Self { max_rings: n.max_rings, display_members: n.ring_display_members }
    }
}

/// Weakly-connected components in discovery order.
pub fn weak_components(graph: &RelationshipGraph<'_>) -> Vec<Vec<NodeIndex>> {
    let g = graph.digraph();
    let mut state = vec![NodeState::Unvisited; g.node_count()];
    let mut components: Vec<Vec<NodeIndex>> = Vec::new();

    for start in g.node_indices() {
        if state[start.index()] != NodeState::Unvisited {
            continue;
        }
        let cid = components.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        state[start.index()] = NodeState::Visiting;

        while let Some(node) = queue.pop_front() {
            state[node.index()] = NodeState::Assigned(cid);
            members.push(node);
            for next in graph.undirected_neighbors(node) {
                if state[next.index()] == NodeState::Unvisited {
                    state[next.index()] = NodeState::Visiting;
                    queue.push_back(next);
                }
            }
        }
        components.push(members);
    }
    components
}

pub fn detect_fraud_rings(graph: &RelationshipGraph<'_>, params: RingParams) -> Vec<FraudRing> {
    if graph.is_empty() || params.max_rings == 0 {
        return Vec::new();
    }

    // Nodes sitting in a directed cycle with at least one other node
    let mut cyclic = vec![false; graph.digraph().node_count()];
    for scc in kosaraju_scc(graph.digraph()) {
        if scc.len() >= 2 {
            for n in scc {
                cyclic[n.index()] = true;
            }
        }
    }

    let mut rings = Vec::new();
    for component in weak_components(graph) {
        if component.len() < MIN_RING_SIZE {
            continue;
        }
        if !component.iter().any(|n| cyclic[n.index()]) {
            debug!("Component of {} accounts is acyclic, not a ring", component.len());
            continue;
        }

        let members: HashSet<&str> = component.iter().map(|&n| graph.account(n)).collect();
        let (mut count, mut volume, mut prob_sum) = (0usize, 0.0f64, 0.0f64);
        for r in graph.suspicious() {
            if members.contains(r.sender()) && members.contains(r.receiver()) {
                count += 1;
                volume += r.amount();
                prob_sum += r.fraud_probability();
            }
        }

        let mut accounts: Vec<String> = members.iter().map(|a| a.to_string()).collect();
        accounts.sort();
        accounts.truncate(params.display_members);

        rings.push(FraudRing {
            ring_id:               format!("RING_{:03}", rings.len() + 1),
            account_count:         members.len(),
            transaction_count:     count,
            total_volume:          round_dp(volume, 2),
            avg_fraud_probability: if count > 0 { prob_sum / count as f64 } else { 0.0 },
            accounts,
        });
        if rings.len() >= params.max_rings {
            break;
        }
    }
    rings
}
