// fraudscope/src/engine/graph.rs
//
// Relationship graph over suspicious transactions.
//
// Build steps:
//   1. keep transactions with fraud_probability >= min_fraud_prob
//   2. collapse by ordered (sender, receiver): count, amount sum, mean prob
//      (sender == receiver pairs skipped unless allow_self_loops; the
//      transfers themselves stay in the suspicious set)
//   3. drop pairs with count < min_transactions
//   4. node metrics for every surviving endpoint, rescanned over the
//      suspicious set from step 1 (not the whole dataset)
//
// Money fields (edge amounts, node volumes) are rounded to cents.
//
// Edges are ordered by (source, target) and nodes by account id, so two
// builds over the same snapshot are identical. The petgraph DiGraph mirrors
// the edge list for traversal; node weights are account ids, edge weights
// are indices into `edges`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::records::{round_dp, NetworkEdge, NetworkNode, NodeRole, ScoredTransaction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphParams {
    pub min_fraud_prob:   f64,
    pub min_transactions: usize,
    pub allow_self_loops: bool,
}

impl From<&crate::config::NetworkSettings> for GraphParams {
    fn from(n: &crate::config::NetworkSettings) -> Self {
        Self {
            min_fraud_prob:   n.min_fraud_prob,
            min_transactions: n.min_transactions,
            allow_self_loops: n.allow_self_loops,
        }
    }
}

pub struct RelationshipGraph<'a> {
    nodes:      Vec<NetworkNode>,
    edges:      Vec<NetworkEdge>,
    suspicious: Vec<&'a ScoredTransaction>,
    graph:      DiGraph<String, usize>,
    index:      HashMap<String, NodeIndex>,
}

#[derive(Default)]
struct PairAgg {
    count:    usize,
    amount:   f64,
    prob_sum: f64,
}

#[derive(Default)]
struct NodeAgg {
    sent:     usize,
    received: usize,
    involved: usize,
    volume:   f64,
    prob_sum: f64,
}

impl<'a> RelationshipGraph<'a> {
    pub fn build(rows: &'a [ScoredTransaction], params: GraphParams) -> Self {
        // 1. Suspicion filter
        let suspicious: Vec<&ScoredTransaction> = rows
            .iter()
            .filter(|r| r.fraud_probability() >= params.min_fraud_prob)
            .collect();

        // 2. Collapse by ordered pair
        let mut pairs: BTreeMap<(&str, &str), PairAgg> = BTreeMap::new();
        for r in suspicious.iter().filter(|r| params.allow_self_loops || r.sender() != r.receiver()) {
            let agg = pairs.entry((r.sender(), r.receiver())).or_default();
            agg.count += 1;
            agg.amount += r.amount();
            agg.prob_sum += r.fraud_probability();
        }

        // 3. Minimum-count filter
        let edges: Vec<NetworkEdge> = pairs
            .into_iter()
            .filter(|(_, agg)| agg.count >= params.min_transactions)
            .map(|((s, t), agg)| NetworkEdge {
                source:                s.to_string(),
                target:                t.to_string(),
                transaction_count:     agg.count,
                total_amount:          round_dp(agg.amount, 2),
                avg_fraud_probability: agg.prob_sum / agg.count as f64,
            })
            .collect();

        // 4. Node metrics over the suspicious set
        let accounts: BTreeSet<&str> = edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        let mut node_aggs: HashMap<&str, NodeAgg> = accounts.iter().map(|&a| (a, NodeAgg::default())).collect();
        for r in &suspicious {
            let (s, t) = (r.sender(), r.receiver());
            if let Some(n) = node_aggs.get_mut(s) {
                n.sent += 1;
                n.involved += 1;
                n.volume += r.amount();
                n.prob_sum += r.fraud_probability();
            }
            if let Some(n) = node_aggs.get_mut(t) {
                n.received += 1;
                if s != t {
                    n.involved += 1;
                    n.volume += r.amount();
                    n.prob_sum += r.fraud_probability();
                }
            }
        }

        let nodes: Vec<NetworkNode> = accounts
            .iter()
            .map(|&id| {
                let n = &node_aggs[id];
                NetworkNode {
                    account_id:        id.to_string(),
                    transaction_count: n.involved,
                    total_volume:      round_dp(n.volume, 2),
                    fraud_probability: if n.involved > 0 { n.prob_sum / n.involved as f64 } else { 0.0 },
                    node_type:         NodeRole::from_counts(n.sent, n.received),
                }
            })
            .collect();

        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::with_capacity(nodes.len());
        for n in &nodes {
            index.insert(n.account_id.clone(), graph.add_node(n.account_id.clone()));
        }
        for (i, e) in edges.iter().enumerate() {
            graph.add_edge(index[&e.source], index[&e.target], i);
        }

        Self { nodes, edges, suspicious, graph, index }
    }

    pub fn nodes(&self) -> &[NetworkNode] { &self.nodes }
    pub fn edges(&self) -> &[NetworkEdge] { &self.edges }

    /// Every transaction that passed the suspicion filter, pre-grouping.
    pub fn suspicious(&self) -> &[&'a ScoredTransaction] { &self.suspicious }

    pub fn is_empty(&self) -> bool { self.edges.is_empty() }

    /// Sum of edge amounts, rounded to cents.
    pub fn total_volume(&self) -> f64 {
        round_dp(self.edges.iter().map(|e| e.total_amount).sum(), 2)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub(crate) fn digraph(&self) -> &DiGraph<String, usize> { &self.graph }

    pub(crate) fn account(&self, idx: NodeIndex) -> &str { &self.graph[idx] }

    /// Neighbours ignoring direction, each once.
    pub(crate) fn undirected_neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        let mut seen = BTreeSet::new();
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(idx, Direction::Incoming))
            .filter(move |n| seen.insert(*n))
    }
}
