//! Leiden community detection optimising modularity
//!
//! Each level runs three phases:
//!
//! 1. Fast local moving: a queue of nodes, each moved to the neighbouring community
//!    with the best modularity gain; neighbours of moved nodes are re-queued.
//! 2. Refinement: inside every community, singletons merge into well-connected
//!    sub-communities only. This is what keeps communities internally connected.
//! 3. Aggregation: the refined communities become the nodes of the next level, seeded
//!    with the community they belong to after phase 1.
//!
//! Iteration order is fixed (node index order, neighbours sorted), so the same graph
//! always yields the same partition.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeidenConfig {
    /// Modularity resolution (1.0 = classic modularity)
    pub resolution: f64,

    /// Upper bound on aggregation levels
    pub max_levels: usize,
}

impl Default for LeidenConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_levels: 32,
        }
    }
}

/// Weighted undirected network of one aggregation level
#[derive(Debug, Clone)]
struct Network {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_weight: Vec<f64>,
    degree: Vec<f64>,
}

impl Network {
    fn new(adjacency: Vec<Vec<(usize, f64)>>) -> Self {
        let n = adjacency.len();
        Self::with_self_weights(adjacency, vec![0.0; n])
    }

    fn with_self_weights(adjacency: Vec<Vec<(usize, f64)>>, self_weight: Vec<f64>) -> Self {
        let degree = adjacency
            .iter()
            .zip(&self_weight)
            .map(|(neighbours, own)| neighbours.iter().map(|(_, w)| w).sum::<f64>() + 2.0 * own)
            .collect();
        Self {
            adjacency,
            self_weight,
            degree,
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn total_weight(&self) -> f64 {
        self.degree.iter().sum()
    }

    /// Collapse every community of `membership` into a single node
    fn aggregate(&self, membership: &[usize], count: usize) -> Self {
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_weight = vec![0.0; count];

        for (i, neighbours) in self.adjacency.iter().enumerate() {
            let ci = membership[i];
            self_weight[ci] += self.self_weight[i];
            for &(j, w) in neighbours {
                let cj = membership[j];
                if ci == cj {
                    // each internal edge is visited from both endpoints
                    self_weight[ci] += w / 2.0;
                } else {
                    *links[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }

        let adjacency = links
            .into_iter()
            .map(|neighbours| neighbours.into_iter().collect())
            .collect();
        Self::with_self_weights(adjacency, self_weight)
    }
}

/// Partition the nodes of an undirected weighted graph
///
/// `adjacency[i]` lists `(neighbour, weight)` pairs; every edge must appear in both
/// endpoint lists. Returns a community per node, numbered by first appearance.
pub fn leiden(adjacency: Vec<Vec<(usize, f64)>>, config: &LeidenConfig) -> Vec<usize> {
    let n = adjacency.len();
    if n == 0 {
        return Vec::new();
    }

    let mut network = Network::new(adjacency);
    let two_m = network.total_weight();
    if two_m <= 0.0 {
        return (0..n).collect();
    }

    let resolution = config.resolution;
    let mut node_to_aggregate: Vec<usize> = (0..n).collect();
    let mut membership: Vec<usize> = (0..n).collect();

    for level in 0..config.max_levels.max(1) {
        let moves = move_nodes_fast(&network, &mut membership, resolution, two_m);
        let count = renumber(&mut membership);
        log::debug!(
            "Leiden level {}: {} nodes, {} moves, {} communities",
            level,
            network.len(),
            moves,
            count
        );
        if count == network.len() {
            break;
        }

        let mut refined = refine(&network, &membership, resolution, two_m);
        let refined_count = renumber(&mut refined);
        if refined_count == network.len() {
            break;
        }

        let mut seeded = vec![0; refined_count];
        for (node, &sub) in refined.iter().enumerate() {
            seeded[sub] = membership[node];
        }

        network = network.aggregate(&refined, refined_count);
        for slot in node_to_aggregate.iter_mut() {
            *slot = refined[*slot];
        }
        membership = seeded;
    }

    let mut result: Vec<usize> = node_to_aggregate
        .iter()
        .map(|&aggregate| membership[aggregate])
        .collect();
    renumber(&mut result);
    result
}

/// Modularity of `membership` over an undirected weighted graph
pub fn modularity(adjacency: &[Vec<(usize, f64)>], membership: &[usize], resolution: f64) -> f64 {
    let two_m: f64 = adjacency
        .iter()
        .flat_map(|neighbours| neighbours.iter().map(|(_, w)| w))
        .sum();
    if two_m <= 0.0 {
        return 0.0;
    }

    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut totals: HashMap<usize, f64> = HashMap::new();
    for (i, neighbours) in adjacency.iter().enumerate() {
        let ci = membership[i];
        for &(j, w) in neighbours {
            *totals.entry(ci).or_insert(0.0) += w;
            if membership[j] == ci {
                *internal.entry(ci).or_insert(0.0) += w;
            }
        }
    }

    totals
        .iter()
        .map(|(community, total)| {
            let inside = internal.get(community).copied().unwrap_or(0.0);
            inside / two_m - resolution * (total / two_m).powi(2)
        })
        .sum()
}

/// Relabel communities 0.. by first appearance; returns the community count
fn renumber(membership: &mut [usize]) -> usize {
    let mut labels: HashMap<usize, usize> = HashMap::new();
    for community in membership.iter_mut() {
        let next = labels.len();
        *community = *labels.entry(*community).or_insert(next);
    }
    labels.len()
}

/// Queue-driven local moving; returns the number of moves made
///
/// Community ids in `membership` must be smaller than the node count.
fn move_nodes_fast(
    network: &Network,
    membership: &mut [usize],
    resolution: f64,
    two_m: f64,
) -> usize {
    let n = network.len();
    let mut totals = vec![0.0; n];
    let mut sizes = vec![0usize; n];
    for (node, &community) in membership.iter().enumerate() {
        totals[community] += network.degree[node];
        sizes[community] += 1;
    }
    let mut empty: Vec<usize> = (0..n).rev().filter(|&c| sizes[c] == 0).collect();

    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued = vec![true; n];
    let mut links: HashMap<usize, f64> = HashMap::new();
    let mut moves = 0;
    let mut budget = n.saturating_mul(64).max(1024);

    while let Some(node) = queue.pop_front() {
        queued[node] = false;
        if budget == 0 {
            log::warn!("Leiden local moving stopped early after exhausting its iteration budget");
            break;
        }
        budget -= 1;

        let current = membership[node];
        let k = network.degree[node];

        links.clear();
        for &(neighbour, w) in &network.adjacency[node] {
            *links.entry(membership[neighbour]).or_insert(0.0) += w;
        }

        totals[current] -= k;
        sizes[current] -= 1;

        let gain = |community: usize| {
            links.get(&community).copied().unwrap_or(0.0)
                - resolution * k * totals[community] / two_m
        };

        let mut best = current;
        let mut best_gain = gain(current);
        for &(neighbour, _) in &network.adjacency[node] {
            let candidate = membership[neighbour];
            if candidate == current {
                continue;
            }
            let candidate_gain = gain(candidate);
            if candidate_gain > best_gain + EPSILON {
                best = candidate;
                best_gain = candidate_gain;
            }
        }

        // Leaving for an empty community scores zero
        if best_gain < -EPSILON && sizes[current] > 0 {
            if let Some(fresh) = empty.pop() {
                best = fresh;
            }
        }

        membership[node] = best;
        totals[best] += k;
        sizes[best] += 1;

        if best != current {
            moves += 1;
            if sizes[current] == 0 {
                empty.push(current);
            }
            for &(neighbour, _) in &network.adjacency[node] {
                if !queued[neighbour] && membership[neighbour] != best {
                    queued[neighbour] = true;
                    queue.push_back(neighbour);
                }
            }
        }
    }

    moves
}

/// Split every community of `membership` into well-connected sub-communities
///
/// Starts from singletons; a singleton may only join a sub-community of its own
/// community, and only when both are well connected to the rest of it.
fn refine(network: &Network, membership: &[usize], resolution: f64, two_m: f64) -> Vec<usize> {
    let n = network.len();
    let mut refined: Vec<usize> = (0..n).collect();
    let mut totals = network.degree.clone();
    let mut sizes = vec![1usize; n];

    let mut community_totals = vec![0.0; n];
    for (node, &community) in membership.iter().enumerate() {
        community_totals[community] += network.degree[node];
    }

    // Weight from each sub-community to the rest of its community
    let mut external: Vec<f64> = (0..n)
        .map(|node| {
            network.adjacency[node]
                .iter()
                .filter(|(neighbour, _)| membership[*neighbour] == membership[node])
                .map(|(_, w)| w)
                .sum()
        })
        .collect();

    let well_connected = |outside: f64, total: f64, community_total: f64| {
        outside + EPSILON >= resolution * total * (community_total - total) / two_m
    };

    let mut links: HashMap<usize, f64> = HashMap::new();
    for node in 0..n {
        // Only nodes still alone in their sub-community move; such a node's
        // sub-community id is its own index.
        if refined[node] != node || sizes[node] != 1 {
            continue;
        }
        let community = membership[node];
        let k = network.degree[node];
        if !well_connected(external[node], k, community_totals[community]) {
            continue;
        }

        links.clear();
        for &(neighbour, w) in &network.adjacency[node] {
            if membership[neighbour] == community {
                *links.entry(refined[neighbour]).or_insert(0.0) += w;
            }
        }

        let mut best = node;
        let mut best_gain = 0.0;
        for &(neighbour, _) in &network.adjacency[node] {
            let candidate = refined[neighbour];
            if membership[neighbour] != community || candidate == node {
                continue;
            }
            if !well_connected(
                external[candidate],
                totals[candidate],
                community_totals[community],
            ) {
                continue;
            }
            let link = links.get(&candidate).copied().unwrap_or(0.0);
            let gain = link - resolution * k * totals[candidate] / two_m;
            if gain > best_gain + EPSILON {
                best = candidate;
                best_gain = gain;
            }
        }

        if best != node {
            let link = links.get(&best).copied().unwrap_or(0.0);
            external[best] += external[node] - 2.0 * link;
            totals[best] += k;
            sizes[best] += 1;
            totals[node] = 0.0;
            sizes[node] = 0;
            refined[node] = best;
        }
    }

    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn undirected(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            adjacency[a].push((b, 1.0));
            adjacency[b].push((a, 1.0));
        }
        adjacency
    }

    fn clique_edges(nodes: &[usize]) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                edges.push((a, b));
            }
        }
        edges
    }

    #[test]
    fn two_cliques_joined_by_a_bridge_split_apart() {
        let mut edges = clique_edges(&[0, 1, 2, 3]);
        edges.extend(clique_edges(&[4, 5, 6, 7]));
        edges.push((3, 4));
        let adjacency = undirected(8, &edges);

        let membership = leiden(adjacency.clone(), &LeidenConfig::default());
        assert_eq!(membership, vec![0, 0, 0, 0, 1, 1, 1, 1]);

        let singletons: Vec<usize> = (0..8).collect();
        assert!(
            modularity(&adjacency, &membership, 1.0) > modularity(&adjacency, &singletons, 1.0)
        );
    }

    #[test]
    fn edgeless_graph_stays_singletons() {
        let membership = leiden(vec![Vec::new(); 3], &LeidenConfig::default());
        assert_eq!(membership, vec![0, 1, 2]);
        assert!(leiden(Vec::new(), &LeidenConfig::default()).is_empty());
    }

    #[test]
    fn isolated_nodes_keep_their_own_community() {
        let mut edges = clique_edges(&[0, 1, 2]);
        edges.extend(clique_edges(&[4, 5, 6]));
        let membership = leiden(undirected(7, &edges), &LeidenConfig::default());
        assert_eq!(membership, vec![0, 0, 0, 1, 2, 2, 2]);
    }

    #[test]
    fn renumber_uses_first_appearance() {
        let mut membership = vec![7, 3, 7, 9];
        assert_eq!(renumber(&mut membership), 3);
        assert_eq!(membership, vec![0, 1, 0, 2]);
    }

    #[test]
    fn aggregation_preserves_total_weight() {
        let network = Network::new(undirected(4, &[(0, 1), (1, 2), (2, 3)]));
        let aggregated = network.aggregate(&[0, 0, 1, 1], 2);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated.total_weight(), network.total_weight());
        assert_eq!(aggregated.self_weight, vec![1.0, 1.0]);
        assert_eq!(aggregated.adjacency[0], vec![(1, 1.0)]);
    }

    proptest! {
        #[test]
        fn partition_is_complete_and_beats_singletons(
            n in 1usize..24,
            raw_edges in proptest::collection::vec((0usize..24, 0usize..24), 0..60),
        ) {
            let mut seen = std::collections::HashSet::new();
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .map(|(a, b)| (a % n, b % n))
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .filter(|edge| seen.insert(*edge))
                .collect();
            let adjacency = undirected(n, &edges);

            let membership = leiden(adjacency.clone(), &LeidenConfig::default());
            prop_assert_eq!(membership.len(), n);

            let count = membership.iter().max().map(|m| m + 1).unwrap_or(0);
            for community in 0..count {
                prop_assert!(membership.contains(&community));
            }

            let singletons: Vec<usize> = (0..n).collect();
            prop_assert!(
                modularity(&adjacency, &membership, 1.0)
                    >= modularity(&adjacency, &singletons, 1.0) - 1e-9
            );

            let again = leiden(adjacency, &LeidenConfig::default());
            prop_assert_eq!(membership, again);
        }
    }
}
