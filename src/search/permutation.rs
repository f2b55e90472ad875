//! Random-permutation heuristic for feedback arc sets
//!
//! For any total order of the vertices, the edges pointing "backwards" in
//! that order form a feedback arc set: removing them leaves only forward
//! edges, which cannot close a cycle. Each draw shuffles the vertex set
//! uniformly and collects the backward edges.

use crate::graph::{Edge, Graph, MAX_EDGES, Solution, Vertex};
use crate::search::CandidateSource;
use crate::search::config::SearchConfig;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Edges whose start comes after their end in `order`.
///
/// `edges` comes from a [`Graph`], so it holds at most [`MAX_EDGES`] edges.
/// Edges with an endpoint missing from `order` are skipped.
pub(crate) fn backward_edges(edges: &[Edge], order: &[Vertex]) -> Solution {
    debug_assert!(edges.len() <= MAX_EDGES);
    let position: HashMap<Vertex, usize> = order.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let mut solution = Solution::new();
    for edge in edges {
        if let (Some(start), Some(end)) = (position.get(&edge.start), position.get(&edge.end))
            && start > end
        {
            // Cannot fail: at most MAX_EDGES edges are visited.
            let _ = solution.push(*edge);
        }
    }
    solution
}

/// Generator-side search state: the graph, a scratch ordering and the RNG.
pub struct PermutationSearch {
    graph: Graph,
    order: Vec<Vertex>,
    rng: ChaCha8Rng,
    drawn: u64,
}

impl PermutationSearch {
    pub fn new(graph: Graph, config: &SearchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        let order = graph.vertices().to_vec();
        Self {
            graph,
            order,
            rng,
            drawn: 0,
        }
    }

    /// The vertex order used by the most recent draw.
    pub fn last_order(&self) -> &[Vertex] {
        &self.order
    }
}

impl CandidateSource for PermutationSearch {
    fn next_candidate(&mut self) -> Solution {
        self.order.shuffle(&mut self.rng);
        self.drawn += 1;
        backward_edges(self.graph.edges(), &self.order)
    }

    fn candidates_drawn(&self) -> u64 {
        self.drawn
    }
}
