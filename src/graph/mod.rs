//! Directed graph model: edges, candidate solutions, and the vertex set.
//!
//! Every type that crosses the shared-memory boundary here is `#[repr(C)]`
//! and `Copy`, with fixed-size arrays instead of heap storage, so a value
//! can be copied byte-for-byte between address spaces.

pub mod parser;

use crate::error::{Error, Result};
use std::fmt;

pub use parser::{parse_edge, parse_edges};

/// Maximum number of edges in a graph, and therefore in a solution.
pub const MAX_EDGES: usize = 40;

/// Vertex identifier as given on the command line.
pub type Vertex = i32;

/// A directed edge `start -> end`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Edge {
    pub start: Vertex,
    pub end: Vertex,
}

impl Edge {
    pub const fn new(start: Vertex, end: Vertex) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A candidate feedback arc set: up to [`MAX_EDGES`] edges plus a count.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Solution {
    edges: [Edge; MAX_EDGES],
    len: u32,
}

impl Solution {
    pub const fn new() -> Self {
        Self {
            edges: [Edge::new(0, 0); MAX_EDGES],
            len: 0,
        }
    }

    /// Build a solution from a slice, failing if it exceeds the capacity.
    pub fn from_edges(edges: &[Edge]) -> Result<Self> {
        let mut solution = Self::new();
        for &edge in edges {
            solution.push(edge)?;
        }
        Ok(solution)
    }

    /// Append an edge.
    pub fn push(&mut self, edge: Edge) -> Result<()> {
        let len = self.len();
        if len >= MAX_EDGES {
            return Err(Error::SolutionFull { max: MAX_EDGES });
        }
        self.edges[len] = edge;
        self.len += 1;
        Ok(())
    }

    /// Number of edges removed by this solution.
    ///
    /// Clamped to the capacity for values read back from shared memory.
    pub fn len(&self) -> usize {
        (self.len as usize).min(MAX_EDGES)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges[..self.len()]
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.edges() == other.edges()
    }
}

impl Eq for Solution {}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.edges()).finish()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.edges().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", edge)?;
        }
        Ok(())
    }
}

/// The input graph held by a generator: its edges and derived vertex set.
#[derive(Debug, Clone)]
pub struct Graph {
    edges: Vec<Edge>,
    vertices: Vec<Vertex>,
}

impl Graph {
    /// Build a graph from a non-empty edge list of at most [`MAX_EDGES`].
    pub fn new(edges: Vec<Edge>) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::NoEdges);
        }
        if edges.len() > MAX_EDGES {
            return Err(Error::TooManyEdges {
                count: edges.len(),
                max: MAX_EDGES,
            });
        }
        let vertices = vertex_set(&edges);
        Ok(Self { edges, vertices })
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Distinct endpoints in order of first appearance.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }
}

/// Collect the distinct endpoints of `edges`, keeping first-seen order.
pub fn vertex_set(edges: &[Edge]) -> Vec<Vertex> {
    let mut vertices: Vec<Vertex> = Vec::with_capacity(edges.len() * 2);
    for edge in edges {
        for v in [edge.start, edge.end] {
            if !vertices.contains(&v) {
                vertices.push(v);
            }
        }
    }
    vertices
}
