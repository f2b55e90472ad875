//! Parser for `start-end` edge tokens.

use crate::error::{Error, Result};
use crate::graph::{Edge, MAX_EDGES, Vertex};

/// Parse one edge token such as `3-7`.
///
/// The separator is the first `-` after the leading character, so a
/// negative start vertex (`-1-2`) or end vertex (`1--2`) is accepted.
pub fn parse_edge(token: &str) -> Result<Edge> {
    let invalid = |reason: &str| Error::InvalidEdge {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let sep = token
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-')
        .map(|(i, _)| i)
        .ok_or_else(|| invalid("expected 'start-end'"))?;

    let (start, end) = (&token[..sep], &token[sep + 1..]);
    let start = parse_vertex(start).map_err(|e| invalid(&format!("start vertex: {}", e)))?;
    let end = parse_vertex(end).map_err(|e| invalid(&format!("end vertex: {}", e)))?;

    Ok(Edge::new(start, end))
}

fn parse_vertex(s: &str) -> std::result::Result<Vertex, String> {
    if s.is_empty() {
        return Err("missing".to_string());
    }
    s.parse::<Vertex>()
        .map_err(|_| format!("'{}' is not an integer", s))
}

/// Parse a full edge list, enforcing the 1..=[`MAX_EDGES`] bound.
pub fn parse_edges<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Edge>> {
    if tokens.is_empty() {
        return Err(Error::NoEdges);
    }
    if tokens.len() > MAX_EDGES {
        return Err(Error::TooManyEdges {
            count: tokens.len(),
            max: MAX_EDGES,
        });
    }
    tokens.iter().map(|t| parse_edge(t.as_ref())).collect()
}
