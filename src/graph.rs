// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe

use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator as _;
use rustc_hash::FxHashMap;
use sprs::{CsMat, TriMat};
use crate::errors::Error;

/// Index of a node in the topology.
pub type NodeId = usize;

/// An undirected edge, always stored as `(smaller, larger)`.
pub type Edge = (NodeId, NodeId);

/// Normalize an unordered pair of endpoints into an [`Edge`].
#[inline]
pub fn edge(u: NodeId, v: NodeId) -> Edge {
    if u <= v { (u, v) } else { (v, u) }
}

/// A numeric per-node attribute column.
///
/// Integer columns stay integers all the way through tallies so that sums
/// are exact.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(values) => values.len(),
            Column::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, node: NodeId) -> Option<Value> {
        match self {
            Column::Int(values) => values.get(node).copied().map(Value::Int),
            Column::Float(values) => values.get(node).copied().map(Value::Float),
        }
    }
}

/// A single attribute value read from a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(value) => value as f64,
            Value::Float(value) => value,
        }
    }
}

/// Static topology a chain runs on.
///
/// Adjacency lives in a symmetric CSR matrix; node attributes are kept as
/// named columns indexed by node. Nothing here changes once a chain starts.
pub struct Graph {
    /// Symmetric adjacency matrix, one row per node
    pub graph_csr: CsMat<f64>,

    attributes: FxHashMap<String, Column>,
}

impl Graph {

    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            graph_csr: CsMat::empty(sprs::CSR, 0),
            attributes: FxHashMap::default(),
        }
    }

    /// Build a graph with `num_nodes` nodes from a list of undirected edges.
    ///
    /// Each pair is inserted in both directions; self loops are dropped and
    /// repeated pairs collapse into a single edge.
    pub fn from_edges(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, Error> {
        let mut triplet_matrix = TriMat::with_capacity((num_nodes, num_nodes), 2 * edges.len());

        for &(u, v) in edges {
            for node in [u, v] {
                if node >= num_nodes {
                    return Err(Error::NodeOutOfRange { node, len: num_nodes });
                }
            }
            if u == v {
                continue;
            }
            triplet_matrix.add_triplet(u, v, 1.0);
            triplet_matrix.add_triplet(v, u, 1.0);
        }

        Ok(Self::from_csr(triplet_matrix.to_csr()))
    }

    /// Wrap an already assembled adjacency matrix.
    pub fn from_csr(graph_csr: CsMat<f64>) -> Self {
        Self {
            graph_csr,
            attributes: FxHashMap::default(),
        }
    }

    /// The number of vertices in the graph.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.graph_csr.rows(), self.graph_csr.cols());
        self.graph_csr.rows()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An iterator over the neighbors of the given vertex.
    pub fn neighbors(&self, vertex: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let indices: &[usize] = match self.graph_csr.outer_view(vertex) {
            Some(view) => view.into_raw_storage().0,
            None => &[],
        };
        indices.iter().copied().filter(move |&neighbor| neighbor != vertex)
    }

    pub fn degree(&self, vertex: NodeId) -> usize {
        self.neighbors(vertex).count()
    }

    /// Every undirected edge exactly once, as `(smaller, larger)`.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.len()).flat_map(move |vertex| {
            self.neighbors(vertex)
                .filter(move |&neighbor| neighbor > vertex)
                .map(move |neighbor| (vertex, neighbor))
        })
    }

    pub fn num_edges(&self) -> usize {
        self.edges().count()
    }

    /// Attach a named attribute column. Its length must match the node count.
    pub fn add_attribute(&mut self, key: &str, column: Column) -> Result<(), Error> {
        if column.len() != self.len() {
            return Err(Error::Configuration(format!(
                "attribute `{key}` has {} values for {} nodes",
                column.len(),
                self.len()
            )));
        }
        self.attributes.insert(key.to_string(), column);
        Ok(())
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// The whole column stored under `key`.
    pub fn column(&self, key: &str) -> Result<&Column, Error> {
        self.attributes
            .get(key)
            .ok_or_else(|| Error::MissingAttribute(key.to_string()))
    }

    /// The value of attribute `key` at `node`.
    pub fn attribute(&self, node: NodeId, key: &str) -> Result<Value, Error> {
        self.column(key)?
            .get(node)
            .ok_or(Error::NodeOutOfRange { node, len: self.len() })
    }

    /// The edge cut of a partition.
    ///
    /// Counts the edges whose endpoints are assigned to different parts. This
    /// is a full scan and is only meant for reporting and cross-checking.
    pub fn edge_cut(&self, parts: &[usize]) -> usize {
        debug_assert_eq!(self.len(), parts.len());

        (0..self.len())
            .into_par_iter()
            .map(|vertex| {
                self.neighbors(vertex)
                    .filter(|&neighbor| neighbor < vertex)
                    .filter(|&neighbor| parts[vertex] != parts[neighbor])
                    .count()
            })
            .sum()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
