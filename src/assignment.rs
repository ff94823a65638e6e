use std::sync::Arc;
use im::Vector;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::errors::Error;
use crate::graph::{Column, Graph, NodeId};

/// Identifier of a part (a district). Opaque; not required to be dense.
pub type PartId = usize;

/// The nodes that change part in one transition, mapped to their new part.
///
/// An empty flip is a self loop.
pub type Flip = FxHashMap<NodeId, PartId>;

/// Total mapping from node to part.
///
/// Backed by a persistent vector: snapshots share everything but the nodes
/// a flip touched, so applying a flip costs O(flip size * log n). An empty
/// flip hands back the very same storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    parts: Arc<Vector<PartId>>,
}

impl Assignment {

    /// Assignment where node `i` belongs to `parts[i]`.
    pub fn new(parts: Vec<PartId>) -> Self {
        Self {
            parts: Arc::new(Vector::from(parts)),
        }
    }

    /// Build an assignment from an explicit node -> part map.
    ///
    /// Every node in `0..num_nodes` must be present.
    pub fn from_map(map: &FxHashMap<NodeId, PartId>, num_nodes: usize) -> Result<Self, Error> {
        let mut parts = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes {
            match map.get(&node) {
                Some(&part) => parts.push(part),
                None => {
                    return Err(Error::Configuration(format!(
                        "assignment does not cover node {node}"
                    )))
                }
            }
        }
        if let Some(&extra) = map.keys().find(|&&node| node >= num_nodes) {
            return Err(Error::NodeOutOfRange { node: extra, len: num_nodes });
        }
        Ok(Self::new(parts))
    }

    /// Read the initial plan from an integer attribute column of the graph.
    pub fn from_attribute(graph: &Graph, key: &str) -> Result<Self, Error> {
        match graph.column(key)? {
            Column::Int(values) => values
                .iter()
                .map(|&value| {
                    PartId::try_from(value).map_err(|_| {
                        Error::Configuration(format!("`{key}` holds negative part id {value}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::new),
            Column::Float(_) => Err(Error::Configuration(format!(
                "`{key}` must be an integer column to be used as an assignment"
            ))),
        }
    }

    /// Round-robin plan over `num_parts` parts, mostly useful for smoke runs.
    pub fn round_robin(num_nodes: usize, num_parts: usize) -> Self {
        let num_parts = num_parts.max(1);
        Self::new((0..num_nodes).map(|node| node % num_parts).collect())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Part of `node`. Panics if the node is out of range, like slice indexing.
    #[inline]
    pub fn get(&self, node: NodeId) -> PartId {
        self.parts[node]
    }

    /// A plain copy of the node -> part array.
    pub fn to_vec(&self) -> Vec<PartId> {
        self.parts.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, PartId)> + '_ {
        self.parts.iter().copied().enumerate()
    }

    /// Distinct parts currently represented.
    pub fn parts(&self) -> FxHashSet<PartId> {
        self.parts.iter().copied().collect()
    }

    /// The assignment overridden at exactly the keys of `flip`.
    pub fn apply(&self, flip: &Flip) -> Result<Self, Error> {
        if flip.is_empty() {
            return Ok(self.clone());
        }
        let len = self.len();
        let mut parts = Vector::clone(&self.parts);
        for (&node, &part) in flip {
            if node >= len {
                return Err(Error::NodeOutOfRange { node, len });
            }
            parts.set(node, part);
        }
        Ok(Self {
            parts: Arc::new(parts),
        })
    }

    /// Whether two assignments share storage (no copy was made).
    pub fn shares_storage_with(&self, other: &Assignment) -> bool {
        Arc::ptr_eq(&self.parts, &other.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides_only_flipped_nodes() {
        // Arrange
        let assignment = Assignment::new(vec![0, 0, 1, 1]);
        let flip: Flip = [(1, 1)].into_iter().collect();

        // Act
        let next = assignment.apply(&flip).unwrap();

        // Assert
        assert_eq!(next.to_vec(), vec![0, 1, 1, 1]);
        assert_eq!(assignment.to_vec(), vec![0, 0, 1, 1]);
        assert!(!next.shares_storage_with(&assignment));
    }

    #[test]
    fn test_empty_flip_shares_storage() {
        // Arrange
        let assignment = Assignment::new(vec![0, 1]);

        // Act
        let next = assignment.apply(&Flip::default()).unwrap();

        // Assert
        assert!(next.shares_storage_with(&assignment));
    }

    #[test]
    fn test_apply_rejects_unknown_node() {
        // Arrange
        let assignment = Assignment::new(vec![0, 1]);
        let flip: Flip = [(7, 0)].into_iter().collect();

        // Act and Assert
        assert!(matches!(assignment.apply(&flip), Err(Error::NodeOutOfRange { node: 7, len: 2 })));
    }

    #[test]
    fn test_from_map_requires_every_node() {
        // Arrange
        let map: FxHashMap<NodeId, PartId> = [(0, 3), (2, 3)].into_iter().collect();

        // Act
        let result = Assignment::from_map(&map, 3);

        // Assert
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_from_attribute() {
        // Arrange
        let mut graph = Graph::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        graph.add_attribute("district", Column::Int(vec![4, 4, 9])).unwrap();
        graph.add_attribute("area", Column::Float(vec![0.5, 1.0, 2.0])).unwrap();

        // Act
        let assignment = Assignment::from_attribute(&graph, "district").unwrap();

        // Assert
        assert_eq!(assignment.to_vec(), vec![4, 4, 9]);
        assert_eq!(assignment.parts().len(), 2);
        assert!(matches!(Assignment::from_attribute(&graph, "area"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_round_robin() {
        // Arrange and Act
        let assignment = Assignment::round_robin(5, 2);

        // Assert
        assert_eq!(assignment.to_vec(), vec![0, 1, 0, 1, 0]);
    }
}
