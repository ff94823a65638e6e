use crate::assignment::{Assignment, Flip, PartId};
use crate::errors::Error;
use crate::graph::{Column, Graph, NodeId};
use crate::partition::Partition;
use crate::updaters::{wrong_kind, Field, FxBuildHasher};
use crate::Updater;

/// Node attribute marking nodes on the outer boundary of the whole map.
///
/// Any nonzero value marks the node.
pub const BOUNDARY_NODE: &str = "boundary_node";

/// Set of nodes, persistent like the cut-edge sets.
pub type NodeSet = im::HashSet<NodeId, FxBuildHasher>;

/// Part -> its nodes lying on the outer boundary. Parts without such a node
/// do not appear.
pub type BoundaryNodes = im::HashMap<PartId, NodeSet, FxBuildHasher>;

fn on_boundary(column: &Column, node: NodeId) -> bool {
    column.get(node).is_some_and(|value| value.as_f64() != 0.0)
}

/// Maintains the outer-boundary nodes of every part.
///
/// A node's boundary flag never changes, so a transition only has to move
/// the flagged nodes of the flip from their old part to their new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryNodesUpdater;

impl Updater for BoundaryNodesUpdater {
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
        let column = graph.column(BOUNDARY_NODE)?;
        let mut boundary = BoundaryNodes::default();

        for (node, part) in assignment.iter().filter(|&(node, _)| on_boundary(column, node)) {
            boundary.entry(part).or_insert_with(NodeSet::default).insert(node);
        }

        Ok(Field::BoundaryNodes(boundary))
    }

    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        _assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error> {
        let boundary = value
            .as_boundary_nodes()
            .ok_or_else(|| wrong_kind("boundary nodes", value))?;
        let column = previous.graph().column(BOUNDARY_NODE)?;
        let mut updated = boundary.clone();

        for (&node, &target) in flip {
            let source = previous.assignment().get(node);
            if source == target || !on_boundary(column, node) {
                continue;
            }

            if let Some(nodes) = updated.get_mut(&source) {
                nodes.remove(&node);
                if nodes.is_empty() {
                    updated.remove(&source);
                }
            }
            updated.entry(target).or_insert_with(NodeSet::default).insert(node);
        }

        Ok(Field::BoundaryNodes(updated))
    }

    fn required_attributes(&self) -> Vec<&str> {
        vec![BOUNDARY_NODE]
    }
}
