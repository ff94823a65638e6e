use std::any::Any;
use std::fmt;
use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};
use crate::assignment::{Assignment, Flip, PartId};
use crate::errors::Error;
use crate::graph::Graph;
use crate::updaters::{
    BoundaryNodes, CutEdges, CutEdgesByPart, ElectionResults, Field, Tally, UpdaterRegistry,
    BOUNDARY_NODES, CUT_EDGES, CUT_EDGES_BY_PART,
};

/// An immutable snapshot of a partition of the graph.
///
/// Bundles the shared topology, the current assignment, the shared updater
/// registry and the value every updater computed for this assignment. A new
/// snapshot is produced by [`Partition::transition`]; the old one stays valid
/// and unchanged, so a chain may keep or drop its history as it likes.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use FlipChain::{Assignment, Column, Flip, Graph, Partition, UpdaterRegistry};
/// # fn main() -> Result<(), FlipChain::Error> {
///
///     let mut graph = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])?;
///     graph.add_attribute("pop", Column::Int(vec![1; 4]))?;
///     let updaters = UpdaterRegistry::new().with_cut_edges()?.with_tally("pop", None)?;
///
///     let partition = Partition::new(
///         Arc::new(graph),
///         Assignment::new(vec![0, 0, 1, 1]),
///         Arc::new(updaters),
///     )?;
///     let flip: Flip = [(1, 1)].into_iter().collect();
///     let next = partition.transition(&flip)?;
///
///     assert_eq!(next.cut_edges()?.len(), 2);
///     assert_eq!(next.tally("pop")?.as_f64(1), 3.0);
///     Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Partition {
    graph: Arc<Graph>,
    assignment: Assignment,
    updaters: Arc<UpdaterRegistry>,
    fields: Arc<FxHashMap<String, Field>>,

    // The assignment and flip this snapshot was derived from, if any.
    parent_assignment: Option<Assignment>,
    parent_flip: Arc<Flip>,
}

impl Partition {

    /// Build the initial partition of a chain, computing every updater from
    /// scratch.
    pub fn new(
        graph: Arc<Graph>,
        assignment: Assignment,
        updaters: Arc<UpdaterRegistry>,
    ) -> Result<Self, Error> {
        if assignment.len() != graph.len() {
            return Err(Error::Configuration(format!(
                "assignment covers {} nodes but the graph has {}",
                assignment.len(),
                graph.len()
            )));
        }
        updaters.validate(&graph)?;

        let fields = updaters
            .iter()
            .map(|(name, updater)| Ok((name.to_string(), updater.initialize(&graph, &assignment)?)))
            .collect::<Result<FxHashMap<_, _>, Error>>()?;

        info!(
            nodes = graph.len(),
            parts = assignment.parts().len(),
            updaters = updaters.len(),
            "constructed partition"
        );

        Ok(Self {
            graph,
            assignment,
            updaters,
            fields: Arc::new(fields),
            parent_assignment: None,
            parent_flip: Arc::new(Flip::default()),
        })
    }

    /// Build the initial partition from an integer attribute column holding
    /// each node's part.
    pub fn from_attribute(
        graph: Arc<Graph>,
        key: &str,
        updaters: Arc<UpdaterRegistry>,
    ) -> Result<Self, Error> {
        let assignment = Assignment::from_attribute(&graph, key)?;
        Self::new(graph, assignment, updaters)
    }

    /// The partition obtained by applying `flip` to this one.
    ///
    /// Every updater is run in its incremental form against this partition.
    /// An empty flip yields a snapshot whose fields equal this one's.
    pub fn transition(&self, flip: &Flip) -> Result<Self, Error> {
        if flip.is_empty() {
            // Nothing moves, so every cached value and the assignment itself
            // can be shared.
            return Ok(Self {
                parent_assignment: Some(self.assignment.clone()),
                parent_flip: Arc::new(Flip::default()),
                ..self.clone()
            });
        }

        let assignment = self.assignment.apply(flip)?;

        let mut fields = FxHashMap::with_capacity_and_hasher(self.fields.len(), Default::default());
        for (name, updater) in self.updaters.iter() {
            let value = self.field(name)?;
            fields.insert(name.to_string(), updater.update(self, value, &assignment, flip)?);
        }

        let cut_edges = fields
            .get(CUT_EDGES)
            .and_then(Field::as_cut_edges)
            .map(|cut_edges| cut_edges.len());
        debug!(flipped = flip.len(), cut_edges = ?cut_edges, "applied flip");

        Ok(Self {
            graph: self.graph.clone(),
            assignment,
            updaters: self.updaters.clone(),
            fields: Arc::new(fields),
            parent_assignment: Some(self.assignment.clone()),
            parent_flip: Arc::new(flip.clone()),
        })
    }

    /// The cached value of the updater registered as `name`.
    pub fn field(&self, name: &str) -> Result<&Field, Error> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn cut_edges(&self) -> Result<&CutEdges, Error> {
        self.field(CUT_EDGES)?
            .as_cut_edges()
            .ok_or_else(|| Error::UnknownField(CUT_EDGES.to_string()))
    }

    pub fn cut_edges_by_part(&self) -> Result<&CutEdgesByPart, Error> {
        self.field(CUT_EDGES_BY_PART)?
            .as_cut_edges_by_part()
            .ok_or_else(|| Error::UnknownField(CUT_EDGES_BY_PART.to_string()))
    }

    pub fn tally(&self, name: &str) -> Result<&Tally, Error> {
        self.field(name)?
            .as_tally()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn boundary_nodes(&self) -> Result<&BoundaryNodes, Error> {
        self.field(BOUNDARY_NODES)?
            .as_boundary_nodes()
            .ok_or_else(|| Error::UnknownField(BOUNDARY_NODES.to_string()))
    }

    pub fn election(&self, name: &str) -> Result<&ElectionResults, Error> {
        self.field(name)?
            .as_election()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// The value of a user-defined updater, downcast to `T`.
    pub fn custom<T: Any>(&self, name: &str) -> Result<&T, Error> {
        self.field(name)?
            .as_custom::<T>()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Shared handle on the topology, for building sibling chains.
    pub fn graph_handle(&self) -> Arc<Graph> {
        self.graph.clone()
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn updaters(&self) -> &Arc<UpdaterRegistry> {
        &self.updaters
    }

    /// Distinct parts currently represented.
    pub fn parts(&self) -> FxHashSet<PartId> {
        self.assignment.parts()
    }

    /// The assignment this snapshot was derived from; `None` for an initial
    /// partition.
    pub fn parent_assignment(&self) -> Option<&Assignment> {
        self.parent_assignment.as_ref()
    }

    /// The flip that produced this snapshot; empty for an initial partition
    /// and for self loops.
    pub fn parent_flip(&self) -> &Flip {
        &self.parent_flip
    }

    /// Recompute every updater from scratch and compare with the cached
    /// values.
    pub fn verify(&self) -> Result<(), Error> {
        for (name, updater) in self.updaters.iter() {
            let fresh = updater.initialize(&self.graph, &self.assignment)?;
            if !updater.agrees(self.field(name)?, &fresh) {
                return Err(Error::InconsistentUpdater { name: name.to_string() });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("nodes", &self.assignment.len())
            .field("updaters", &self.updaters)
            .field("parent_flip", &self.parent_flip)
            .finish()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Partition")?;
        for name in self.updaters.names() {
            if let Ok(field) = self.field(name) {
                write!(f, "\n{name}: {field}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Column, Edge};
    use crate::updaters::TallyUpdater;
    use crate::Updater;

    fn square() -> Arc<Graph> {
        // 0 - 1
        // |   |
        // 3 - 2
        let mut graph = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap();
        graph.add_attribute("pop", Column::Int(vec![1, 1, 1, 1])).unwrap();
        Arc::new(graph)
    }

    fn registry() -> Arc<UpdaterRegistry> {
        Arc::new(
            UpdaterRegistry::new()
                .with_cut_edges()
                .unwrap()
                .with_cut_edges_by_part()
                .unwrap()
                .with_tally("pop", Some("population"))
                .unwrap(),
        )
    }

    // Left column in part 0, right column in part 1.
    fn split_square() -> Partition {
        Partition::new(square(), Assignment::new(vec![0, 0, 1, 1]), registry()).unwrap()
    }

    fn edges(pairs: &[Edge]) -> CutEdges {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_initial_fields() {
        // Arrange and Act
        let partition = split_square();

        // Assert
        assert_eq!(partition.cut_edges().unwrap(), &edges(&[(1, 2), (0, 3)]));
        assert_eq!(partition.tally("population").unwrap().as_f64(0), 2.0);
        assert_eq!(partition.tally("population").unwrap().as_f64(1), 2.0);
        assert!(partition.parent_assignment().is_none());
    }

    #[test]
    fn test_transition_moves_boundary() {
        // Arrange
        let partition = split_square();
        let flip: Flip = [(1, 1)].into_iter().collect();

        // Act
        let next = partition.transition(&flip).unwrap();

        // Assert
        assert_eq!(next.cut_edges().unwrap(), &edges(&[(0, 1), (0, 3)]));
        assert_eq!(next.tally("population").unwrap().as_f64(0), 1.0);
        assert_eq!(next.tally("population").unwrap().as_f64(1), 3.0);
        assert_eq!(next.parent_flip(), &flip);
        assert!(next.verify().is_ok());

        // The predecessor is untouched.
        assert_eq!(partition.assignment().to_vec(), vec![0, 0, 1, 1]);
        assert_eq!(partition.cut_edges().unwrap(), &edges(&[(1, 2), (0, 3)]));
    }

    #[test]
    fn test_history_survives_later_transitions() {
        // Arrange
        let flips: Vec<Flip> = [(1, 1), (0, 1), (2, 0), (3, 0), (1, 0)]
            .into_iter()
            .map(|entry| [entry].into_iter().collect())
            .collect();
        let mut history = vec![split_square()];
        let mut seen = vec![(vec![0, 0, 1, 1], history[0].cut_edges().unwrap().clone())];

        // Act
        for flip in &flips {
            let next = history[history.len() - 1].transition(flip).unwrap();
            seen.push((next.assignment().to_vec(), next.cut_edges().unwrap().clone()));
            history.push(next);
        }

        // Assert
        for (partition, (parts, cut_edges)) in history.iter().zip(&seen) {
            assert_eq!(&partition.assignment().to_vec(), parts);
            assert_eq!(partition.cut_edges().unwrap(), cut_edges);
            assert!(partition.verify().is_ok());
        }
        assert_eq!(history[0].assignment().to_vec(), vec![0, 0, 1, 1]);
        assert_eq!(history[1].assignment().to_vec(), vec![0, 1, 1, 1]);
    }

    #[test]
    fn test_empty_transition_keeps_fields() {
        // Arrange
        let partition = split_square();

        // Act
        let next = partition.transition(&Flip::default()).unwrap();

        // Assert
        for (name, field) in partition.fields() {
            assert_eq!(next.field(name).unwrap(), field);
        }
        assert!(next.assignment().shares_storage_with(partition.assignment()));
        assert!(next.parent_flip().is_empty());
    }

    #[test]
    fn test_uncovered_assignment_is_rejected() {
        // Arrange and Act
        let result = Partition::new(square(), Assignment::new(vec![0, 0, 1]), registry());

        // Assert
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unknown_field() {
        // Arrange
        let partition = split_square();

        // Act and Assert
        assert!(matches!(partition.field("perimeter"), Err(Error::UnknownField(_))));
        assert!(matches!(partition.tally("cut_edges"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_missing_attribute_fails_at_construction() {
        // Arrange
        let updaters = Arc::new(UpdaterRegistry::new().with_tally("votes", None).unwrap());

        // Act
        let result = Partition::new(square(), Assignment::new(vec![0, 0, 1, 1]), updaters);

        // Assert
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    // Tally that forgets to account for nodes leaving a part.
    struct LeakyTally(TallyUpdater);

    impl Updater for LeakyTally {
        fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
            self.0.initialize(graph, assignment)
        }

        fn update(
            &self,
            _previous: &Partition,
            value: &Field,
            _assignment: &Assignment,
            _flip: &Flip,
        ) -> Result<Field, Error> {
            Ok(value.clone())
        }
    }

    #[test]
    fn test_verify_detects_inconsistent_updater() {
        // Arrange
        let updaters = Arc::new(
            UpdaterRegistry::new()
                .with("leaky", LeakyTally(TallyUpdater::new("pop")))
                .unwrap(),
        );
        let assignment = Assignment::new(vec![0, 0, 1, 1]);
        let partition = Partition::new(square(), assignment, updaters).unwrap();
        let flip: Flip = [(1, 1)].into_iter().collect();

        // Act
        let next = partition.transition(&flip).unwrap();

        // Assert
        assert!(partition.verify().is_ok());
        assert!(matches!(
            next.verify(),
            Err(Error::InconsistentUpdater { name }) if name == "leaky"
        ));
    }

    #[test]
    fn test_display_lists_fields() {
        // Arrange
        let partition = split_square();

        // Act
        let text = partition.to_string();

        // Assert
        assert!(text.starts_with("Partition"));
        assert!(text.contains("cut_edges: 2 cut edges"));
        assert!(text.contains("population: {0: 2, 1: 2}"));
    }
}
