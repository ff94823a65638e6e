use std::any::Any;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use rustc_hash::FxHasher;

mod boundary_nodes;
mod cut_edges;
mod election;
mod tally;

use crate::errors::Error;
use crate::graph::Graph;
use crate::Updater;

pub use boundary_nodes::{BoundaryNodes, BoundaryNodesUpdater, NodeSet, BOUNDARY_NODE};
pub use cut_edges::{
    crosses_parts, cut_edges_by_part_from_cut_edges, CutEdges, CutEdgesByPart,
    CutEdgesByPartUpdater, CutEdgesUpdater,
};
pub use election::{ElectionResults, ElectionUpdater};
pub use tally::{flows_from_changes, Flow, Tally, TallyUpdater};

/// Hasher of the persistent sets and maps cached on a partition. Its fixed
/// seed keeps iteration order, and so seeded chains, reproducible.
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Name the cut-edge updater is registered under.
pub const CUT_EDGES: &str = "cut_edges";

/// Name the per-part cut-edge updater is registered under.
pub const CUT_EDGES_BY_PART: &str = "cut_edges_by_part";

/// Name the boundary-node updater is registered under.
pub const BOUNDARY_NODES: &str = "boundary_nodes";

/// Names that refer to the partition itself and cannot hold a statistic.
pub const RESERVED_NAMES: [&str; 2] = ["assignment", "graph"];

/// A cached statistic of a partition.
#[derive(Clone)]
pub enum Field {
    CutEdges(CutEdges),
    CutEdgesByPart(CutEdgesByPart),
    Tally(Tally),
    BoundaryNodes(BoundaryNodes),
    Election(ElectionResults),

    /// Value of a user-defined updater.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Field {
    pub fn as_cut_edges(&self) -> Option<&CutEdges> {
        match self {
            Field::CutEdges(cut_edges) => Some(cut_edges),
            _ => None,
        }
    }

    pub fn as_cut_edges_by_part(&self) -> Option<&CutEdgesByPart> {
        match self {
            Field::CutEdgesByPart(by_part) => Some(by_part),
            _ => None,
        }
    }

    pub fn as_tally(&self) -> Option<&Tally> {
        match self {
            Field::Tally(tally) => Some(tally),
            _ => None,
        }
    }

    pub fn as_boundary_nodes(&self) -> Option<&BoundaryNodes> {
        match self {
            Field::BoundaryNodes(boundary) => Some(boundary),
            _ => None,
        }
    }

    pub fn as_election(&self) -> Option<&ElectionResults> {
        match self {
            Field::Election(results) => Some(results),
            _ => None,
        }
    }

    pub fn as_custom<T: Any>(&self) -> Option<&T> {
        match self {
            Field::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Field::CutEdges(_) => "cut edges",
            Field::CutEdgesByPart(_) => "cut edges by part",
            Field::Tally(_) => "tally",
            Field::BoundaryNodes(_) => "boundary nodes",
            Field::Election(_) => "election",
            Field::Custom(_) => "custom",
        }
    }
}

// Custom values are opaque, so two of them only compare equal when they are
// the same allocation. Updaters producing them override `Updater::agrees`.
impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::CutEdges(a), Field::CutEdges(b)) => a == b,
            (Field::CutEdgesByPart(a), Field::CutEdgesByPart(b)) => a == b,
            (Field::Tally(a), Field::Tally(b)) => a == b,
            (Field::BoundaryNodes(a), Field::BoundaryNodes(b)) => a == b,
            (Field::Election(a), Field::Election(b)) => a == b,
            (Field::Custom(a), Field::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::CutEdges(cut_edges) => f.debug_tuple("CutEdges").field(cut_edges).finish(),
            Field::CutEdgesByPart(by_part) => {
                f.debug_tuple("CutEdgesByPart").field(by_part).finish()
            }
            Field::Tally(tally) => f.debug_tuple("Tally").field(tally).finish(),
            Field::BoundaryNodes(boundary) => {
                f.debug_tuple("BoundaryNodes").field(boundary).finish()
            }
            Field::Election(results) => f.debug_tuple("Election").field(results).finish(),
            Field::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::CutEdges(cut_edges) => write!(f, "{} cut edges", cut_edges.len()),
            Field::CutEdgesByPart(by_part) => write!(f, "cut edges in {} parts", by_part.len()),
            Field::Tally(tally) => {
                let mut parts: Vec<_> = tally.parts().collect();
                parts.sort_unstable();
                let values: Vec<String> = parts
                    .into_iter()
                    .map(|part| format!("{part}: {}", tally.as_f64(part)))
                    .collect();
                write!(f, "{{{}}}", values.join(", "))
            }
            Field::BoundaryNodes(boundary) => {
                write!(f, "boundary nodes in {} parts", boundary.len())
            }
            Field::Election(results) => {
                let parties = results.parties().join(", ");
                write!(f, "{} votes for {parties}", results.total_votes())
            }
            Field::Custom(_) => f.write_str("<custom>"),
        }
    }
}

/// Error for an updater handed a cached value of the wrong kind.
pub(crate) fn wrong_kind(expected: &str, found: &Field) -> Error {
    Error::Configuration(format!("expected a cached {expected} field, found {}", found.kind()))
}

/// Named updaters, shared by every partition of a chain.
///
/// Updaters run in registration order.
#[derive(Default)]
pub struct UpdaterRegistry {
    updaters: Vec<(String, Box<dyn Updater>)>,
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `updater` under `name`.
    pub fn register<U: Updater + 'static>(&mut self, name: &str, updater: U) -> Result<(), Error> {
        if RESERVED_NAMES.contains(&name) {
            return Err(Error::Configuration(format!("`{name}` is a reserved name")));
        }
        if self.contains(name) {
            return Err(Error::Configuration(format!("`{name}` is already registered")));
        }
        self.updaters.push((name.to_string(), Box::new(updater)));
        Ok(())
    }

    /// Builder form of [`UpdaterRegistry::register`].
    pub fn with<U: Updater + 'static>(mut self, name: &str, updater: U) -> Result<Self, Error> {
        self.register(name, updater)?;
        Ok(self)
    }

    pub fn with_cut_edges(self) -> Result<Self, Error> {
        self.with(CUT_EDGES, CutEdgesUpdater)
    }

    pub fn with_cut_edges_by_part(self) -> Result<Self, Error> {
        self.with(CUT_EDGES_BY_PART, CutEdgesByPartUpdater)
    }

    pub fn with_boundary_nodes(self) -> Result<Self, Error> {
        self.with(BOUNDARY_NODES, BoundaryNodesUpdater)
    }

    /// Tally the votes of `parties`, one attribute column per party, under
    /// `name`.
    pub fn with_election(self, name: &str, parties: &[&str]) -> Result<Self, Error> {
        self.with(name, ElectionUpdater::new(parties))
    }

    /// Sum `attribute` per part, stored under `alias` (or the attribute name).
    pub fn with_tally(self, attribute: &str, alias: Option<&str>) -> Result<Self, Error> {
        self.with(alias.unwrap_or(attribute), TallyUpdater::new(attribute))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.updaters.iter().any(|(registered, _)| registered == name)
    }

    pub fn len(&self) -> usize {
        self.updaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updaters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.updaters.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Updater)> {
        self.updaters
            .iter()
            .map(|(name, updater)| (name.as_str(), updater.as_ref()))
    }

    /// Check that `graph` carries every attribute column an updater reads.
    pub fn validate(&self, graph: &Graph) -> Result<(), Error> {
        for (name, updater) in self.iter() {
            for attribute in updater.required_attributes() {
                if !graph.has_attribute(attribute) {
                    return Err(Error::Configuration(format!(
                        "updater `{name}` reads attribute `{attribute}`, \
                         which the graph does not have"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for UpdaterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
