// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
pub mod errors;
pub mod graph;
pub mod assignment;
pub mod updaters;
pub mod partition;
pub mod proposals;
pub mod imbalance;
pub mod validity;
pub mod scores;
pub mod chain;
pub mod gen_weights;
pub mod io;

pub use assignment::{Assignment, Flip, PartId};
pub use errors::Error;
pub use graph::{Column, Edge, Graph, NodeId, Value};
pub use partition::Partition;
pub use updaters::{Field, UpdaterRegistry};

// The `Updater` trait derives one named statistic of a partition.
// Built-in statistics (cut edges, per-part tallies) implement it and so can
// user-defined ones.
//
// Every updater has two calling conventions: `initialize` computes the
// statistic from nothing but the topology and an assignment, `update` derives
// it from the previous partition's cached value and the flip that was just
// applied. For every reachable state both must produce the same value;
// `Partition::verify` checks this by recomputing from scratch and comparing
// with `agrees`.
pub trait Updater: Send + Sync {
    // Compute the statistic from scratch.
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error>;

    // Compute the statistic for `assignment`, which is `previous.assignment()`
    // overridden by `flip`. `value` is the statistic cached on `previous`.
    // The cost should depend on the size of the flip, not of the graph.
    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error>;

    // Node attribute columns this updater reads. Checked once when the
    // partition is constructed so that a missing column fails at setup.
    fn required_attributes(&self) -> Vec<&str> {
        Vec::new()
    }

    // Whether a cached value and a freshly computed one describe the same
    // statistic.
    fn agrees(&self, cached: &Field, fresh: &Field) -> bool {
        cached == fresh
    }
}
