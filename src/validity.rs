// Validity constraints and acceptance functions.
//
// These sit on top of the partition core: they read fields of a proposed
// partition and never feed anything back into the updaters.

use std::collections::VecDeque;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::assignment::PartId;
use crate::errors::Error;
use crate::graph::NodeId;
use crate::imbalance::{ideal_part_load, max_relative_deviation};
use crate::partition::Partition;

/// A single validity test on a proposed partition.
pub type Constraint = Box<dyn Fn(&Partition) -> Result<bool, Error> + Send + Sync>;

/// A partition is valid when every constraint holds.
#[derive(Default)]
pub struct Validator {
    constraints: Vec<Constraint>,
}

impl Validator {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Run the constraints in order, stopping at the first one that fails.
    pub fn is_valid(&self, partition: &Partition) -> Result<bool, Error> {
        for constraint in &self.constraints {
            if !constraint(partition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Every part in the tally `name` keeps a positive sum.
pub fn no_vanishing_districts(name: &str) -> Constraint {
    let name = name.to_string();
    Box::new(move |partition| {
        let tally = partition.tally(&name)?;
        Ok(tally.loads().into_iter().all(|(_, load)| load > 0.0))
    })
}

/// Every part's sum in tally `name` stays within `percent` of the ideal
/// taken from `initial` (total over its number of parts).
pub fn within_percent_of_ideal_population(
    initial: &Partition,
    name: &str,
    percent: f64,
) -> Result<Constraint, Error> {
    if !(0.0..=1.0).contains(&percent) {
        return Err(Error::Configuration(format!(
            "population tolerance {percent} is not a fraction between 0 and 1"
        )));
    }

    let tally = initial.tally(name)?;
    let ideal = ideal_part_load(tally.total().as_f64(), initial.parts().len());
    let name = name.to_string();

    Ok(Box::new(move |partition| {
        let part_loads: Vec<f64> = partition
            .tally(&name)?
            .loads()
            .into_iter()
            .map(|(_, load)| load)
            .collect();
        Ok(max_relative_deviation(&part_loads, ideal) <= percent)
    }))
}

/// Every part that lost a node in the last transition is still connected.
///
/// Assumes the parent partition's parts were connected, so only the
/// neighbours a flipped node left behind need to be reachable from one
/// another inside their part.
pub fn single_flip_contiguous(partition: &Partition) -> Result<bool, Error> {
    let previous = match partition.parent_assignment() {
        Some(previous) => previous,
        None => return Ok(true),
    };
    let graph = partition.graph();
    let assignment = partition.assignment();

    // part -> nodes of that part adjacent to a node that left it
    let mut left_behind: FxHashMap<PartId, FxHashSet<NodeId>> = FxHashMap::default();
    for &node in partition.parent_flip().keys() {
        let source = previous.get(node);
        if source == assignment.get(node) {
            continue;
        }
        let neighbors = left_behind.entry(source).or_default();
        let same_part = |&neighbor: &NodeId| assignment.get(neighbor) == source;
        neighbors.extend(graph.neighbors(node).filter(same_part));
    }

    for (part, targets) in left_behind {
        if !connected_within_part(partition, part, &targets) {
            return Ok(false);
        }
    }

    Ok(true)
}

// Breadth-first search inside `part`, stopping as soon as every target is
// reached.
fn connected_within_part(partition: &Partition, part: PartId, targets: &FxHashSet<NodeId>) -> bool {
    if targets.len() <= 1 {
        return true;
    }
    let start = match targets.iter().next() {
        Some(&start) => start,
        None => return true,
    };
    let graph = partition.graph();
    let assignment = partition.assignment();

    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();
    let mut remaining = targets.len() - 1;
    seen.insert(start);
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for neighbor in graph.neighbors(node) {
            if assignment.get(neighbor) != part || !seen.insert(neighbor) {
                continue;
            }
            if targets.contains(&neighbor) {
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
            }
            queue.push_back(neighbor);
        }
    }

    remaining == 0
}

/// Acceptance function that takes every valid proposal.
pub fn always_accept<R: Rng + ?Sized>(_partition: &Partition, _rng: &mut R) -> bool {
    true
}
