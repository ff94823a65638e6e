// Proposal generators.
//
// Each generator reads the current partition and samples a flip without
// applying it. They only ever pick endpoints of cut edges, or neighbours of
// such an endpoint, and move them into a part adjacent to them; whether the
// result is a valid plan is left to the validator.
//
// All randomness comes from the generator passed in by the caller, so a
// seeded chain is reproducible.

use std::borrow::Cow;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use tracing::debug;
use crate::assignment::{Flip, PartId};
use crate::errors::Error;
use crate::graph::{Edge, Graph, NodeId};
use crate::partition::Partition;
use crate::updaters::{cut_edges_by_part_from_cut_edges, CutEdgesByPart};

/// Node attribute marking nodes that must never be flipped.
///
/// Any nonzero value freezes the node.
pub const FROZEN: &str = "frozen";

/// Probability with which [`propose_single_or_chunk`] takes a single flip.
const SINGLE_FLIP_PROBABILITY: f64 = 0.9;

fn choose_cut_edge<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Result<Edge, Error> {
    partition
        .cut_edges()?
        .iter()
        .copied()
        .choose(rng)
        .ok_or(Error::NoProposalAvailable)
}

// Pick one endpoint of `edge` at random and send it to the other's part.
fn flip_endpoint<R: Rng + ?Sized>(
    partition: &Partition,
    (u, v): Edge,
    rng: &mut R,
) -> (NodeId, PartId) {
    let (flipped_node, other_node) = if rng.gen_bool(0.5) { (u, v) } else { (v, u) };
    (flipped_node, partition.assignment().get(other_node))
}

fn is_frozen(graph: &Graph, node: NodeId) -> bool {
    graph
        .attribute(node, FROZEN)
        .map(|value| value.as_f64() != 0.0)
        .unwrap_or(false)
}

// A flip touching a frozen node becomes a self loop.
fn without_frozen(partition: &Partition, flip: Flip) -> Flip {
    let graph = partition.graph();
    if graph.has_attribute(FROZEN) && flip.keys().any(|&node| is_frozen(graph, node)) {
        debug!(flipped = flip.len(), "proposal touches a frozen node");
        return Flip::default();
    }
    flip
}

// The registered per-part cut edges, or the same map derived on the spot.
fn cut_edges_by_part(partition: &Partition) -> Result<Cow<'_, CutEdgesByPart>, Error> {
    match partition.cut_edges_by_part() {
        Ok(by_part) => Ok(Cow::Borrowed(by_part)),
        Err(Error::UnknownField(_)) => Ok(Cow::Owned(cut_edges_by_part_from_cut_edges(
            partition.cut_edges()?,
            partition.assignment(),
        ))),
        Err(error) => Err(error),
    }
}

/// Propose moving one endpoint of a random cut edge to the other endpoint's
/// part.
pub fn propose_random_flip<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    let edge = choose_cut_edge(partition, rng)?;
    let flip = [flip_endpoint(partition, edge, rng)].into_iter().collect();
    Ok(without_frozen(partition, flip))
}

/// Propose between 2 and 7 random boundary flips merged into one flip.
///
/// Later picks override earlier ones for the same node.
pub fn propose_several_random_flips<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    let number_of_flips = rng.gen_range(2..=7);
    let mut proposal = Flip::default();

    for _ in 0..number_of_flips {
        proposal.extend(propose_random_flip(partition, rng)?);
    }

    Ok(proposal)
}

/// Propose one boundary flip for every part that has a cut edge.
pub fn propose_flip_every_district<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    let by_part = cut_edges_by_part(partition)?;
    if by_part.is_empty() {
        return Err(Error::NoProposalAvailable);
    }

    let mut parts: Vec<_> = by_part.keys().copied().collect();
    parts.sort_unstable();

    let mut proposal = Flip::default();
    for part in parts {
        if let Some(&edge) = by_part[&part].iter().choose(rng) {
            let (node, target) = flip_endpoint(partition, edge, rng);
            proposal.insert(node, target);
        }
    }

    Ok(without_frozen(partition, proposal))
}

/// Pick a random boundary node and pull every neighbour in another part
/// into the node's part.
pub fn propose_chunk_flip<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    let (u, v) = choose_cut_edge(partition, rng)?;
    let flipped_node = if rng.gen_bool(0.5) { u } else { v };

    let assignment = partition.assignment();
    let target = assignment.get(flipped_node);

    let proposal = partition
        .graph()
        .neighbors(flipped_node)
        .filter(|&neighbor| assignment.get(neighbor) != target)
        .map(|neighbor| (neighbor, target))
        .collect();

    Ok(without_frozen(partition, proposal))
}

/// Pick a random part and, for each of its cut edges, flip a fair coin; on
/// heads one random endpoint of the edge joins the other's part.
pub fn propose_flip_every_edge_of_district<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    let by_part = cut_edges_by_part(partition)?;

    let mut parts: Vec<_> = by_part.keys().copied().collect();
    parts.sort_unstable();
    let part = *parts.choose(rng).ok_or(Error::NoProposalAvailable)?;

    let mut edges: Vec<_> = by_part[&part].iter().copied().collect();
    edges.sort_unstable();

    let mut proposal = Flip::default();
    for edge in edges {
        if rng.gen_bool(0.5) {
            let (node, target) = flip_endpoint(partition, edge, rng);
            proposal.insert(node, target);
        }
    }

    Ok(without_frozen(partition, proposal))
}

/// Single random flip nine times out of ten, chunk flip otherwise.
pub fn propose_single_or_chunk<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
) -> Result<Flip, Error> {
    if rng.gen_bool(SINGLE_FLIP_PROBABILITY) {
        propose_random_flip(partition, rng)
    } else {
        propose_chunk_flip(partition, rng)
    }
}

/// Self-loop correction for chains that skip a separate accept/reject pass.
///
/// A proposal is kept with probability `cut edges / max_cut_edges` and
/// replaced by an empty flip otherwise, which keeps the proposal kernel
/// normalized while the number of cut edges varies from state to state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfLoopCorrection {
    /// Upper bound on the number of cut edges of any state the chain visits.
    pub max_cut_edges: usize,
}

impl SelfLoopCorrection {
    pub fn new(max_cut_edges: usize) -> Result<Self, Error> {
        if max_cut_edges == 0 {
            return Err(Error::Configuration("the cut-edge bound must be positive".to_string()));
        }
        Ok(Self { max_cut_edges })
    }

    /// The loosest bound: every edge of the graph cut.
    pub fn for_graph(graph: &Graph) -> Result<Self, Error> {
        Self::new(graph.num_edges())
    }

    /// Probability of keeping a proposal drawn from `partition`.
    pub fn keep_probability(&self, partition: &Partition) -> Result<f64, Error> {
        let cut_edges = partition.cut_edges()?.len();
        Ok((cut_edges as f64 / self.max_cut_edges as f64).min(1.0))
    }

    /// Keep `flip` or turn it into a self loop.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        partition: &Partition,
        flip: Flip,
        rng: &mut R,
    ) -> Result<Flip, Error> {
        let keep = self.keep_probability(partition)?;
        if rng.gen::<f64>() < 1.0 - keep {
            return Ok(Flip::default());
        }
        Ok(flip)
    }
}

/// [`propose_random_flip`] followed by a [`SelfLoopCorrection`].
pub fn propose_random_flip_with_self_loops<R: Rng + ?Sized>(
    partition: &Partition,
    correction: &SelfLoopCorrection,
    rng: &mut R,
) -> Result<Flip, Error> {
    let flip = propose_random_flip(partition, rng)?;
    correction.apply(partition, flip, rng)
}

/// The built-in generators, for choosing one at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Single,
    Several,
    EveryDistrict,
    Chunk,
    EveryEdgeOfDistrict,
    SingleOrChunk,
}

impl ProposalKind {
    pub fn propose<R: Rng + ?Sized>(
        &self,
        partition: &Partition,
        rng: &mut R,
    ) -> Result<Flip, Error> {
        match self {
            ProposalKind::Single => propose_random_flip(partition, rng),
            ProposalKind::Several => propose_several_random_flips(partition, rng),
            ProposalKind::EveryDistrict => propose_flip_every_district(partition, rng),
            ProposalKind::Chunk => propose_chunk_flip(partition, rng),
            ProposalKind::EveryEdgeOfDistrict => {
                propose_flip_every_edge_of_district(partition, rng)
            }
            ProposalKind::SingleOrChunk => propose_single_or_chunk(partition, rng),
        }
    }
}
