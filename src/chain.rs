use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use crate::assignment::{Flip, PartId};
use crate::errors::Error;
use crate::graph::NodeId;
use crate::partition::Partition;
use crate::validity::Validator;

type Proposal = Box<dyn FnMut(&Partition, &mut SmallRng) -> Result<Flip, Error> + Send>;
type Acceptance = Box<dyn FnMut(&Partition, &mut SmallRng) -> bool + Send>;

/// Append-only record of the flips a chain adopted.
///
/// Only accepted, non-empty flips are recorded, each next to the index of the
/// step that produced it. Rejected proposals and self loops leave no trace.
#[derive(Debug, Clone, Default)]
pub struct FlipLog {
    entries: Vec<(usize, Flip)>,
}

impl FlipLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: usize, flip: Flip) {
        self.entries.push((step, flip));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, Flip)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, Flip)> {
        self.entries.iter()
    }

    /// Every `(step, node, part)` move in order of step, then node.
    pub fn moves(&self) -> impl Iterator<Item = (usize, NodeId, PartId)> + '_ {
        self.entries.iter().flat_map(|(step, flip)| {
            let mut moves: Vec<(NodeId, PartId)> =
                flip.iter().map(|(&node, &part)| (node, part)).collect();
            moves.sort_unstable();
            moves.into_iter().map(move |(node, part)| (*step, node, part))
        })
    }
}

/// A Markov chain over partitions.
///
/// Iterating yields the initial partition and then one partition per step,
/// `total_steps` states in all. A step that is rejected, or whose proposal
/// is empty, yields the current partition again. An error is yielded once
/// and ends the chain.
pub struct MarkovChain {
    proposal: Proposal,
    validator: Validator,
    accept: Acceptance,
    state: Partition,
    rng: SmallRng,
    total_steps: usize,
    counter: usize,
    finished: bool,
    flips: FlipLog,
    accepted: usize,
}

impl MarkovChain {
    /// Fails when the initial partition does not satisfy `validator`.
    pub fn new<P, A>(
        proposal: P,
        validator: Validator,
        accept: A,
        initial: Partition,
        total_steps: usize,
    ) -> Result<Self, Error>
    where
        P: FnMut(&Partition, &mut SmallRng) -> Result<Flip, Error> + Send + 'static,
        A: FnMut(&Partition, &mut SmallRng) -> bool + Send + 'static,
    {
        if !validator.is_valid(&initial)? {
            return Err(Error::Configuration("the initial partition is not valid".to_string()));
        }

        Ok(Self {
            proposal: Box::new(proposal),
            validator,
            accept: Box::new(accept),
            state: initial,
            rng: SmallRng::from_entropy(),
            total_steps,
            counter: 0,
            finished: false,
            flips: FlipLog::new(),
            accepted: 0,
        })
    }

    /// Reseed the chain's random source for a reproducible run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &Partition {
        &self.state
    }

    pub fn flip_log(&self) -> &FlipLog {
        &self.flips
    }

    pub fn accepted_moves(&self) -> usize {
        self.accepted
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn step(&mut self) -> Result<(), Error> {
        let flip = (self.proposal)(&self.state, &mut self.rng)?;
        if flip.is_empty() {
            debug!(step = self.counter, "self loop");
            return Ok(());
        }

        let proposed = self.state.transition(&flip)?;
        if !self.validator.is_valid(&proposed)? {
            debug!(step = self.counter, "proposal rejected as invalid");
            return Ok(());
        }
        if !(self.accept)(&proposed, &mut self.rng) {
            debug!(step = self.counter, "proposal not accepted");
            return Ok(());
        }

        self.flips.push(self.counter, flip);
        self.accepted += 1;
        self.state = proposed;
        Ok(())
    }
}

impl Iterator for MarkovChain {
    type Item = Result<Partition, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.counter >= self.total_steps {
            self.finished = true;
            info!(
                steps = self.total_steps,
                accepted = self.accepted,
                "chain finished"
            );
            return None;
        }

        if self.counter > 0 {
            if let Err(error) = self.step() {
                self.finished = true;
                match error {
                    Error::NoProposalAvailable => {
                        warn!(step = self.counter, "no proposal available, stopping chain")
                    }
                    _ => warn!(step = self.counter, %error, "chain stopped"),
                }
                return Some(Err(error));
            }
        }

        self.counter += 1;
        Some(Ok(self.state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use itertools::Itertools;
    use super::*;
    use crate::assignment::Assignment;
    use crate::graph::{Column, Graph};
    use crate::proposals::propose_random_flip;
    use crate::updaters::UpdaterRegistry;
    use crate::validity::{always_accept, no_vanishing_districts, Constraint};

    // 4x4 grid, split into a left and a right half.
    fn grid() -> Partition {
        let mut edges = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                let v = row * 4 + col;
                if col < 3 {
                    edges.push((v, v + 1));
                }
                if row < 3 {
                    edges.push((v, v + 4));
                }
            }
        }
        let mut graph = Graph::from_edges(16, &edges).unwrap();
        graph.add_attribute("population", Column::Int(vec![1; 16])).unwrap();
        let updaters = UpdaterRegistry::new()
            .with_cut_edges()
            .unwrap()
            .with_tally("population", None)
            .unwrap();
        let assignment = Assignment::new((0..16).map(|v| usize::from(v % 4 >= 2)).collect());
        Partition::new(Arc::new(graph), assignment, Arc::new(updaters)).unwrap()
    }

    fn validator() -> Validator {
        Validator::new(vec![no_vanishing_districts("population")])
    }

    #[test]
    fn test_chain_yields_every_step() {
        // Arrange
        let chain = MarkovChain::new(propose_random_flip, validator(), always_accept, grid(), 50)
            .unwrap()
            .with_seed(7);

        // Act
        let states: Vec<Partition> = chain.map(|state| state.unwrap()).collect();

        // Assert
        assert_eq!(states.len(), 50);
        assert_eq!(states[0].assignment(), grid().assignment());
        for state in &states {
            state.verify().unwrap();
        }
    }

    #[test]
    fn test_flip_log_records_accepted_moves() {
        // Arrange
        let mut chain =
            MarkovChain::new(propose_random_flip, validator(), always_accept, grid(), 40)
                .unwrap()
                .with_seed(11);

        // Act
        let last = chain.by_ref().last().unwrap().unwrap();

        // Assert
        let log = chain.flip_log();
        assert_eq!(log.len(), chain.accepted_moves());
        assert!(log.iter().map(|(step, _)| *step).tuple_windows().all(|(a, b)| a < b));
        assert!(log.iter().all(|(step, flip)| *step > 0 && !flip.is_empty()));

        let mut replayed = grid().assignment().clone();
        for (_, flip) in log.iter() {
            replayed = replayed.apply(flip).unwrap();
        }
        assert_eq!(&replayed, last.assignment());
    }

    #[test]
    fn test_rejected_steps_repeat_the_state() {
        // Arrange
        let reject = |_: &Partition, _: &mut SmallRng| false;
        let chain = MarkovChain::new(propose_random_flip, validator(), reject, grid(), 10)
            .unwrap()
            .with_seed(3);

        // Act
        let states: Vec<Partition> = chain.map(|state| state.unwrap()).collect();

        // Assert
        assert_eq!(states.len(), 10);
        assert!(states.iter().all(|state| state.assignment() == grid().assignment()));
    }

    #[test]
    fn test_same_seed_same_run() {
        // Arrange
        let run = |seed| {
            let mut chain =
                MarkovChain::new(propose_random_flip, validator(), always_accept, grid(), 30)
                    .unwrap()
                    .with_seed(seed);
            chain.by_ref().for_each(drop);
            chain.flip_log().moves().collect_vec()
        };

        // Act and Assert
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_no_proposal_ends_the_chain() {
        // Arrange
        let partition = grid();
        let single_part = Partition::new(
            partition.graph_handle(),
            Assignment::new(vec![0; 16]),
            partition.updaters().clone(),
        )
        .unwrap();
        let validator = Validator::default();
        let mut chain =
            MarkovChain::new(propose_random_flip, validator, always_accept, single_part, 10)
                .unwrap();

        // Act
        let first = chain.next().unwrap();
        let second = chain.next().unwrap();

        // Assert
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::NoProposalAvailable)));
        assert!(chain.next().is_none());
    }

    #[test]
    fn test_invalid_initial_partition_is_refused() {
        // Arrange
        let never: Constraint = Box::new(|_: &Partition| Ok(false));

        // Act
        let validator = Validator::new(vec![never]);
        let chain = MarkovChain::new(propose_random_flip, validator, always_accept, grid(), 5);

        // Assert
        assert!(matches!(chain, Err(Error::Configuration(_))));
    }
}
