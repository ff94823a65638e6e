use crate::assignment::{Assignment, Flip, PartId};
use crate::errors::Error;
use crate::graph::Graph;
use crate::partition::Partition;
use crate::updaters::tally::{flows_from_changes, tallies_agree, tally_column, update_tally, Tally};
use crate::updaters::{wrong_kind, Field};
use crate::Updater;

/// Vote counts of several parties in every part.
///
/// Each party's votes come from the node attribute named after the party.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectionResults {
    parties: Vec<String>,
    counts: Vec<Tally>,
}

impl ElectionResults {
    /// `counts[i]` holds the votes of `parties[i]`.
    pub fn new(parties: Vec<String>, counts: Vec<Tally>) -> Result<Self, Error> {
        if parties.len() != counts.len() {
            return Err(Error::Configuration(format!(
                "{} parties but {} vote tallies",
                parties.len(),
                counts.len()
            )));
        }
        Ok(Self { parties, counts })
    }

    pub fn parties(&self) -> &[String] {
        &self.parties
    }

    /// Votes of `party` per part.
    pub fn counts(&self, party: &str) -> Result<&Tally, Error> {
        self.parties
            .iter()
            .position(|name| name == party)
            .map(|index| &self.counts[index])
            .ok_or_else(|| Error::UnknownField(party.to_string()))
    }

    /// Every part any party has a vote entry for, sorted.
    pub fn parts(&self) -> Vec<PartId> {
        let mut parts: Vec<_> = self.counts.iter().flat_map(|tally| tally.parts()).collect();
        parts.sort_unstable();
        parts.dedup();
        parts
    }

    /// Votes cast in `part`, all parties together.
    pub fn votes_in(&self, part: PartId) -> f64 {
        self.counts.iter().map(|tally| tally.as_f64(part)).sum()
    }

    pub fn total_votes(&self) -> f64 {
        self.counts.iter().map(|tally| tally.total().as_f64()).sum()
    }

    /// Share of the votes in `part` going to `party`; zero when nobody voted.
    pub fn percent(&self, party: &str, part: PartId) -> Result<f64, Error> {
        let votes = self.counts(party)?.as_f64(part);
        let cast = self.votes_in(part);
        Ok(if cast == 0.0 { 0.0 } else { votes / cast })
    }

    /// Vote share of `party` in every part where votes were cast, by part.
    pub fn percents(&self, party: &str) -> Result<Vec<f64>, Error> {
        self.parts()
            .into_iter()
            .filter(|&part| self.votes_in(part) != 0.0)
            .map(|part| self.percent(party, part))
            .collect()
    }

    /// Whether `party` has strictly more votes in `part` than any other.
    pub fn won(&self, party: &str, part: PartId) -> Result<bool, Error> {
        let votes = self.counts(party)?.as_f64(part);
        Ok(self
            .parties
            .iter()
            .zip(&self.counts)
            .filter(|(name, _)| *name != party)
            .all(|(_, tally)| tally.as_f64(part) < votes))
    }

    /// Number of parts `party` won.
    pub fn seats(&self, party: &str) -> Result<usize, Error> {
        let mut seats = 0;
        for part in self.parts() {
            if self.won(party, part)? {
                seats += 1;
            }
        }
        Ok(seats)
    }
}

/// Tallies the votes of several parties at once.
///
/// The flip is grouped by part a single time and every party's tally is
/// moved with the same flows.
#[derive(Debug, Clone)]
pub struct ElectionUpdater {
    parties: Vec<String>,
}

impl ElectionUpdater {
    pub fn new(parties: &[&str]) -> Self {
        Self {
            parties: parties.iter().map(|party| party.to_string()).collect(),
        }
    }

    pub fn parties(&self) -> &[String] {
        &self.parties
    }
}

impl Updater for ElectionUpdater {
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
        let counts = self
            .parties
            .iter()
            .map(|party| Ok(tally_column(graph.column(party)?, assignment)))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Field::Election(ElectionResults::new(self.parties.clone(), counts)?))
    }

    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        _assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error> {
        let results = value.as_election().ok_or_else(|| wrong_kind("election", value))?;
        let flows = flows_from_changes(previous.assignment(), flip);

        let counts = self
            .parties
            .iter()
            .zip(&results.counts)
            .map(|(party, tally)| {
                let column = previous.graph().column(party)?;
                update_tally(tally, column, &flows)
                    .ok_or_else(|| wrong_kind("vote tally of the party's type", value))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Field::Election(ElectionResults::new(self.parties.clone(), counts)?))
    }

    fn required_attributes(&self) -> Vec<&str> {
        self.parties.iter().map(String::as_str).collect()
    }

    fn agrees(&self, cached: &Field, fresh: &Field) -> bool {
        match (cached.as_election(), fresh.as_election()) {
            (Some(a), Some(b)) => {
                a.parties == b.parties
                    && a.counts.len() == b.counts.len()
                    && a.counts.iter().zip(&b.counts).all(|(x, y)| tallies_agree(x, y))
            }
            _ => cached == fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use approx::assert_relative_eq;
    use super::*;
    use crate::graph::Column;
    use crate::updaters::UpdaterRegistry;

    // Two districts of two precincts each on a 4-cycle.
    fn precincts() -> Partition {
        let mut graph = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap();
        graph.add_attribute("D", Column::Int(vec![30, 10, 25, 5])).unwrap();
        graph.add_attribute("R", Column::Int(vec![10, 20, 15, 35])).unwrap();
        let updaters = UpdaterRegistry::new().with_election("votes", &["D", "R"]).unwrap();
        let assignment = Assignment::new(vec![0, 0, 1, 1]);
        Partition::new(Arc::new(graph), assignment, Arc::new(updaters)).unwrap()
    }

    #[test]
    fn test_election_from_scratch() {
        // Arrange and Act
        let partition = precincts();

        // Assert
        let results = partition.election("votes").unwrap();
        assert_eq!(results.parties(), ["D", "R"]);
        assert_eq!(results.counts("D").unwrap().as_f64(0), 40.0);
        assert_eq!(results.counts("R").unwrap().as_f64(1), 50.0);
        assert_eq!(results.parts(), vec![0, 1]);
        assert_eq!(results.total_votes(), 150.0);
        assert_relative_eq!(results.percent("D", 0).unwrap(), 40.0 / 70.0);
        assert!(results.won("D", 0).unwrap());
        assert!(results.won("R", 1).unwrap());
        assert_eq!(results.seats("D").unwrap(), 1);
    }

    #[test]
    fn test_election_follows_flips() {
        // Arrange
        let partition = precincts();
        let flip: Flip = [(3, 0)].into_iter().collect();

        // Act
        let next = partition.transition(&flip).unwrap();

        // Assert
        let results = next.election("votes").unwrap();
        assert_eq!(results.counts("D").unwrap().as_f64(0), 45.0);
        assert_eq!(results.counts("R").unwrap().as_f64(0), 65.0);
        assert_eq!(results.votes_in(1), 40.0);
        assert!(results.won("R", 0).unwrap());
        assert!(results.won("D", 1).unwrap());
        assert!(next.verify().is_ok());
        assert_eq!(partition.election("votes").unwrap().counts("D").unwrap().as_f64(0), 40.0);
    }

    #[test]
    fn test_percents_skip_parts_without_votes() {
        // Arrange
        let counts = vec![
            Tally::Int([(0, 3), (1, 0), (2, 1)].into_iter().collect()),
            Tally::Int([(0, 1), (1, 0), (2, 1)].into_iter().collect()),
        ];
        let results = ElectionResults::new(vec!["A".to_string(), "B".to_string()], counts).unwrap();

        // Act
        let percents = results.percents("A").unwrap();

        // Assert
        assert_eq!(percents, vec![0.75, 0.5]);
        assert_eq!(results.percent("A", 1).unwrap(), 0.0);
        assert!(!results.won("A", 2).unwrap());
        assert!(matches!(results.counts("C"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_missing_party_column_fails_at_setup() {
        // Arrange
        let graph = Graph::from_edges(2, &[(0, 1)]).unwrap();
        let updaters = UpdaterRegistry::new().with_election("votes", &["D"]).unwrap();

        // Act
        let assignment = Assignment::new(vec![0, 1]);
        let result = Partition::new(Arc::new(graph), assignment, Arc::new(updaters));

        // Assert
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
