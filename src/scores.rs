//! Partisan scores of an election held over a partition.
//!
//! A positive score means the plan favours the first party of the election.

use crate::errors::Error;
use crate::updaters::ElectionResults;

/// Votes of each party that did not help elect anyone in one part.
///
/// The winner wastes every vote past half of the votes cast, the loser
/// wastes all of theirs. On a tie the second party counts as the winner.
pub fn wasted_votes(party1_votes: f64, party2_votes: f64) -> (f64, f64) {
    let total = party1_votes + party2_votes;
    if party1_votes > party2_votes {
        (party1_votes - total / 2.0, party2_votes)
    } else {
        (party1_votes, party2_votes - total / 2.0)
    }
}

/// Difference in wasted votes between the second and the first party,
/// relative to every vote cast. Defined for two-party elections only.
pub fn efficiency_gap(results: &ElectionResults) -> Result<f64, Error> {
    let [party1, party2] = results.parties() else {
        return Err(Error::Score(format!(
            "the efficiency gap needs exactly two parties, found {}",
            results.parties().len()
        )));
    };
    let total_votes = results.total_votes();
    if total_votes == 0.0 {
        return Err(Error::Score("no votes were cast".to_string()));
    }

    let (votes1, votes2) = (results.counts(party1)?, results.counts(party2)?);
    let gap: f64 = results
        .parts()
        .into_iter()
        .map(|part| {
            let (wasted1, wasted2) = wasted_votes(votes1.as_f64(part), votes2.as_f64(part));
            wasted2 - wasted1
        })
        .sum();

    Ok(gap / total_votes)
}

/// Median minus mean of the first party's vote share across parts.
pub fn mean_median(results: &ElectionResults) -> Result<f64, Error> {
    let shares = first_party_shares(results)?;
    let middle = shares.len() / 2;
    let median = if shares.len() % 2 == 0 {
        (shares[middle - 1] + shares[middle]) / 2.0
    } else {
        shares[middle]
    };

    Ok(median - mean(&shares))
}

/// Like [`mean_median`], with the share one third of the way up the sorted
/// list in place of the median.
pub fn mean_thirdian(results: &ElectionResults) -> Result<f64, Error> {
    let shares = first_party_shares(results)?;
    let third = (shares.len() as f64 / 3.0).round() as usize;
    let thirdian = shares[third.min(shares.len() - 1)];

    Ok(thirdian - mean(&shares))
}

// Sorted, never empty.
fn first_party_shares(results: &ElectionResults) -> Result<Vec<f64>, Error> {
    let party = results
        .parties()
        .first()
        .ok_or_else(|| Error::Score("the election has no party".to_string()))?;
    let mut shares = results.percents(party)?;
    if shares.is_empty() {
        return Err(Error::Score("no votes were cast".to_string()));
    }
    shares.sort_unstable_by(f64::total_cmp);
    Ok(shares)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
