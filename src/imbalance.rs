// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe (See NOTICE.md)
use num_traits::ToPrimitive;
use crate::updaters::Tally;

/// The load every part would carry if `total` were split evenly.
pub fn ideal_part_load(total: f64, num_parts: usize) -> f64 {
    total / num_parts.to_f64().unwrap_or(1.0).max(1.0)
}

/// Largest relative overload of any part with respect to `ideal`.
///
/// Underloaded parts do not contribute, so a perfectly balanced partition
/// scores zero.
pub fn compute_imbalance_from_part_loads(part_loads: &[f64], ideal: f64) -> f64 {
    if ideal == 0.0 {
        return 0.0;
    }

    part_loads
        .iter()
        .map(|part_load| (part_load - ideal) / ideal)
        .fold(0.0f64, |acc, dev| acc.max(dev))
}

/// Largest relative deviation, in either direction, of any part from `ideal`.
pub fn max_relative_deviation(part_loads: &[f64], ideal: f64) -> f64 {
    if ideal == 0.0 {
        return 0.0;
    }

    part_loads
        .iter()
        .map(|part_load| ((part_load - ideal) / ideal).abs())
        .fold(0.0f64, |acc, dev| acc.max(dev))
}

/// Compute the imbalance of the parts of a tally.
pub fn imbalance(tally: &Tally) -> f64 {
    if tally.is_empty() {
        return 0.0;
    }

    let part_loads: Vec<f64> = tally.loads().into_iter().map(|(_, load)| load).collect();
    let ideal = ideal_part_load(tally.total().as_f64(), part_loads.len());

    compute_imbalance_from_part_loads(&part_loads, ideal)
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use itertools::assert_equal;
    use crate::imbalance::{compute_imbalance_from_part_loads, imbalance, max_relative_deviation};
    use crate::updaters::Tally;

    #[test]
    fn test_tally_loads() {
        // Arrange
        let tally = Tally::Int([(1, 7), (0, 11)].into_iter().collect());

        // Act
        let loads = tally.loads();

        // Assert
        assert_equal(loads, [(0usize, 11.0), (1, 7.0)]);
    }

    #[test]
    fn test_imbalance() {
        // Arrange
        let tally = Tally::Int([(0, 6), (1, 4)].into_iter().collect());

        // Act
        let imb = imbalance(&tally);

        // Assert
        assert_ulps_eq!(imb, 0.2);
    }

    #[test]
    fn test_deviation_counts_underloaded_parts() {
        // Arrange
        let part_loads = [5.0, 3.0, 4.0];

        // Act
        let overload = compute_imbalance_from_part_loads(&part_loads, 4.0);
        let deviation = max_relative_deviation(&part_loads, 4.0);

        // Assert
        assert_ulps_eq!(overload, 0.25);
        assert_ulps_eq!(deviation, 0.25);
        assert_ulps_eq!(max_relative_deviation(&[2.0, 6.0], 5.0), 0.6);
    }

    #[test]
    fn test_zero_ideal() {
        // Arrange and Act
        let imb = compute_imbalance_from_part_loads(&[0.0, 0.0], 0.0);

        // Assert
        assert_ulps_eq!(imb, 0.0);
    }
}
