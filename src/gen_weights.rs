use rand::Rng;
use crate::errors::Error;
use crate::graph::Column;

/// Attribute column where every node carries weight one.
pub fn gen_uniform_weights(no_of_vertices: usize) -> Column {
    Column::Int(vec![1; no_of_vertices])
}

/// Attribute column of random integer weights drawn from `min_weight..=max_weight`.
pub fn gen_random_weights<R: Rng + ?Sized>(
    no_of_vertices: usize,
    min_weight: i64,
    max_weight: i64,
    rng: &mut R,
) -> Result<Column, Error> {
    if max_weight < min_weight {
        return Err(Error::Configuration("max weight must not be below min weight".to_string()));
    }
    if min_weight < 0 {
        return Err(Error::Configuration("weights must be non-negative".to_string()));
    }

    let random_weights: Vec<i64> = (0..no_of_vertices)
        .map(|_| rng.gen_range(min_weight..=max_weight))
        .collect();

    Ok(Column::Int(random_weights))
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use crate::errors::Error;
    use crate::gen_weights::{gen_random_weights, gen_uniform_weights};
    use crate::graph::{Column, Value};

    #[test]
    fn test_uniform_weights() {
        // Arrange and Act
        let weights = gen_uniform_weights(4);

        // Assert
        assert_eq!(weights.len(), 4);
        assert_eq!(weights.get(3), Some(Value::Int(1)));
    }

    #[test]
    fn test_random_weights_in_range() {
        // Arrange
        let mut rng = SmallRng::seed_from_u64(42);

        // Act
        let weights = gen_random_weights(100, 3, 9, &mut rng).unwrap();

        // Assert
        match weights {
            Column::Int(values) => assert!(values.iter().all(|value| (3..=9).contains(value))),
            Column::Float(_) => panic!("expected integer weights"),
        }
    }

    #[test]
    fn test_random_weights_bad_range() {
        // Arrange
        let mut rng = SmallRng::seed_from_u64(42);

        // Act and Assert
        assert!(matches!(gen_random_weights(5, 9, 3, &mut rng), Err(Error::Configuration(_))));
        assert!(matches!(gen_random_weights(5, -1, 3, &mut rng), Err(Error::Configuration(_))));
    }
}
