//! Nearest-mean-distance matching of a query embedding against stored
//! identities.
//!
//! Distances are mean-of-distances over every stored sample, not the distance
//! to a centroid. Thresholding rounds the winning distance to two decimals
//! before the strict `<` comparison, so `0.596` is treated as `0.60`.

use super::types::{Classification, Embedding, Match};
use tracing::warn;

/// Euclidean distance between two embeddings.
///
/// Extra trailing components of the longer vector are ignored and the
/// mismatch is logged, since it means the oracle changed dimension.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        warn!(
            "Comparing embeddings of different lengths ({} vs {})",
            a.len(),
            b.len()
        );
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Arithmetic mean of the distances from `query` to each descriptor.
///
/// An empty descriptor list yields `0.0`.
pub fn mean_distance(descriptors: &[Embedding], query: &[f32]) -> f64 {
    let total: f64 = descriptors
        .iter()
        .map(|d| euclidean_distance(d, query))
        .sum();
    total / descriptors.len().max(1) as f64
}

/// Round a distance to two decimal digits
pub fn round_distance(distance: f64) -> f64 {
    (distance * 100.0).round() / 100.0
}

/// Identity with the smallest mean distance to `query`.
///
/// Identities are visited in the order given; on an exact tie the first one
/// wins.
pub fn best_match<'a, I>(query: &[f32], identities: I) -> Option<Match>
where
    I: IntoIterator<Item = (&'a str, &'a [Embedding])>,
{
    let mut best: Option<(&'a str, f64)> = None;

    for (name, descriptors) in identities {
        let distance = mean_distance(descriptors, query);
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((name, distance)),
        }
    }

    best.map(|(name, distance)| Match {
        identity_name: name.to_string(),
        distance,
    })
}

/// Classify `query` against `identities` with a strict rounded threshold
pub fn classify<'a, I>(query: &[f32], identities: I, threshold: f64) -> Classification
where
    I: IntoIterator<Item = (&'a str, &'a [Embedding])>,
{
    match best_match(query, identities) {
        Some(found) => {
            let rounded = round_distance(found.distance);
            if rounded < threshold {
                Classification::Known {
                    name: found.identity_name,
                    distance: rounded,
                }
            } else {
                Classification::Unknown
            }
        }
        None => Classification::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery(entries: &[(&str, Vec<Embedding>)]) -> Vec<(String, Vec<Embedding>)> {
        entries
            .iter()
            .map(|(name, descriptors)| (name.to_string(), descriptors.clone()))
            .collect()
    }

    fn view(gallery: &[(String, Vec<Embedding>)]) -> impl Iterator<Item = (&str, &[Embedding])> {
        gallery.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_compare_common_prefix() {
        assert_eq!(euclidean_distance(&[0.0, 0.0, 9.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[3.0], &[0.0, 7.0]), 3.0);
    }

    #[test]
    fn test_mean_distance_is_mean_of_distances() {
        // Centroid of the two samples is the query itself, so a
        // distance-to-centroid implementation would return 0.
        let descriptors = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        assert!((mean_distance(&descriptors, &[0.0, 0.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_distance_of_empty_list() {
        assert_eq!(mean_distance(&[], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_best_match_scenario() {
        let g = gallery(&[
            ("alice", vec![vec![1.0, 0.0], vec![1.0, 0.0]]),
            ("bob", vec![vec![0.0, 1.0]]),
        ]);
        let query = [0.9, 0.1];

        let alice = mean_distance(&g[0].1, &query);
        let bob = mean_distance(&g[1].1, &query);
        assert!((alice - 0.1414).abs() < 1e-3);
        assert!((bob - 1.2728).abs() < 1e-3);

        let found = best_match(&query, view(&g)).unwrap();
        assert_eq!(found.identity_name, "alice");
        assert!((found.distance - alice).abs() < 1e-12);
    }

    #[test]
    fn test_best_match_tie_goes_to_first_inserted() {
        let g = gallery(&[
            ("first", vec![vec![1.0, 0.0]]),
            ("second", vec![vec![-1.0, 0.0]]),
        ]);
        let found = best_match(&[0.0, 0.0], view(&g)).unwrap();
        assert_eq!(found.identity_name, "first");

        let reversed = gallery(&[
            ("second", vec![vec![-1.0, 0.0]]),
            ("first", vec![vec![1.0, 0.0]]),
        ]);
        let found = best_match(&[0.0, 0.0], view(&reversed)).unwrap();
        assert_eq!(found.identity_name, "second");
    }

    #[test]
    fn test_best_match_of_empty_set() {
        let g = gallery(&[]);
        assert_eq!(best_match(&[0.0], view(&g)), None);
        assert_eq!(classify(&[0.0], view(&g), 0.6), Classification::Unknown);
    }

    #[test]
    fn test_round_distance() {
        assert_eq!(round_distance(0.1414), 0.14);
        assert_eq!(round_distance(0.596), 0.6);
        assert_eq!(round_distance(0.594), 0.59);
    }

    #[test]
    fn test_classify_rounds_before_strict_compare() {
        // 0.596 rounds to 0.60, which is not strictly below 0.6
        let g = gallery(&[("alice", vec![vec![0.0, 0.0]])]);
        assert_eq!(
            classify(&[0.596, 0.0], view(&g), 0.6),
            Classification::Unknown
        );

        assert_eq!(
            classify(&[0.594, 0.0], view(&g), 0.6),
            Classification::Known {
                name: "alice".to_string(),
                distance: 0.59
            }
        );
    }

    #[test]
    fn test_classify_exact_threshold_is_unknown() {
        let g = gallery(&[("alice", vec![vec![0.0, 0.0]])]);
        assert!(!classify(&[0.6, 0.0], view(&g), 0.6).is_known());
    }
}
