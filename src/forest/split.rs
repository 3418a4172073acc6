use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices of the train and test partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows so every class keeps its share in both partitions.
///
/// Each class contributes `round(n * test_ratio)` rows to the test partition, but
/// always keeps at least one row for training.
pub fn stratified_split(targets: &[usize], test_ratio: f64, seed: u64) -> Split {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &class) in targets.iter().enumerate() {
        by_class.entry(class).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(targets.len());
    let mut test = Vec::new();
    for (_, mut rows) in by_class {
        rows.shuffle(&mut rng);
        let n = rows.len();
        let n_test = ((n as f64 * test_ratio).round() as usize).min(n.saturating_sub(1));
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Split { train, test }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_class_proportions() {
        let targets: Vec<usize> = std::iter::repeat(0).take(50).chain(std::iter::repeat(1).take(10)).collect();
        let split = stratified_split(&targets, 0.2, 42);
        let test_zero = split.test.iter().filter(|&&i| targets[i] == 0).count();
        let test_one = split.test.iter().filter(|&&i| targets[i] == 1).count();
        assert_eq!(test_zero, 10);
        assert_eq!(test_one, 2);
        assert_eq!(split.train.len(), 48);
    }

    #[test]
    fn is_reproducible_and_disjoint() {
        let targets: Vec<usize> = (0..40).map(|i| i % 3).collect();
        let a = stratified_split(&targets, 0.25, 7);
        let b = stratified_split(&targets, 0.25, 7);
        assert_eq!(a, b);
        assert!(a.train.iter().all(|i| !a.test.contains(i)));
        assert_eq!(a.train.len() + a.test.len(), 40);
    }

    #[test]
    fn singleton_class_stays_in_training() {
        let split = stratified_split(&[0, 0, 0, 0, 0, 1], 0.2, 1);
        assert!(split.train.contains(&5));
        assert!(!split.test.contains(&5));
    }
}
