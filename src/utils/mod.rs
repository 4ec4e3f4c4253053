use std::cmp::Ordering;
use uuid::Uuid;

pub mod dataset;
pub mod metrics;
pub mod validation;

/// Descending by score, ascending by product id on ties. NaN sorts last.
pub fn compare_ranked(a: (Uuid, f64), b: (Uuid, f64)) -> Ordering {
    match (a.1.is_nan(), b.1.is_nan()) {
        (true, true) => a.0.cmp(&b.0),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .1
            .partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0)),
    }
}

pub fn rank_scores(scores: &mut [(Uuid, f64)]) {
    scores.sort_by(|a, b| compare_ranked(*a, *b));
}

/// Sorts and keeps the best `k` entries.
pub fn top_k(mut scores: Vec<(Uuid, f64)>, k: usize) -> Vec<(Uuid, f64)> {
    rank_scores(&mut scores);
    scores.truncate(k);
    scores
}

pub fn l2_normalize(vector: &mut [f64]) {
    let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_rank_breaks_ties_by_product_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let other = Uuid::from_u128(3);
        let nan = Uuid::from_u128(4);
        let ranked = top_k(vec![(high, 0.5), (other, 0.9), (low, 0.5), (nan, f64::NAN)], 3);
        assert_eq!(ranked, vec![(other, 0.9), (low, 0.5), (high, 0.5)]);
    }
}
