use super::ScoredProduct;
use crate::config::RecommendationConfig;
use crate::models::{CandidateScore, ProductFeature};
use crate::utils::compare_ranked;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.6,
            content: 0.4,
        }
    }
}

impl HybridWeights {
    pub fn blend(&self, collaborative: Option<f64>, content: Option<f64>) -> f64 {
        self.collaborative * collaborative.unwrap_or(0.0) + self.content * content.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct HybridCombiner {
    weights: HybridWeights,
    candidate_multiplier: usize,
}

impl HybridCombiner {
    pub fn new(weights: HybridWeights, candidate_multiplier: usize) -> Self {
        Self {
            weights,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }

    pub fn from_config(config: &RecommendationConfig) -> Self {
        Self::new(
            HybridWeights {
                collaborative: config.collaborative_weight,
                content: config.content_weight,
            },
            config.candidate_multiplier,
        )
    }

    /// Candidates kept for a request of `count`.
    pub fn candidate_limit(&self, count: usize) -> usize {
        count.saturating_mul(self.candidate_multiplier)
    }

    /// Blends the union of both lists, attaching product details from
    /// `catalog`. Ids missing from the catalog are dropped. Output is sorted
    /// by blended score and truncated to `candidate_limit(count)`.
    pub fn combine(
        &self,
        collaborative: &[ScoredProduct],
        content: &[ScoredProduct],
        catalog: &HashMap<Uuid, ProductFeature>,
        count: usize,
    ) -> Vec<CandidateScore> {
        let collaborative: HashMap<Uuid, f64> = collaborative.iter().copied().collect();
        let content: HashMap<Uuid, f64> = content.iter().copied().collect();
        let union: BTreeSet<Uuid> = collaborative.keys().chain(content.keys()).copied().collect();

        let mut candidates: Vec<CandidateScore> = union
            .into_iter()
            .filter_map(|product_id| {
                let product = catalog.get(&product_id)?;
                let collaborative_score = collaborative.get(&product_id).copied();
                let content_score = content.get(&product_id).copied();
                Some(CandidateScore {
                    product: product.clone(),
                    collaborative_score,
                    content_score,
                    blended_score: self.weights.blend(collaborative_score, content_score),
                })
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates.truncate(self.candidate_limit(count));
        candidates
    }
}

pub fn sort_candidates(candidates: &mut [CandidateScore]) {
    candidates.sort_by(|a, b| {
        compare_ranked(
            (a.product.product_id, a.blended_score),
            (b.product.product_id, b.blended_score),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn catalog(ids: &[u128]) -> HashMap<Uuid, ProductFeature> {
        ids.iter()
            .map(|&n| (id(n), ProductFeature::new(id(n), format!("Product {n}"), "General")))
            .collect()
    }

    #[test]
    fn test_blend_uses_zero_for_missing_side() {
        let combiner = HybridCombiner::new(HybridWeights::default(), 2);
        let candidates = combiner.combine(
            &[(id(1), 1.0), (id(2), 0.5)],
            &[(id(2), 1.0), (id(3), 2.0)],
            &catalog(&[1, 2, 3]),
            10,
        );

        let by_id: HashMap<Uuid, &CandidateScore> =
            candidates.iter().map(|c| (c.product.product_id, c)).collect();
        assert!((by_id[&id(1)].blended_score - 0.6).abs() < 1e-12);
        assert!((by_id[&id(2)].blended_score - 0.7).abs() < 1e-12);
        assert!((by_id[&id(3)].blended_score - 0.8).abs() < 1e-12);
        assert_eq!(by_id[&id(1)].content_score, None);
        assert_eq!(by_id[&id(3)].collaborative_score, None);
        assert_eq!(candidates[0].product.product_id, id(3));
    }

    #[test]
    fn test_truncates_to_twice_count_and_drops_unknown() {
        let combiner = HybridCombiner::new(HybridWeights::default(), 2);
        let collaborative: Vec<ScoredProduct> = (1..=10).map(|n| (id(n), n as f64)).collect();
        let catalog = catalog(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let candidates = combiner.combine(&collaborative, &[(id(99), 5.0)], &catalog, 2);

        assert_eq!(candidates.len(), 4);
        assert!(candidates.iter().all(|c| c.product.product_id != id(99)));
        assert_eq!(candidates[0].product.product_id, id(10));
    }

    #[test]
    fn test_ties_ordered_by_product_id() {
        let combiner = HybridCombiner::new(HybridWeights { collaborative: 1.0, content: 1.0 }, 2);
        let candidates = combiner.combine(&[(id(7), 1.0)], &[(id(3), 1.0)], &catalog(&[3, 7]), 5);
        let order: Vec<Uuid> = candidates.iter().map(|c| c.product.product_id).collect();
        assert_eq!(order, vec![id(3), id(7)]);
    }
}
