use crate::config::FallbackConfig;
use crate::models::ProductFeature;
use crate::utils::compare_ranked;
use crate::utils::validation::sanitize_popularity;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Popularity ranking used when the model pipeline yields nothing.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    score_step: f64,
    store_type_categories: HashMap<String, String>,
}

impl FallbackGenerator {
    /// Store types are matched case-insensitively.
    pub fn new(score_step: f64, store_type_categories: HashMap<String, String>) -> Self {
        Self {
            score_step,
            store_type_categories: store_type_categories
                .into_iter()
                .map(|(store, category)| (store.to_lowercase(), category))
                .collect(),
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(config.score_step, config.store_type_categories.clone())
    }

    pub fn category_for(&self, store_type: Option<&str>) -> Option<&str> {
        store_type
            .and_then(|store| self.store_type_categories.get(&store.to_lowercase()))
            .map(String::as_str)
    }

    /// `1.0 - step * rank`, floored at zero.
    pub fn synthetic_score(&self, rank: usize) -> f64 {
        (1.0 - self.score_step * rank as f64).max(0.0)
    }

    /// Active products by popularity, limited to the store type's category
    /// when one is mapped and has products, with `excluded` ids removed.
    pub fn generate(
        &self,
        products: &[ProductFeature],
        store_type: Option<&str>,
        excluded: &HashSet<Uuid>,
        count: usize,
    ) -> Vec<(ProductFeature, f64)> {
        let eligible: Vec<&ProductFeature> = products
            .iter()
            .filter(|p| p.is_active && !excluded.contains(&p.product_id))
            .collect();

        let pool: Vec<&ProductFeature> = match self.category_for(store_type) {
            Some(category) => {
                let in_category: Vec<&ProductFeature> =
                    eligible.iter().copied().filter(|p| p.category == category).collect();
                if in_category.is_empty() {
                    eligible
                } else {
                    in_category
                }
            }
            None => eligible,
        };

        let mut ranked = pool;
        ranked.sort_by(|a, b| {
            compare_ranked(
                (a.product_id, sanitize_popularity(a.popularity_score)),
                (b.product_id, sanitize_popularity(b.popularity_score)),
            )
        });
        ranked.dedup_by_key(|p| p.product_id);

        let mut scored: Vec<(ProductFeature, f64)> = ranked
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(rank, product)| (product.clone(), self.synthetic_score(rank)))
            .collect();
        // Ranks past the floor share a score of zero; order those by id.
        scored.sort_by(|(a, x), (b, y)| compare_ranked((a.product_id, *x), (b.product_id, *y)));
        scored
    }
}
