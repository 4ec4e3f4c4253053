use super::hybrid::sort_candidates;
use crate::config::BusinessRulesConfig;
use crate::models::{CandidateScore, RetailerPreferences};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Drops candidates the retailer bought within a trailing window.
#[derive(Debug, Clone, Copy)]
pub struct RecencyFilter {
    window: Duration,
}

impl RecencyFilter {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn apply(
        &self,
        candidates: Vec<CandidateScore>,
        recent: &HashSet<Uuid>,
    ) -> Vec<CandidateScore> {
        candidates
            .into_iter()
            .filter(|candidate| !recent.contains(&candidate.product.product_id))
            .collect()
    }
}

/// Category and brand preference boosts.
///
/// A preference `p` on the 0..=scale range multiplies the score by
/// `1 + (p / scale) * boost`; category is applied before brand.
#[derive(Debug, Clone, Copy)]
pub struct BusinessRules {
    category_boost: f64,
    brand_boost: f64,
    preference_scale: f64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            category_boost: 0.20,
            brand_boost: 0.15,
            preference_scale: 5.0,
        }
    }
}

impl BusinessRules {
    pub fn from_config(config: &BusinessRulesConfig) -> Self {
        Self {
            category_boost: config.category_boost,
            brand_boost: config.brand_boost,
            preference_scale: config.preference_scale,
        }
    }

    fn factor(&self, preference: Option<f64>, boost: f64) -> f64 {
        match preference {
            Some(weight) if weight.is_finite() => {
                let normalized = (weight / self.preference_scale).clamp(0.0, 1.0);
                1.0 + normalized * boost
            }
            _ => 1.0,
        }
    }

    pub fn category_factor(
        &self,
        candidate: &CandidateScore,
        preferences: &RetailerPreferences,
    ) -> f64 {
        let weight = preferences.category_weights.get(&candidate.product.category).copied();
        self.factor(weight, self.category_boost)
    }

    pub fn brand_factor(
        &self,
        candidate: &CandidateScore,
        preferences: &RetailerPreferences,
    ) -> f64 {
        let weight = candidate
            .product
            .brand
            .as_ref()
            .and_then(|brand| preferences.brand_weights.get(brand))
            .copied();
        self.factor(weight, self.brand_boost)
    }

    /// Rescales, re-sorts and keeps the best `count` candidates.
    pub fn apply(
        &self,
        mut candidates: Vec<CandidateScore>,
        preferences: &RetailerPreferences,
        count: usize,
    ) -> Vec<CandidateScore> {
        if !preferences.is_empty() {
            for candidate in candidates.iter_mut() {
                candidate.blended_score *= self.category_factor(candidate, preferences);
                candidate.blended_score *= self.brand_factor(candidate, preferences);
            }
        }

        sort_candidates(&mut candidates);
        candidates.truncate(count);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductFeature;

    fn candidate(n: u128, category: &str, brand: Option<&str>, score: f64) -> CandidateScore {
        let mut product = ProductFeature::new(Uuid::from_u128(n), format!("Product {n}"), category);
        product.brand = brand.map(str::to_string);
        CandidateScore {
            product,
            collaborative_score: Some(score),
            content_score: None,
            blended_score: score,
        }
    }

    #[test]
    fn test_boost_factors_are_bounded() {
        let rules = BusinessRules::default();
        let c = candidate(1, "Electronics", Some("Acme"), 1.0);
        for weight in [-3.0, 0.0, 2.5, 5.0, 9.0] {
            let prefs = RetailerPreferences::default()
                .with_category("Electronics", weight)
                .with_brand("Acme", weight);
            let category = rules.category_factor(&c, &prefs);
            let brand = rules.brand_factor(&c, &prefs);
            assert!((1.0..=1.20 + 1e-12).contains(&category));
            assert!((1.0..=1.15 + 1e-12).contains(&brand));
            assert!(category * brand <= 1.38 + 1e-12);
        }
    }

    #[test]
    fn test_boosts_compound_and_reorder() {
        let rules = BusinessRules::default();
        let prefs = RetailerPreferences::default()
            .with_category("Electronics", 5.0)
            .with_brand("Acme", 5.0);
        let candidates = vec![
            candidate(1, "Food & Beverages", None, 1.2),
            candidate(2, "Electronics", Some("Acme"), 1.0),
        ];

        let ranked = rules.apply(candidates, &prefs, 10);
        assert_eq!(ranked[0].product.product_id, Uuid::from_u128(2));
        assert!((ranked[0].blended_score - 1.38).abs() < 1e-12);
        assert!((ranked[1].blended_score - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_truncates_to_count() {
        let rules = BusinessRules::default();
        let candidates = (1..=5).map(|n| candidate(n, "General", None, n as f64)).collect();
        let ranked = rules.apply(candidates, &RetailerPreferences::default(), 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product.product_id, Uuid::from_u128(5));
    }

    #[test]
    fn test_recency_filter_removes_recent_purchases() {
        let filter = RecencyFilter::new(Duration::days(30));
        let recent: HashSet<Uuid> = [Uuid::from_u128(2)].into_iter().collect();
        let kept = filter.apply(
            vec![candidate(1, "General", None, 1.0), candidate(2, "General", None, 2.0)],
            &recent,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].product.product_id, Uuid::from_u128(1));
    }
}
