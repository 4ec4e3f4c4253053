use crate::models::{Recommendation, RecommendationType};
use crate::utils::round2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Click, purchase and conversion rates over a set of persisted recommendations.
/// Rates are percentages rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPerformance {
    pub total_recommendations: u64,
    pub click_rate: f64,
    pub purchase_rate: f64,
    pub conversion_rate: f64,
    pub type_performance: HashMap<RecommendationType, TypePerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypePerformance {
    pub count: u64,
    pub clicks: u64,
    pub purchases: u64,
}

#[derive(Debug, Default)]
pub struct PerformanceCalculator {
    total: u64,
    clicks: u64,
    purchases: u64,
    by_type: HashMap<RecommendationType, TypePerformance>,
}

impl PerformanceCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, recommendation: &Recommendation) {
        self.total += 1;
        let entry = self.by_type.entry(recommendation.recommendation_type).or_default();
        entry.count += 1;

        if recommendation.was_clicked {
            self.clicks += 1;
            entry.clicks += 1;
        }
        if recommendation.was_purchased {
            self.purchases += 1;
            entry.purchases += 1;
        }
    }

    pub fn calculate(&self) -> RecommendationPerformance {
        RecommendationPerformance {
            total_recommendations: self.total,
            click_rate: percentage(self.clicks, self.total),
            purchase_rate: percentage(self.purchases, self.total),
            conversion_rate: percentage(self.purchases, self.clicks),
            type_performance: self.by_type.clone(),
        }
    }

    pub fn from_recommendations<'a>(
        recommendations: impl IntoIterator<Item = &'a Recommendation>,
    ) -> RecommendationPerformance {
        let mut calculator = Self::new();
        for recommendation in recommendations {
            calculator.record(recommendation);
        }
        calculator.calculate()
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}
