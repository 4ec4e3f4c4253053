use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MAX_WINDOW_DAYS: i64 = 3650;
const MAX_RETRAIN_HOURS: i64 = 8760;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub recommendation: RecommendationConfig,
    pub business_rules: BusinessRulesConfig,
    pub training: TrainingConfig,
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub collaborative_weight: f64,
    pub content_weight: f64,
    /// Candidates kept after blending, as a multiple of the requested count.
    pub candidate_multiplier: usize,
    pub recency_window_days: i64,
    pub default_count: usize,
    pub max_count: usize,
    pub algorithm_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRulesConfig {
    pub category_boost: f64,
    pub brand_boost: f64,
    pub preference_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub interaction_window_days: i64,
    pub max_rank: usize,
    pub retrain_interval_hours: i64,
    pub vocabulary_size: usize,
    pub worker_threads: usize,
    pub svd_max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub score_step: f64,
    pub store_type_categories: HashMap<String, String>,
}

impl RecommendationConfig {
    pub fn clamp_count(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_count.max(1))
    }

    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.recency_window_days)
    }
}

impl TrainingConfig {
    pub fn interaction_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.interaction_window_days)
    }

    pub fn retrain_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retrain_interval_hours)
    }
}

fn default_store_type_categories() -> HashMap<String, String> {
    [
        ("Grocery Store", "Food & Beverages"),
        ("Electronics Store", "Electronics"),
        ("Clothing Store", "Clothing & Apparel"),
        ("Home Improvement", "Home & Garden"),
        ("Health Store", "Health & Beauty"),
    ]
    .into_iter()
    .map(|(store, category)| (store.to_string(), category.to_string()))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recommendation: RecommendationConfig {
                collaborative_weight: 0.6,
                content_weight: 0.4,
                candidate_multiplier: 2,
                recency_window_days: 30,
                default_count: 10,
                max_count: 50,
                algorithm_version: "v1.0".to_string(),
            },
            business_rules: BusinessRulesConfig {
                category_boost: 0.20,
                brand_boost: 0.15,
                preference_scale: 5.0,
            },
            training: TrainingConfig {
                interaction_window_days: 180,
                max_rank: 50,
                retrain_interval_hours: 24,
                vocabulary_size: 1000,
                worker_threads: num_cpus::get(),
                svd_max_iterations: 1000,
            },
            fallback: FallbackConfig {
                score_step: 0.1,
                store_type_categories: default_store_type_categories(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("RETAILREC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let rec = &self.recommendation;
        if rec.collaborative_weight < 0.0 || rec.content_weight < 0.0 {
            anyhow::bail!("blend weights must be non-negative");
        }
        if rec.candidate_multiplier == 0 {
            anyhow::bail!("candidate_multiplier must be at least 1");
        }
        if rec.max_count == 0 {
            anyhow::bail!("max_count must be at least 1");
        }
        if self.training.vocabulary_size == 0 {
            anyhow::bail!("vocabulary_size must be at least 1");
        }
        if self.business_rules.preference_scale <= 0.0 {
            anyhow::bail!("preference_scale must be positive");
        }
        if !(0.0..=1.0).contains(&self.fallback.score_step) {
            anyhow::bail!("score_step must be between 0 and 1");
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&rec.recency_window_days) {
            anyhow::bail!("recency_window_days must be between 0 and {}", MAX_WINDOW_DAYS);
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.training.interaction_window_days) {
            anyhow::bail!("interaction_window_days must be between 1 and {}", MAX_WINDOW_DAYS);
        }
        if !(1..=MAX_RETRAIN_HOURS).contains(&self.training.retrain_interval_hours) {
            anyhow::bail!("retrain_interval_hours must be between 1 and {}", MAX_RETRAIN_HOURS);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recommendation.collaborative_weight, 0.6);
        assert_eq!(config.recommendation.content_weight, 0.4);
        assert_eq!(
            config.fallback.store_type_categories.get("Electronics Store").map(String::as_str),
            Some("Electronics")
        );
    }

    #[test]
    fn test_clamp_count() {
        let config = Config::default();
        assert_eq!(config.recommendation.clamp_count(0), 1);
        assert_eq!(config.recommendation.clamp_count(7), 7);
        assert_eq!(config.recommendation.clamp_count(500), 50);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = Config::default();
        config.recommendation.content_weight = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_score_step_must_be_a_fraction() {
        let mut config = Config::default();
        for step in [-0.1, 1.5, f64::NAN] {
            config.fallback.score_step = step;
            assert!(config.validate().is_err(), "accepted score_step {step}");
        }
        config.fallback.score_step = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_time_windows_are_bounded() {
        let cases: [fn(&mut Config); 5] = [
            |c| c.recommendation.recency_window_days = -1,
            |c| c.recommendation.recency_window_days = i64::MAX,
            |c| c.training.interaction_window_days = 0,
            |c| c.training.interaction_window_days = 1_000_000_000,
            |c| c.training.retrain_interval_hours = i64::MAX,
        ];
        for set in cases {
            let mut config = Config::default();
            set(&mut config);
            assert!(config.validate().is_err());
        }

        let mut config = Config::default();
        config.recommendation.recency_window_days = 0;
        config.training.retrain_interval_hours = 1;
        assert!(config.validate().is_ok());
    }
}
