use crate::models::*;
use crate::services::recommendation::RecommendationService;
use crate::services::repository::{RepositoryResult, RecommendationStore};
use crate::services::training::ModelState;
use crate::utils::metrics::{PerformanceCalculator, RecommendationPerformance};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub model_state: ModelState,
    pub snapshot_version: Option<u64>,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub next_retrain_due: Option<DateTime<Utc>>,
}

/// Request accounting around [`RecommendationService::generate`].
pub struct ServingService {
    recommendation_service: Arc<RecommendationService>,
    store: Arc<dyn RecommendationStore>,
    serving_stats: DashMap<&'static str, u64>,
}

impl ServingService {
    pub fn new(
        recommendation_service: Arc<RecommendationService>,
        store: Arc<dyn RecommendationStore>,
    ) -> Self {
        Self {
            recommendation_service,
            store,
            serving_stats: DashMap::new(),
        }
    }

    pub async fn serve_recommendations(
        &self,
        retailer_id: Uuid,
        count: usize,
    ) -> Vec<RecommendedProduct> {
        self.increment_stat("total_requests");
        let start_time = std::time::Instant::now();

        let recommendations = self.recommendation_service.generate(retailer_id, count).await;

        let latency = start_time.elapsed().as_millis() as u64;
        self.update_latency_stat(latency);

        match recommendations.first().map(|r| r.recommendation.recommendation_type) {
            Some(RecommendationType::Hybrid) => self.increment_stat("hybrid_responses"),
            Some(RecommendationType::Fallback) => self.increment_stat("fallback_responses"),
            None => self.increment_stat("empty_responses"),
        }

        info!(
            "Served {} recommendations for retailer {} in {}ms",
            recommendations.len(),
            retailer_id,
            latency
        );
        recommendations
    }

    pub fn serving_stats(&self) -> HashMap<String, u64> {
        self.serving_stats
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect()
    }

    pub fn health_check(&self) -> HealthReport {
        let training = self.recommendation_service.training();
        let snapshot = training.snapshot();
        let last_trained_at = snapshot.as_ref().map(|s| s.trained_at);
        HealthReport {
            model_state: training.state(),
            snapshot_version: snapshot.as_ref().map(|s| s.version),
            last_trained_at,
            next_retrain_due: training.scheduler().next_due(last_trained_at),
        }
    }

    /// Click, purchase and conversion rates over recommendations created in
    /// the last `days` days.
    pub async fn performance(&self, days: i64) -> RepositoryResult<RecommendationPerformance> {
        let since = Utc::now() - Duration::days(days);
        let recommendations = self.store.list_recommendations(since).await?;
        Ok(PerformanceCalculator::from_recommendations(&recommendations))
    }

    fn increment_stat(&self, key: &'static str) {
        *self.serving_stats.entry(key).or_insert(0) += 1;
    }

    fn update_latency_stat(&self, latency_ms: u64) {
        let request_count = self
            .serving_stats
            .get("total_requests")
            .map(|v| *v)
            .unwrap_or(1)
            .max(1);
        let current_avg = self.serving_stats.get("avg_latency_ms").map(|v| *v).unwrap_or(0);

        let new_avg = (current_avg * (request_count - 1) + latency_ms) / request_count;
        self.serving_stats.insert("avg_latency_ms", new_avg);

        let current_max = self.serving_stats.get("max_latency_ms").map(|v| *v).unwrap_or(0);
        if latency_ms > current_max {
            self.serving_stats.insert("max_latency_ms", latency_ms);
        }
    }
}
