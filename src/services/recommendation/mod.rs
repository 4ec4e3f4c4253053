use crate::algorithms::{
    BusinessRules, EmptyReason, FallbackGenerator, HybridCombiner, RecencyFilter, StageOutcome,
};
use crate::config::Config;
use crate::models::*;
use crate::services::repository::{RepositoryError, Repositories};
use crate::services::training::{TrainOutcome, TrainingService};
use crate::utils::validation::validate_feedback_request;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("invalid feedback: {0}")]
    InvalidValue(String),
    #[error("failed to store feedback: {0}")]
    Storage(#[from] RepositoryError),
}

/// Entry point for scoring, feedback and training. Scoring never fails; every
/// error path ends in the popularity fallback.
pub struct RecommendationService {
    repositories: Repositories,
    training: Arc<TrainingService>,
    config: Arc<Config>,
    combiner: HybridCombiner,
    recency: RecencyFilter,
    rules: BusinessRules,
    fallback: FallbackGenerator,
}

impl RecommendationService {
    pub fn new(repositories: Repositories, config: Arc<Config>) -> Self {
        let training = Arc::new(TrainingService::new(
            repositories.purchases.clone(),
            repositories.products.clone(),
            config.training.clone(),
        ));

        Self {
            combiner: HybridCombiner::from_config(&config.recommendation),
            recency: RecencyFilter::new(config.recommendation.recency_window()),
            rules: BusinessRules::from_config(&config.business_rules),
            fallback: FallbackGenerator::from_config(&config.fallback),
            repositories,
            training,
            config,
        }
    }

    pub fn training(&self) -> &Arc<TrainingService> {
        &self.training
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn train(&self) -> TrainOutcome {
        self.training.train().await
    }

    /// Up to `count` recommendations (clamped to `1..=max_count`), sorted by
    /// score descending with ties broken by product id.
    pub async fn generate(&self, retailer_id: Uuid, count: usize) -> Vec<RecommendedProduct> {
        let count = self.config.recommendation.clamp_count(count);
        let started = Instant::now();

        let retailer = match self.repositories.retailers.get_retailer(retailer_id).await {
            Ok(Some(retailer)) => Some(retailer),
            Ok(None) => {
                warn!("Retailer {} not found; serving fallback recommendations", retailer_id);
                None
            }
            Err(e) => {
                error!("Failed to resolve retailer {}: {}", retailer_id, e);
                None
            }
        };

        let Some(retailer) = retailer else {
            return self.fallback(retailer_id, None, count, false).await;
        };

        let recommendations = match self.hybrid_candidates(retailer_id, count).await {
            Ok(candidates) if !candidates.is_empty() => {
                self.persist_hybrid(retailer_id, candidates).await
            }
            Ok(_) => {
                info!("No model candidates for retailer {}; using fallback", retailer_id);
                self.fallback(retailer_id, retailer.store_type.as_deref(), count, true).await
            }
            Err(e) => {
                error!("Recommendation pipeline failed for retailer {}: {}", retailer_id, e);
                self.fallback(retailer_id, retailer.store_type.as_deref(), count, true).await
            }
        };

        debug!(
            "Generated {} recommendations for retailer {} in {}ms",
            recommendations.len(),
            retailer_id,
            started.elapsed().as_millis()
        );
        recommendations
    }

    async fn hybrid_candidates(
        &self,
        retailer_id: Uuid,
        count: usize,
    ) -> Result<Vec<CandidateScore>, RepositoryError> {
        if let Some(outcome) = self.training.ensure_fresh().await {
            if !outcome.is_trained() {
                warn!("Retraining did not produce a new snapshot: {:?}", outcome);
            }
        }
        let Some(snapshot) = self.training.snapshot() else {
            debug!("No model snapshot available for retailer {}", retailer_id);
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let repos = &self.repositories;
        let (history, recent, catalog, preferences) = futures::join!(
            repos.purchases.purchased_product_ids(retailer_id, DateTime::<Utc>::MIN_UTC),
            repos.purchases.purchased_product_ids(retailer_id, self.recency.since(now)),
            repos.products.list_active_products(),
            repos.preferences.get_preferences(retailer_id),
        );
        let recent = recent?;
        let catalog: HashMap<Uuid, ProductFeature> =
            catalog?.into_iter().map(|p| (p.product_id, p)).collect();

        let limit = self.combiner.candidate_limit(count);
        let collaborative = match snapshot.collaborative.as_ref() {
            Some(model) => model.score(retailer_id, limit),
            None => StageOutcome::Empty(EmptyReason::NoModel),
        };
        let content = match (snapshot.content.as_ref(), history) {
            (Some(model), Ok(history)) => model.score(&history, limit),
            (None, _) => StageOutcome::Empty(EmptyReason::NoModel),
            (_, Err(e)) => StageOutcome::Failed(e.to_string()),
        };
        log_stage("Collaborative", retailer_id, &collaborative);
        log_stage("Content", retailer_id, &content);

        let candidates = self.combiner.combine(
            &collaborative.into_scores(),
            &content.into_scores(),
            &catalog,
            count,
        );
        let candidates = self.recency.apply(candidates, &recent);

        let preferences = preferences.unwrap_or_else(|e| {
            warn!(
                "Failed to load preferences for retailer {}: {}; skipping boosts",
                retailer_id, e
            );
            RetailerPreferences::default()
        });
        Ok(self.rules.apply(candidates, &preferences, count))
    }

    async fn persist_hybrid(
        &self,
        retailer_id: Uuid,
        candidates: Vec<CandidateScore>,
    ) -> Vec<RecommendedProduct> {
        let now = Utc::now();
        let results: Vec<RecommendedProduct> = candidates
            .into_iter()
            .map(|candidate| RecommendedProduct {
                recommendation: self.recommendation(
                    retailer_id,
                    candidate.product.product_id,
                    candidate.blended_score,
                    RecommendationType::Hybrid,
                    candidate.context(),
                    now,
                ),
                product: candidate.product,
            })
            .collect();
        self.persist(&results).await;
        results
    }

    async fn fallback(
        &self,
        retailer_id: Uuid,
        store_type: Option<&str>,
        count: usize,
        persist: bool,
    ) -> Vec<RecommendedProduct> {
        info!("Serving fallback recommendations for retailer {}", retailer_id);
        let now = Utc::now();
        let repos = &self.repositories;
        let (products, recent) = futures::join!(
            repos.products.list_active_products(),
            repos.purchases.purchased_product_ids(retailer_id, self.recency.since(now)),
        );
        let products = match products {
            Ok(products) => products,
            Err(e) => {
                error!("Error getting fallback recommendations: {}", e);
                return Vec::new();
            }
        };
        let recent = recent.unwrap_or_else(|e| {
            warn!("Failed to load recent purchases for retailer {}: {}", retailer_id, e);
            HashSet::new()
        });

        let results: Vec<RecommendedProduct> = self
            .fallback
            .generate(&products, store_type, &recent, count)
            .into_iter()
            .map(|(product, score)| RecommendedProduct {
                recommendation: self.recommendation(
                    retailer_id,
                    product.product_id,
                    score,
                    RecommendationType::Fallback,
                    RecommendationContext::default(),
                    now,
                ),
                product,
            })
            .collect();

        if persist {
            self.persist(&results).await;
        }
        results
    }

    fn recommendation(
        &self,
        retailer_id: Uuid,
        product_id: Uuid,
        score: f64,
        recommendation_type: RecommendationType,
        context: RecommendationContext,
        created_at: DateTime<Utc>,
    ) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            retailer_id,
            product_id,
            score,
            recommendation_type,
            algorithm_version: self.config.recommendation.algorithm_version.clone(),
            created_at,
            context,
            was_clicked: false,
            was_purchased: false,
        }
    }

    async fn persist(&self, results: &[RecommendedProduct]) {
        if results.is_empty() {
            return;
        }
        let records: Vec<Recommendation> =
            results.iter().map(|r| r.recommendation.clone()).collect();
        if let Err(e) = self.repositories.recommendations.save_recommendations(&records).await {
            error!("Failed to save {} recommendations: {}", records.len(), e);
        }
    }

    /// Appends a feedback event and flips the matching outcome flag on the
    /// referenced recommendation, as one write.
    pub async fn record_feedback(
        &self,
        request: FeedbackRequest,
    ) -> Result<FeedbackEvent, FeedbackError> {
        validate_feedback_request(&request)
            .map_err(|e| FeedbackError::InvalidValue(e.to_string()))?;

        let event = FeedbackEvent {
            id: Uuid::new_v4(),
            retailer_id: request.retailer_id,
            product_id: request.product_id,
            recommendation_id: request.recommendation_id,
            feedback_type: request.feedback_type,
            value: request.value,
            created_at: Utc::now(),
            context: serde_json::json!({ "source": "api" }),
        };

        let flag = event
            .recommendation_id
            .and(request.feedback_type.outcome_flag());
        let flipped = self
            .repositories
            .recommendations
            .record_feedback(&event, flag)
            .await?;

        if flag.is_some() && !flipped {
            debug!(
                "Feedback references unknown recommendation {:?}; event stored without flag update",
                event.recommendation_id
            );
        }
        info!(
            "Recorded feedback: {} for product {} by retailer {}",
            event.feedback_type, event.product_id, event.retailer_id
        );
        Ok(event)
    }
}

fn log_stage(stage: &str, retailer_id: Uuid, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Scored(scores) => {
            debug!("{} stage scored {} products for retailer {}", stage, scores.len(), retailer_id)
        }
        StageOutcome::Empty(reason) => {
            debug!("{} stage empty for retailer {}: {}", stage, retailer_id, reason)
        }
        StageOutcome::Failed(message) => {
            warn!("{} scoring failed for retailer {}: {}", stage, retailer_id, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::repository::InMemoryStore;

    fn service() -> (Arc<InMemoryStore>, RecommendationService) {
        let store = Arc::new(InMemoryStore::new());
        let mut config = Config::default();
        config.training.worker_threads = 1;
        let service =
            RecommendationService::new(Repositories::in_memory(store.clone()), Arc::new(config));
        (store, service)
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let (store, service) = service();
        let retailer = Uuid::new_v4();
        store.insert_retailer(Retailer::new(retailer, "Corner Shop"));
        for n in 0..60 {
            store.insert_product(
                ProductFeature::new(Uuid::new_v4(), format!("Item {n}"), "General")
                    .with_popularity(n as f64 / 12.0),
            );
        }

        assert_eq!(service.generate(retailer, 0).await.len(), 1);
        assert_eq!(service.generate(retailer, 500).await.len(), 50);
    }

    #[tokio::test]
    async fn test_invalid_feedback_value_writes_nothing() {
        let (store, service) = service();
        let request = FeedbackRequest::new(Uuid::new_v4(), Uuid::new_v4(), FeedbackType::Like)
            .with_value(7.5);

        let result = service.record_feedback(request).await;
        assert!(matches!(result, Err(FeedbackError::InvalidValue(_))));
        assert!(store.feedback_events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_recommendation_still_records_event() {
        let (store, service) = service();
        let request = FeedbackRequest::new(Uuid::new_v4(), Uuid::new_v4(), FeedbackType::Click)
            .for_recommendation(Uuid::new_v4());

        let event = service.record_feedback(request).await.unwrap();
        assert_eq!(event.context["source"], "api");
        assert_eq!(store.feedback_events().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_retailer_gets_unpersisted_fallback() {
        let (store, service) = service();
        store.insert_product(
            ProductFeature::new(Uuid::new_v4(), "Tea", "Food & Beverages").with_popularity(4.0),
        );
        let retailer = Uuid::new_v4();

        let recs = service.generate(retailer, 5).await;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].recommendation.recommendation_type, RecommendationType::Fallback);
        assert_eq!(recs[0].recommendation.score, 1.0);
        assert!(store.recommendations_for(retailer).is_empty());
    }
}
