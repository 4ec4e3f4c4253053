pub mod memory;

pub use memory::InMemoryStore;

use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn list_interactions(&self, since: DateTime<Utc>) -> RepositoryResult<Vec<Interaction>>;
    async fn purchased_product_ids(
        &self,
        retailer_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<HashSet<Uuid>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_active_products(&self) -> RepositoryResult<Vec<ProductFeature>>;
    async fn get(&self, product_id: Uuid) -> RepositoryResult<Option<ProductFeature>>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn get_preferences(&self, retailer_id: Uuid) -> RepositoryResult<RetailerPreferences>;
}

#[async_trait]
pub trait RetailerRepository: Send + Sync {
    async fn get_retailer(&self, retailer_id: Uuid) -> RepositoryResult<Option<Retailer>>;
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn save_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> RepositoryResult<()>;
    async fn get_recommendation(&self, id: Uuid) -> RepositoryResult<Option<Recommendation>>;
    async fn list_recommendations(
        &self,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Recommendation>>;
    /// Appends `event` and, when `flag` is given and the event names an
    /// existing recommendation, flips that flag. Both writes commit together
    /// or not at all. Returns whether a flag was flipped.
    async fn record_feedback(
        &self,
        event: &FeedbackEvent,
        flag: Option<OutcomeFlag>,
    ) -> RepositoryResult<bool>;
}

/// The repositories a recommendation service reads from and writes to.
#[derive(Clone)]
pub struct Repositories {
    pub purchases: Arc<dyn PurchaseRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub retailers: Arc<dyn RetailerRepository>,
    pub recommendations: Arc<dyn RecommendationStore>,
}

impl Repositories {
    /// Every repository backed by the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            purchases: store.clone(),
            products: store.clone(),
            preferences: store.clone(),
            retailers: store.clone(),
            recommendations: store,
        }
    }
}
