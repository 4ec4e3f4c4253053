use super::*;
use crate::utils::validation::validate_product;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{info, warn};

/// Recommendations and feedback share one lock so a feedback write and its
/// flag flip are observed together.
#[derive(Debug, Default)]
struct Ledger {
    recommendations: HashMap<Uuid, Recommendation>,
    feedback: Vec<FeedbackEvent>,
}

/// Process-local implementation of every repository trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    products: DashMap<Uuid, ProductFeature>,
    retailers: DashMap<Uuid, Retailer>,
    preferences: DashMap<Uuid, RetailerPreferences>,
    purchases: RwLock<Vec<Interaction>>,
    ledger: Mutex<Ledger>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: ProductFeature) {
        if let Err(e) = validate_product(&product) {
            warn!("Storing product {} with invalid fields: {}", product.product_id, e);
        }
        self.products.insert(product.product_id, product);
    }

    pub fn insert_products(&self, products: impl IntoIterator<Item = ProductFeature>) {
        let mut count = 0;
        for product in products {
            self.insert_product(product);
            count += 1;
        }
        info!("Inserted {} products", count);
    }

    pub fn insert_retailer(&self, retailer: Retailer) {
        self.retailers.insert(retailer.retailer_id, retailer);
    }

    pub fn set_preferences(&self, retailer_id: Uuid, preferences: RetailerPreferences) {
        self.preferences.insert(retailer_id, preferences);
    }

    pub fn record_purchase(&self, interaction: Interaction) {
        self.purchases.write().push(interaction);
    }

    pub fn record_purchases(&self, interactions: impl IntoIterator<Item = Interaction>) {
        self.purchases.write().extend(interactions);
    }

    pub fn purchase_count(&self) -> usize {
        self.purchases.read().len()
    }

    pub fn feedback_events(&self) -> Vec<FeedbackEvent> {
        self.ledger.lock().feedback.clone()
    }

    pub fn recommendations_for(&self, retailer_id: Uuid) -> Vec<Recommendation> {
        let ledger = self.ledger.lock();
        let mut recommendations: Vec<Recommendation> = ledger
            .recommendations
            .values()
            .filter(|r| r.retailer_id == retailer_id)
            .cloned()
            .collect();
        recommendations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        recommendations
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryStore {
    async fn list_interactions(&self, since: DateTime<Utc>) -> RepositoryResult<Vec<Interaction>> {
        Ok(self
            .purchases
            .read()
            .iter()
            .filter(|i| i.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn purchased_product_ids(
        &self,
        retailer_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<HashSet<Uuid>> {
        Ok(self
            .purchases
            .read()
            .iter()
            .filter(|i| i.retailer_id == retailer_id && i.timestamp >= since)
            .map(|i| i.product_id)
            .collect())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list_active_products(&self) -> RepositoryResult<Vec<ProductFeature>> {
        let mut products: Vec<ProductFeature> = self
            .products
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by_key(|p| p.product_id);
        Ok(products)
    }

    async fn get(&self, product_id: Uuid) -> RepositoryResult<Option<ProductFeature>> {
        Ok(self.products.get(&product_id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryStore {
    async fn get_preferences(&self, retailer_id: Uuid) -> RepositoryResult<RetailerPreferences> {
        Ok(self
            .preferences
            .get(&retailer_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RetailerRepository for InMemoryStore {
    async fn get_retailer(&self, retailer_id: Uuid) -> RepositoryResult<Option<Retailer>> {
        Ok(self.retailers.get(&retailer_id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn save_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> RepositoryResult<()> {
        let mut ledger = self.ledger.lock();
        for recommendation in recommendations {
            ledger
                .recommendations
                .insert(recommendation.id, recommendation.clone());
        }
        Ok(())
    }

    async fn get_recommendation(&self, id: Uuid) -> RepositoryResult<Option<Recommendation>> {
        Ok(self.ledger.lock().recommendations.get(&id).cloned())
    }

    async fn list_recommendations(
        &self,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Recommendation>> {
        Ok(self
            .ledger
            .lock()
            .recommendations
            .values()
            .filter(|r| r.created_at >= since)
            .cloned()
            .collect())
    }

    async fn record_feedback(
        &self,
        event: &FeedbackEvent,
        flag: Option<OutcomeFlag>,
    ) -> RepositoryResult<bool> {
        let mut ledger = self.ledger.lock();
        let flipped = match (event.recommendation_id, flag) {
            (Some(id), Some(flag)) => match ledger.recommendations.get_mut(&id) {
                Some(recommendation) => {
                    recommendation.apply(flag);
                    true
                }
                None => false,
            },
            _ => false,
        };
        ledger.feedback.push(event.clone());
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_purchases_filtered_by_window() {
        let store = InMemoryStore::new();
        let retailer = Uuid::new_v4();
        let recent = Uuid::new_v4();
        let old = Uuid::new_v4();
        store.record_purchase(Interaction::new(retailer, recent, 1, 10.0));
        let ninety_days_ago = Utc::now() - Duration::days(90);
        store.record_purchase(Interaction::new(retailer, old, 1, 10.0).at(ninety_days_ago));

        let since = Utc::now() - Duration::days(30);
        let ids = tokio_test::block_on(store.purchased_product_ids(retailer, since)).unwrap();
        assert!(ids.contains(&recent));
        assert!(!ids.contains(&old));

        let since = Utc::now() - Duration::days(180);
        let all = tokio_test::block_on(store.list_interactions(since)).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_inactive_products_not_listed() {
        let store = InMemoryStore::new();
        store.insert_product(ProductFeature::new(Uuid::new_v4(), "Kept", "General"));
        store.insert_product(ProductFeature::new(Uuid::new_v4(), "Retired", "General").inactive());

        let active = tokio_test::block_on(store.list_active_products()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Kept");
    }

    #[test]
    fn test_missing_preferences_are_empty() {
        let store = InMemoryStore::new();
        let prefs = tokio_test::block_on(store.get_preferences(Uuid::new_v4())).unwrap();
        assert!(prefs.is_empty());
    }
}
