use crate::models::*;
use crate::services::repository::InMemoryStore;
use crate::utils::validation::validate_interaction;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

const STORE_TYPES: &[(&str, &str)] = &[
    ("Grocery Store", "Food & Beverages"),
    ("Electronics Store", "Electronics"),
    ("Clothing Store", "Clothing & Apparel"),
    ("Home Improvement", "Home & Garden"),
    ("Health Store", "Health & Beauty"),
];

const BRANDS: &[&str] = &["Acme", "Northwind", "Contoso", "Globex", "Initech", "Umbrella"];

const DESCRIPTORS: &[&str] = &[
    "organic", "premium", "wireless", "cotton", "stainless", "compact", "natural", "durable",
    "portable", "classic", "herbal", "smart",
];

/// A full set of repository contents, loadable from JSON or generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub retailers: Vec<Retailer>,
    pub products: Vec<ProductFeature>,
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub preferences: HashMap<Uuid, RetailerPreferences>,
}

impl Dataset {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        let dataset: Dataset = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse dataset {}", path.display()))?;
        Ok(dataset)
    }

    /// Ids, catalog and baskets depend only on `seed`; purchase timestamps
    /// are spread over the last 170 days.
    pub fn synthetic(retailer_count: usize, product_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Utc::now();

        let products: Vec<ProductFeature> = (0..product_count)
            .map(|i| {
                let (_, category) = STORE_TYPES[rng.gen_range(0..STORE_TYPES.len())];
                let brand = BRANDS[rng.gen_range(0..BRANDS.len())];
                let descriptor = DESCRIPTORS[rng.gen_range(0..DESCRIPTORS.len())];
                ProductFeature::new(
                    Uuid::from_u128(rng.gen()),
                    format!("{descriptor} item {i}"),
                    category,
                )
                .with_brand(brand)
                .with_description(format!("{descriptor} {} from {brand}", category.to_lowercase()))
                .with_price(rng.gen_range(1.0..200.0))
                .with_popularity(rng.gen_range(0.0..5.0))
            })
            .collect();

        let retailers: Vec<Retailer> = (0..retailer_count)
            .map(|i| {
                let (store_type, _) = STORE_TYPES[rng.gen_range(0..STORE_TYPES.len())];
                Retailer::new(Uuid::from_u128(rng.gen()), format!("Retailer {i}"))
                    .with_store_type(store_type)
            })
            .collect();

        let mut interactions = Vec::new();
        let mut preferences = HashMap::new();
        for retailer in &retailers {
            let basket = rng.gen_range(1..=product_count.clamp(1, 12));
            for product in products.choose_multiple(&mut rng, basket) {
                let quantity = rng.gen_range(1..=20);
                let amount = product.price * quantity as f64;
                let age = Duration::days(rng.gen_range(0..170));
                interactions.push(
                    Interaction::new(retailer.retailer_id, product.product_id, quantity, amount)
                        .at(now - age),
                );
            }

            if rng.gen_bool(0.5) {
                let (_, category) = STORE_TYPES[rng.gen_range(0..STORE_TYPES.len())];
                let brand = BRANDS[rng.gen_range(0..BRANDS.len())];
                preferences.insert(
                    retailer.retailer_id,
                    RetailerPreferences::default()
                        .with_category(category, rng.gen_range(0.0..=5.0))
                        .with_brand(brand, rng.gen_range(0.0..=5.0)),
                );
            }
        }

        Self {
            retailers,
            products,
            interactions,
            preferences,
        }
    }

    /// Copies everything into `store`, dropping interactions that fail validation.
    pub fn load_into(self, store: &InMemoryStore) {
        let total = self.interactions.len();
        let valid: Vec<Interaction> = self
            .interactions
            .into_iter()
            .filter(|interaction| match validate_interaction(interaction) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping interaction for retailer {}: {}", interaction.retailer_id, e);
                    false
                }
            })
            .collect();
        info!(
            "Loading {} retailers, {} products, {}/{} interactions",
            self.retailers.len(),
            self.products.len(),
            valid.len(),
            total
        );

        for retailer in self.retailers {
            store.insert_retailer(retailer);
        }
        store.insert_products(self.products);
        store.record_purchases(valid);
        for (retailer_id, preferences) in self.preferences {
            store.set_preferences(retailer_id, preferences);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_is_seeded() {
        let a = Dataset::synthetic(5, 20, 7);
        let b = Dataset::synthetic(5, 20, 7);
        assert_eq!(a.products.len(), 20);
        assert_eq!(a.retailers.len(), 5);
        let ids_a: Vec<Uuid> = a.products.iter().map(|p| p.product_id).collect();
        let ids_b: Vec<Uuid> = b.products.iter().map(|p| p.product_id).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.interactions.len(), b.interactions.len());
    }

    #[test]
    fn test_load_drops_invalid_interactions() {
        let mut dataset = Dataset::synthetic(2, 4, 1);
        let product = dataset.products[0].product_id;
        dataset
            .interactions
            .push(Interaction::new(dataset.retailers[0].retailer_id, product, 0, 5.0));
        let expected = dataset.interactions.len() - 1;

        let store = InMemoryStore::new();
        dataset.load_into(&store);
        assert_eq!(store.purchase_count(), expected);
    }
}
