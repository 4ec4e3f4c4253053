use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One purchase row as delivered by the purchase repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub retailer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub total_amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFeature {
    pub product_id: Uuid,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub popularity_score: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retailer {
    pub retailer_id: Uuid,
    pub name: String,
    pub store_type: Option<String>,
}

/// Category and brand affinities on a 0-5 scale. A missing key means no preference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetailerPreferences {
    pub category_weights: HashMap<String, f64>,
    pub brand_weights: HashMap<String, f64>,
}

/// Transient per-request score for one candidate product.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub product: ProductFeature,
    pub collaborative_score: Option<f64>,
    pub content_score: Option<f64>,
    pub blended_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Hybrid,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationContext {
    pub collaborative_score: Option<f64>,
    pub content_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub retailer_id: Uuid,
    pub product_id: Uuid,
    pub score: f64,
    pub recommendation_type: RecommendationType,
    pub algorithm_version: String,
    pub created_at: DateTime<Utc>,
    pub context: RecommendationContext,
    pub was_clicked: bool,
    pub was_purchased: bool,
}

/// A persisted recommendation together with the product it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedProduct {
    pub recommendation: Recommendation,
    pub product: ProductFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    View,
    Click,
    Purchase,
    Like,
    Dislike,
    Ignore,
}

/// Outcome flag on a recommendation that feedback may flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeFlag {
    Clicked,
    Purchased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: Uuid,
    pub retailer_id: Uuid,
    pub product_id: Uuid,
    pub recommendation_id: Option<Uuid>,
    pub feedback_type: FeedbackType,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub retailer_id: Uuid,
    pub product_id: Uuid,
    pub feedback_type: FeedbackType,
    pub value: Option<f64>,
    pub recommendation_id: Option<Uuid>,
}

impl ProductFeature {
    pub fn new(product_id: Uuid, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            product_id,
            name: name.into(),
            category: category.into(),
            subcategory: None,
            brand: None,
            description: None,
            price: 0.0,
            popularity_score: 0.0,
            is_active: true,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_popularity(mut self, score: f64) -> Self {
        self.popularity_score = score;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Name, category, subcategory, brand and description joined by spaces.
    pub fn content_text(&self) -> String {
        [
            self.name.as_str(),
            self.category.as_str(),
            self.subcategory.as_deref().unwrap_or(""),
            self.brand.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or(""),
        ]
        .join(" ")
    }
}

impl Interaction {
    pub fn new(retailer_id: Uuid, product_id: Uuid, quantity: u32, total_amount: f64) -> Self {
        Self {
            retailer_id,
            product_id,
            quantity,
            total_amount,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Retailer {
    pub fn new(retailer_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            retailer_id,
            name: name.into(),
            store_type: None,
        }
    }

    pub fn with_store_type(mut self, store_type: impl Into<String>) -> Self {
        self.store_type = Some(store_type.into());
        self
    }
}

impl RetailerPreferences {
    pub fn is_empty(&self) -> bool {
        self.category_weights.is_empty() && self.brand_weights.is_empty()
    }

    pub fn with_category(mut self, category: impl Into<String>, weight: f64) -> Self {
        self.category_weights.insert(category.into(), weight);
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>, weight: f64) -> Self {
        self.brand_weights.insert(brand.into(), weight);
        self
    }
}

impl CandidateScore {
    pub fn context(&self) -> RecommendationContext {
        RecommendationContext {
            collaborative_score: self.collaborative_score,
            content_score: self.content_score,
        }
    }
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::View => "view",
            FeedbackType::Click => "click",
            FeedbackType::Purchase => "purchase",
            FeedbackType::Like => "like",
            FeedbackType::Dislike => "dislike",
            FeedbackType::Ignore => "ignore",
        }
    }

    pub fn outcome_flag(&self) -> Option<OutcomeFlag> {
        match self {
            FeedbackType::Click => Some(OutcomeFlag::Clicked),
            FeedbackType::Purchase => Some(OutcomeFlag::Purchased),
            _ => None,
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feedback type: {0}")]
pub struct UnknownFeedbackType(pub String);

impl FromStr for FeedbackType {
    type Err = UnknownFeedbackType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(FeedbackType::View),
            "click" => Ok(FeedbackType::Click),
            "purchase" => Ok(FeedbackType::Purchase),
            "like" => Ok(FeedbackType::Like),
            "dislike" => Ok(FeedbackType::Dislike),
            "ignore" => Ok(FeedbackType::Ignore),
            other => Err(UnknownFeedbackType(other.to_string())),
        }
    }
}

impl FeedbackRequest {
    pub fn new(retailer_id: Uuid, product_id: Uuid, feedback_type: FeedbackType) -> Self {
        Self {
            retailer_id,
            product_id,
            feedback_type,
            value: None,
            recommendation_id: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn for_recommendation(mut self, recommendation_id: Uuid) -> Self {
        self.recommendation_id = Some(recommendation_id);
        self
    }
}

impl Recommendation {
    pub fn apply(&mut self, flag: OutcomeFlag) {
        match flag {
            OutcomeFlag::Clicked => self.was_clicked = true,
            OutcomeFlag::Purchased => self.was_purchased = true,
        }
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationType::Hybrid => f.write_str("hybrid"),
            RecommendationType::Fallback => f.write_str("fallback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_text_treats_missing_fields_as_empty() {
        let product = ProductFeature::new(Uuid::new_v4(), "Oat Milk", "Food & Beverages")
            .with_brand("Oatly");
        assert_eq!(product.content_text(), "Oat Milk Food & Beverages  Oatly ");
    }

    #[test]
    fn test_feedback_type_parsing() {
        assert_eq!("Click".parse::<FeedbackType>(), Ok(FeedbackType::Click));
        assert_eq!(" purchase ".parse::<FeedbackType>(), Ok(FeedbackType::Purchase));
        assert!("share".parse::<FeedbackType>().is_err());
    }

    #[test]
    fn test_only_click_and_purchase_flip_flags() {
        assert_eq!(FeedbackType::Click.outcome_flag(), Some(OutcomeFlag::Clicked));
        assert_eq!(FeedbackType::Purchase.outcome_flag(), Some(OutcomeFlag::Purchased));
        for other in [
            FeedbackType::View,
            FeedbackType::Like,
            FeedbackType::Dislike,
            FeedbackType::Ignore,
        ] {
            assert_eq!(other.outcome_flag(), None);
        }
    }
}
