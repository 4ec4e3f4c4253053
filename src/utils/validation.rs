use crate::models::*;
use anyhow::{anyhow, Result};

pub const MAX_RATING_VALUE: f64 = 5.0;

pub fn validate_interaction(interaction: &Interaction) -> Result<()> {
    if interaction.retailer_id.is_nil() {
        return Err(anyhow!("Retailer ID cannot be nil"));
    }

    if interaction.product_id.is_nil() {
        return Err(anyhow!("Product ID cannot be nil"));
    }

    if interaction.quantity == 0 {
        return Err(anyhow!("Interaction quantity must be positive"));
    }

    if !interaction.total_amount.is_finite() {
        return Err(anyhow!("Interaction amount contains invalid values (NaN or Infinity)"));
    }

    Ok(())
}

pub fn validate_product(product: &ProductFeature) -> Result<()> {
    if product.product_id.is_nil() {
        return Err(anyhow!("Product ID cannot be nil"));
    }

    if !product.popularity_score.is_finite() {
        return Err(anyhow!("Product popularity contains invalid values (NaN or Infinity)"));
    }

    if product.popularity_score < 0.0 || product.popularity_score > MAX_RATING_VALUE {
        return Err(anyhow!("Product popularity score must be between 0.0 and 5.0"));
    }

    Ok(())
}

pub fn validate_feedback_request(request: &FeedbackRequest) -> Result<()> {
    if request.retailer_id.is_nil() {
        return Err(anyhow!("Retailer ID cannot be nil"));
    }

    if request.product_id.is_nil() {
        return Err(anyhow!("Product ID cannot be nil"));
    }

    if let Some(value) = request.value {
        if !value.is_finite() || !(0.0..=MAX_RATING_VALUE).contains(&value) {
            return Err(anyhow!("Feedback value must be between 0.0 and 5.0, got {}", value));
        }
    }

    Ok(())
}

/// Popularity clamped into the 0-5 scale; non-finite values count as 0.
pub fn sanitize_popularity(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, MAX_RATING_VALUE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_validate_interaction() {
        let valid = Interaction::new(Uuid::new_v4(), Uuid::new_v4(), 2, 19.5);
        assert!(validate_interaction(&valid).is_ok());

        let zero_quantity = Interaction::new(Uuid::new_v4(), Uuid::new_v4(), 0, 19.5);
        assert!(validate_interaction(&zero_quantity).is_err());

        let nil_retailer = Interaction::new(Uuid::nil(), Uuid::new_v4(), 1, 1.0);
        assert!(validate_interaction(&nil_retailer).is_err());
    }

    #[test]
    fn test_validate_feedback_value_range() {
        let base = FeedbackRequest::new(Uuid::new_v4(), Uuid::new_v4(), FeedbackType::Like);
        assert!(validate_feedback_request(&base).is_ok());
        assert!(validate_feedback_request(&base.clone().with_value(5.0)).is_ok());
        assert!(validate_feedback_request(&base.clone().with_value(5.5)).is_err());
        assert!(validate_feedback_request(&base.with_value(f64::NAN)).is_err());
    }

    #[test]
    fn test_sanitize_popularity() {
        assert_eq!(sanitize_popularity(7.0), 5.0);
        assert_eq!(sanitize_popularity(-1.0), 0.0);
        assert_eq!(sanitize_popularity(f64::INFINITY), 0.0);
        assert_eq!(sanitize_popularity(3.5), 3.5);
    }
}
