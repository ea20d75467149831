use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub business_id: Uuid,

    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(custom = "validate_price")]
    pub price: Decimal,

    pub is_available: Option<bool>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        let mut error = ValidationError::new("price_not_positive");
        error.message = Some("Price must be greater than 0".into());
        return Err(error);
    }
    Ok(())
}

impl Product {
    pub fn new(request: CreateProductRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id: request.business_id,
            name: request.name,
            description: request.description,
            price: request.price,
            is_available: request.is_available.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }
}
