use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ProductError;
use super::value_objects::{ProductStatus, StockStatus};

// ============================================================================
// Product Aggregate
// ============================================================================

pub const MAX_NAME_LEN: usize = 100;
pub const MIN_PRICE: f64 = 0.01;
pub const MAX_PRICE: f64 = 100_000.0;
pub const MAX_STOCK: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
    /// Image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn stock_status(&self, low_threshold: i64) -> StockStatus {
        StockStatus::for_stock(self.stock, low_threshold)
    }

    /// Margin per unit when a cost price is known
    pub fn margin(&self) -> Option<f64> {
        self.cost_price.map(|cost| self.price - cost)
    }
}

/// Editable product fields, as submitted by the product form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
            cost_price: None,
            stock,
            status: ProductStatus::Published,
            images: None,
        }
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ProductError::Validation("Product name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ProductError::Validation(format!(
                "Name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        if self.category.trim().is_empty() {
            return Err(ProductError::Validation("Category is required".to_string()));
        }
        if !self.price.is_finite() || !(MIN_PRICE..=MAX_PRICE).contains(&self.price) {
            return Err(ProductError::Validation(format!(
                "Price must be between {} and {}",
                MIN_PRICE, MAX_PRICE
            )));
        }
        if let Some(cost) = self.cost_price {
            if !cost.is_finite() || !(0.0..=MAX_PRICE).contains(&cost) {
                return Err(ProductError::Validation(format!(
                    "Cost price must be between 0 and {}",
                    MAX_PRICE
                )));
            }
        }
        if !(0..=MAX_STOCK).contains(&self.stock) {
            return Err(ProductError::Validation(format!(
                "Stock must be between 0 and {}",
                MAX_STOCK
            )));
        }
        Ok(())
    }
}
