use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::OrderError;
use super::value_objects::{calculate_discount, CustomerSnapshot, DiscountSummary, OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate - Stored order document and its business rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    #[serde(default)]
    pub id: String,
    pub user_id: String,

    // Checkout-time snapshot
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<Value>,

    // Set once, on acceptance
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub notes: String,

    pub status: OrderStatus,

    // Audit Trail
    #[serde(alias = "orderDate")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Subtotal and discount as shown on the invoice
    pub fn pricing(&self) -> DiscountSummary {
        calculate_discount(self.total_amount, self.discount)
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Order as handed over by checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<Value>,
}

impl NewOrder {
    pub fn new(user_id: impl Into<String>, items: Vec<OrderItem>) -> Self {
        Self {
            user_id: user_id.into(),
            items,
            customer: None,
            shipping_address: None,
            payment_method: None,
        }
    }

    pub fn with_customer(mut self, name: impl Into<String>, email: Option<String>) -> Self {
        self.customer = Some(CustomerSnapshot {
            name: name.into(),
            email,
        });
        self
    }

    pub fn total_amount(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Discount and notes supplied alongside a status change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub discount: Option<f64>,
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn new(discount: Option<f64>, notes: impl Into<String>) -> Self {
        Self {
            discount,
            notes: Some(notes.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.discount.is_none() && self.notes.is_none()
    }

    /// Resolved discount percentage; empty means zero
    pub fn discount_percentage(&self) -> Result<f64, OrderError> {
        let discount = self.discount.unwrap_or(0.0);
        if !discount.is_finite() || !(0.0..=100.0).contains(&discount) {
            return Err(OrderError::Validation(format!(
                "discount must be between 0 and 100, got {}",
                discount
            )));
        }
        Ok(discount)
    }

    pub fn notes_text(&self) -> String {
        self.notes.clone().unwrap_or_default()
    }
}

/// What a status mutation hands back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedOrderSummary {
    pub id: String,
    pub status: OrderStatus,
    pub discount: f64,
    pub notes: String,
}

/// Validate line items before any store access
pub fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation("order has no items".to_string()));
    }

    for (index, item) in items.iter().enumerate() {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::Validation(format!("item {} has no productId", index)));
        }
        if item.name.trim().is_empty() {
            return Err(OrderError::Validation(format!("item {} has no name", index)));
        }
        if !item.price.is_finite() || item.price <= 0.0 {
            return Err(OrderError::Validation(format!(
                "item {} has invalid price {}",
                index, item.price
            )));
        }
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "item {} has invalid quantity {}",
                index, item.quantity
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
