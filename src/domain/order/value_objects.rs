use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// One product/quantity/price entry within an order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, price: f64, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            quantity,
            color: None,
            size: None,
            image_url: None,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Customer details captured on the order at checkout
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Order lifecycle. Stored documents written before the vocabulary settled
/// use `pending` for the initial state; it reads back as `Placed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[serde(alias = "pending")]
    Placed,
    Accepted,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Placed,
        OrderStatus::Accepted,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Every string a stored document may use for this status
    pub fn stored_forms(&self) -> &'static [&'static str] {
        match self {
            OrderStatus::Placed => &["placed", "pending"],
            OrderStatus::Accepted => &["accepted"],
            OrderStatus::Delivered => &["delivered"],
            OrderStatus::Cancelled => &["cancelled"],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Guarded transition table:
    ///
    /// ```text
    /// placed   -> accepted | cancelled
    /// accepted -> delivered
    /// ```
    ///
    /// Requesting the current status is an idempotent no-op.
    pub fn transition(self, requested: OrderStatus) -> Result<OrderStatus, OrderError> {
        use OrderStatus::*;

        match (self, requested) {
            (current, next) if current == next => Ok(current),
            (Placed, Accepted) | (Placed, Cancelled) | (Accepted, Delivered) => Ok(requested),
            (from, to) => Err(OrderError::IllegalTransition { from, to }),
        }
    }

    /// The single action offered for this status, if any
    pub fn next_action(&self) -> Option<OrderAction> {
        match self {
            OrderStatus::Placed => Some(OrderAction::Accept),
            OrderStatus::Accepted => Some(OrderAction::MarkDelivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" | "pending" => Ok(OrderStatus::Placed),
            "accepted" => Ok(OrderStatus::Accepted),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::Validation(format!("unknown order status: {}", other))),
        }
    }
}

/// Action a presentation layer offers next to an order's status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Accept,
    MarkDelivered,
}

impl OrderAction {
    pub fn label(&self) -> &'static str {
        match self {
            OrderAction::Accept => "Accept Order",
            OrderAction::MarkDelivered => "Mark as Delivered",
        }
    }

    pub fn target_status(&self) -> OrderStatus {
        match self {
            OrderAction::Accept => OrderStatus::Accepted,
            OrderAction::MarkDelivered => OrderStatus::Delivered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountSummary {
    pub discount_amount: f64,
    pub final_total: f64,
}

/// Percentage discount applied to an order subtotal
pub fn calculate_discount(total: f64, discount_percentage: f64) -> DiscountSummary {
    let discount_amount = total * (discount_percentage / 100.0);
    DiscountSummary {
        discount_amount,
        final_total: total - discount_amount,
    }
}

/// Accepts an empty entry or a number in 0..=100
pub fn validate_discount(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return true;
    }
    trimmed
        .parse::<f64>()
        .map(|n| n.is_finite() && (0.0..=100.0).contains(&n))
        .unwrap_or(false)
}

/// USD formatting with thousands separators, e.g. `$1,234.50`
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}

// ============================================================================
// Unit Tests
// ============================================================================
