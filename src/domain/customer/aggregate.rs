use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CustomerError;
use super::value_objects::{Email, PhoneNumber};

// ============================================================================
// Customer Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: PhoneNumber,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub join_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_order: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn average_order_value(&self) -> Option<f64> {
        (self.total_orders > 0).then(|| self.total_spent / self.total_orders as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub email: Email,
    pub phone: PhoneNumber,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Email::new(email),
            phone: PhoneNumber::new(phone),
        }
    }

    pub fn validate(&self) -> Result<(), CustomerError> {
        if self.name.trim().is_empty()
            || self.email.as_str().trim().is_empty()
            || self.phone.as_str().trim().is_empty()
        {
            return Err(CustomerError::MissingFields);
        }
        if !self.email.is_valid() {
            return Err(CustomerError::InvalidEmail(self.email.as_str().to_string()));
        }
        Ok(())
    }
}
