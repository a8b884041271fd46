use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Product Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Published,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Published => "published",
            ProductStatus::Draft => "draft",
            ProductStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability band derived from the stock level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// More than `low_threshold` units is in stock, anything above zero is low
    pub fn for_stock(stock: i64, low_threshold: i64) -> Self {
        if stock > low_threshold {
            StockStatus::InStock
        } else if stock > 0 {
            StockStatus::LowStock
        } else {
            StockStatus::OutOfStock
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_bands() {
        assert_eq!(StockStatus::for_stock(11, 10), StockStatus::InStock);
        assert_eq!(StockStatus::for_stock(10, 10), StockStatus::LowStock);
        assert_eq!(StockStatus::for_stock(1, 10), StockStatus::LowStock);
        assert_eq!(StockStatus::for_stock(0, 10), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_stock(-3, 10).label(), "Out of Stock");
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&ProductStatus::Draft).unwrap(), "\"draft\"");
        let status: ProductStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, ProductStatus::Archived);
    }
}
