use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CategoryError;

// ============================================================================
// Category Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Computed on read, never stored
    #[serde(default, skip_serializing)]
    pub product_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Trimmed, non-empty category name
pub fn normalize_name(name: &str) -> Result<String, CategoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::Validation("Category name is required".to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Tools ").unwrap(), "Tools");
        assert!(normalize_name("   ").is_err());
    }

    #[test]
    fn test_product_count_not_stored() {
        let category = Category {
            id: "c1".to_string(),
            name: "Tools".to_string(),
            product_count: 4,
            created_at: None,
            updated_at: None,
        };
        let json = serde_json::to_value(&category).unwrap();
        assert!(json.get("productCount").is_none());
    }
}
