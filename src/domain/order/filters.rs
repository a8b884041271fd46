use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::OrderStatus;

// ============================================================================
// Order Filters - Client-evaluated listing criteria
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    Today,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl DateFilter {
    /// Earliest `createdAt` admitted by this filter. Boundaries are midnight
    /// UTC; weeks start on Sunday.
    pub fn start_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start = match self {
            DateFilter::All => return None,
            DateFilter::Today => today,
            DateFilter::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
            }
            DateFilter::Month => today.with_day(1)?,
            DateFilter::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
        };
        Some(start.and_hms_opt(0, 0, 0)?.and_utc())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilters {
    /// `None` lists every status
    pub status: Option<OrderStatus>,
    pub date_filter: DateFilter,
    /// Prefix over the customer's name; empty disables it
    pub search_term: String,
}

impl OrderFilters {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Overlay the fields present in `patch`
    pub fn merge(&mut self, patch: FiltersPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(date_filter) = patch.date_filter {
            self.date_filter = date_filter;
        }
        if let Some(search_term) = patch.search_term {
            self.search_term = search_term;
        }
    }
}

/// Partial filter update; `status: Some(None)` selects "all"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltersPatch {
    pub status: Option<Option<OrderStatus>>,
    pub date_filter: Option<DateFilter>,
    pub search_term: Option<String>,
}
