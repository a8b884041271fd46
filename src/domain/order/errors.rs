use super::value_objects::OrderStatus;
use crate::store::StoreError;

// ============================================================================
// Order Errors - Closed failure set for order operations
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    /// Bad input, raised before any write
    #[error("Invalid order request: {0}")]
    Validation(String),

    /// Commit-time failure; nothing was applied
    #[error("Order transaction failed: {0}")]
    Transaction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Auth(String),

    #[error("Cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => OrderError::NotFound(path),
            StoreError::InvalidArgument(msg) => OrderError::Validation(msg),
            StoreError::FailedPrecondition { .. }
            | StoreError::Aborted(_)
            | StoreError::AlreadyExists(_)
            | StoreError::Unavailable(_) => OrderError::Transaction(err.to_string()),
            StoreError::Internal(msg) => OrderError::Unknown(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_codes_map_into_closed_set() {
        assert!(matches!(
            OrderError::from(StoreError::NotFound("orders/x".into())),
            OrderError::NotFound(_)
        ));
        assert!(matches!(
            OrderError::from(StoreError::Aborted("conflict".into())),
            OrderError::Transaction(_)
        ));
        assert!(matches!(
            OrderError::from(StoreError::Unavailable("offline".into())),
            OrderError::Transaction(_)
        ));
        assert!(matches!(
            OrderError::from(StoreError::Internal("bad row".into())),
            OrderError::Unknown(_)
        ));
    }

    #[test]
    fn test_illegal_transition_message() {
        let err = OrderError::IllegalTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Accepted,
        };
        assert_eq!(err.to_string(), "Cannot move order from delivered to accepted");
    }
}
