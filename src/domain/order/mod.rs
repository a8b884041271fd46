// ============================================================================
// Order Domain - Order lifecycle and acceptance
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus, discount helpers)
// - Errors (OrderError enum)
// - Aggregate (stored Order document, validation)
// - Filters (status / date / customer-name listing criteria)
// - Repository (OrderRepository, atomic acceptance)
// - State (OrderState container)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod filters;
pub mod repository;
pub mod state;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use filters::*;
pub use repository::*;
pub use state::*;
