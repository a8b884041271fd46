// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// One subdirectory per admin feature. Each has:
// - Errors (closed enum mapped from store errors)
// - Aggregate / value objects (stored document shapes, validation)
// - Repository (reads and batched writes against the document store)
// - State (cached view plus async operations with request lifecycle)
//
// ============================================================================

pub mod order;
pub mod product;
pub mod category;
pub mod customer;
pub mod messaging;
pub mod auth;
