// ============================================================================
// Category Domain
// ============================================================================

pub mod errors;
pub mod aggregate;
pub mod repository;
pub mod state;

pub use errors::*;
pub use aggregate::*;
pub use repository::*;
pub use state::*;
