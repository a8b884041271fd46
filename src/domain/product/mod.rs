// ============================================================================
// Product Domain - Catalogue entries and their stock levels
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod repository;
pub mod state;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use repository::*;
pub use state::*;
