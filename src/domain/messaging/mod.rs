// ============================================================================
// Messaging Domain - Admin / customer conversations
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod repository;
pub mod state;

pub use value_objects::*;
pub use errors::*;
pub use repository::*;
pub use state::*;
