// ============================================================================
// Auth Domain - Admin sign-in and remembered sessions
// ============================================================================

pub mod errors;
pub mod provider;
pub mod session;
pub mod service;
pub mod state;

pub use errors::*;
pub use provider::*;
pub use session::*;
pub use service::*;
pub use state::*;
