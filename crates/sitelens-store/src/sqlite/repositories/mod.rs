//! Stateless repository structs — each method takes `&Connection` and
//! executes SQL. No shared mutable state.

pub mod event;
pub mod session;

pub use event::EventRepo;
pub use session::SessionRepo;
