//! Service layer module.
//!
//! Holds the composition root that wires clients, handlers and the
//! dispatcher together.

pub mod container;

pub use container::ServiceContainer;
