//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the router and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod directory;
pub mod event_bus;
pub mod rules;

pub use directory::EntityDirectory;
pub use event_bus::EventPublisher;
pub use rules::RuleSource;
