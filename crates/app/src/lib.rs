//! # nest-app
//!
//! Application layer: **port definitions** (traits) and in-process
//! infrastructure.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `EventPublisher`: the event sink devices and entities publish to
//!   - `RuleSource`: where the automation engine looks up targets
//!   - `EntityDirectory`: resolves an id to something that accepts writes
//! - Provide the bounded fan-in **event bus** (no IO)
//! - Provide the **event router**, the automation engine that turns
//!   `TurnOn`/`TurnOff` events into writes on mapped targets
//!
//! ## Dependency rule
//! Depends on `nest-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod chain;
pub mod event_bus;
pub mod event_router;
pub mod ports;
pub mod rule_store;
