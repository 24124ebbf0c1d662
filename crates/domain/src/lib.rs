//! # nest-domain
//!
//! Pure domain model for the nest digital I/O controller.
//!
//! ## Responsibilities
//! - Device addressing: [`DeviceFormat`](device::DeviceFormat),
//!   [`DeviceIdentifier`](device::DeviceIdentifier) and the canonical slug
//! - Entity identifiers shared by devices and composite entities
//! - Event shapes exchanged on the event sink (`{sourceId, message}`)
//! - Automation rules (`{source → target}`)
//! - The error taxonomy every layer converts into
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod device;
pub mod event;
pub mod rules;
