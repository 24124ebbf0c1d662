//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`NestError`]
//! when crossing a port boundary.

use std::num::ParseIntError;

use crate::device::DeviceFormat;

/// Top-level error shared by the domain, application and adapter layers.
#[derive(Debug, thiserror::Error)]
pub enum NestError {
    /// A path could not be turned into a device identifier.
    #[error("identifier error")]
    Identifier(#[from] IdentifierError),

    /// A referenced device or entity does not exist.
    #[error("target not found")]
    NotFound(#[from] NotFoundError),

    /// A write was attempted on a read-only device.
    #[error("device {slug} ({format}) is read-only")]
    NotWritable {
        /// Slug of the device that refused the write.
        slug: String,
        /// Format that made it read-only.
        format: DeviceFormat,
    },

    /// An adapter failed to perform device I/O.
    #[error("device error")]
    Device(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The event sink has no consumer anymore.
    #[error("event sink closed")]
    SinkClosed,

    /// A configuration or rule set violates an invariant.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Why a filesystem path is not a device identifier.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// The path does not follow the device layout. Expected for most paths
    /// visited during discovery.
    #[error("no device matched path {path:?}")]
    NotADevicePath {
        /// The rejected path.
        path: String,
    },

    /// The layout matched but the device number is not numeric.
    #[error("malformed device number {value:?} in path {path:?}")]
    MalformedDeviceNumber {
        /// The offending path.
        path: String,
        /// The raw number field.
        value: String,
        /// Underlying parse failure.
        #[source]
        source: ParseIntError,
    },
}

impl IdentifierError {
    /// Whether this is the expected "not a device" outcome rather than a
    /// data error.
    #[must_use]
    pub fn is_not_a_device(&self) -> bool {
        matches!(self, Self::NotADevicePath { .. })
    }
}

/// A lookup by id returned nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of thing that was looked up (e.g. `"Device"`).
    pub entity: &'static str,
    /// The id that was not found.
    pub id: String,
}
