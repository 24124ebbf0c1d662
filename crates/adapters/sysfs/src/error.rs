//! Sysfs adapter error types.

use std::io;
use std::path::PathBuf;

use nest_domain::device::DeviceFormat;
use nest_domain::error::NestError;

/// Errors specific to the sysfs adapter.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The value file could not be opened for reading.
    #[error("unable to open handle for {path:?}")]
    HandleOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rewinding the read handle failed.
    #[error("unable to seek {path:?}")]
    Seek {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the value byte failed.
    #[error("unable to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The value file was empty.
    #[error("no value byte in {path:?}")]
    ShortRead { path: PathBuf },

    /// A write was attempted on a digital input.
    #[error("device {slug} ({format}) is read-only")]
    NotWritable { slug: String, format: DeviceFormat },

    /// The value file could not be created or truncated.
    #[error("unable to create {path:?}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the value byte failed.
    #[error("unable to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The device tree could not be walked.
    #[error("unable to walk device tree at {path:?}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two paths produced the same slug and duplicates are rejected.
    #[error("device {slug} found at both {first:?} and {second:?}")]
    DuplicateDevice {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl DeviceError {
    /// Convert into a [`NestError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> NestError {
        match self {
            Self::NotWritable { slug, format } => NestError::NotWritable { slug, format },
            other => NestError::Device(Box::new(other)),
        }
    }
}

impl From<DeviceError> for NestError {
    fn from(err: DeviceError) -> Self {
        err.into_domain()
    }
}

/// Render an error and its sources on a single line.
pub(crate) fn describe(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
