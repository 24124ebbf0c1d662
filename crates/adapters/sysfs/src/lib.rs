//! # nest-adapter-sysfs
//!
//! Filesystem adapter: every digital input, digital output and relay
//! output of the controller is a pseudo-file holding one byte (`'0'` or
//! `'1'`) under the platform device tree:
//!
//! ```text
//! <root>/io_group<G>/<fmt>_<G>_<NN>/<fmt>_value
//! ```
//!
//! The [`DeviceRegistry`] walks the tree once at startup and owns one
//! [`Device`] per matching file. Each device can be polled on a fixed
//! interval; changes are published through the app's
//! [`EventPublisher`](nest_app::ports::EventPublisher) port. The registry
//! doubles as the [`EntityDirectory`](nest_app::ports::EntityDirectory)
//! the router writes through.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `nest-app` and `nest-domain`.

mod device;
mod error;
mod registry;

pub use device::{DEFAULT_POLL_INTERVAL, Device, PollExit};
pub use error::DeviceError;
pub use registry::{DeviceRegistry, DuplicatePolicy};
