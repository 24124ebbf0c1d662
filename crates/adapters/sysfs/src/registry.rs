//! Device discovery and the slug-keyed registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use nest_app::ports::{EntityDirectory, EventPublisher};
use nest_domain::error::{IdentifierError, NestError, NotFoundError};
use nest_domain::id::EntityId;

use crate::device::{Device, PollExit};
use crate::error::DeviceError;

/// What to do when two paths yield the same slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the path visited last and log a warning.
    #[default]
    LastWins,
    /// Fail discovery with [`DeviceError::DuplicateDevice`].
    Reject,
}

/// Every device found under a root, keyed by slug.
///
/// The set is fixed once discovery returns.
#[derive(Debug)]
pub struct DeviceRegistry {
    root: PathBuf,
    devices: BTreeMap<EntityId, Arc<Device>>,
}

impl DeviceRegistry {
    /// Walk `root` and register every path that parses as a device.
    ///
    /// Paths outside the device layout are skipped silently. Paths with a
    /// malformed device number are skipped with a warning. Symlinks are
    /// not followed. Entries are visited in lexical order, so
    /// [`DuplicatePolicy::LastWins`] is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Discovery`] if the root or any directory below
    /// it cannot be listed, and [`DeviceError::DuplicateDevice`] under
    /// [`DuplicatePolicy::Reject`].
    pub fn discover(root: impl Into<PathBuf>, policy: DuplicatePolicy) -> Result<Self, DeviceError> {
        let root = root.into();
        let mut devices: BTreeMap<EntityId, Arc<Device>> = BTreeMap::new();

        let mut paths = Vec::new();
        walk(&root, &mut paths)?;

        for path in paths {
            let device = match Device::from_path(&path) {
                Ok(device) => Arc::new(device),
                Err(IdentifierError::NotADevicePath { .. }) => continue,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping device path");
                    continue;
                }
            };
            let slug = device.slug().clone();
            if let Some(previous) = devices.get(&slug) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(DeviceError::DuplicateDevice {
                            slug: slug.to_string(),
                            first: previous.path().to_path_buf(),
                            second: device.path().to_path_buf(),
                        });
                    }
                    DuplicatePolicy::LastWins => {
                        tracing::warn!(
                            %slug,
                            replaced = %previous.path().display(),
                            kept = %device.path().display(),
                            "duplicate device slug"
                        );
                    }
                }
            }
            devices.insert(slug, device);
        }

        tracing::info!(root = %root.display(), count = devices.len(), "device discovery finished");
        Ok(Self { root, devices })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&Arc<Device>> {
        self.devices.get(slug)
    }

    /// All slugs in ascending order.
    #[must_use]
    pub fn slugs(&self) -> Vec<&EntityId> {
        self.devices.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    /// Start one poll loop per device, each with its own publisher clone.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn start_polling<P>(&self, publisher: &P, interval: Duration) -> Vec<JoinHandle<PollExit>>
    where
        P: EventPublisher + Clone + Send + Sync + 'static,
    {
        let handles: Vec<_> = self
            .devices
            .values()
            .map(|device| device.start(publisher.clone(), interval))
            .collect();
        tracing::info!(count = handles.len(), ?interval, "polling started");
        handles
    }

    /// Stop every running poll loop. Returns how many were signalled.
    ///
    /// Safe to call more than once.
    pub fn close(&self) -> usize {
        let stopped = self.devices.values().filter(|device| device.close()).count();
        tracing::info!(stopped, "device registry closed");
        stopped
    }
}

impl EntityDirectory for DeviceRegistry {
    fn contains(&self, id: &EntityId) -> bool {
        self.devices.contains_key(id)
    }

    async fn apply(&self, id: &EntityId, on: bool) -> Result<(), NestError> {
        let device = self.get(id.as_str()).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: id.to_string(),
        })?;
        device.write(on).await?;
        Ok(())
    }
}

/// Collect every path under `dir`, `dir` included, depth first in lexical
/// order. Directories reached through symlinks are not entered.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DeviceError> {
    let discovery_err = |source| DeviceError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    out.push(dir.to_path_buf());
    let mut entries = std::fs::read_dir(dir)
        .map_err(discovery_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(discovery_err)?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let file_type = entry.file_type().map_err(discovery_err)?;
        if file_type.is_dir() {
            walk(&entry.path(), out)?;
        } else {
            out.push(entry.path());
        }
    }
    Ok(())
}
