//! A single sysfs value file: read, write, and a change-detecting poll loop.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use nest_app::ports::EventPublisher;
use nest_domain::device::DeviceIdentifier;
use nest_domain::error::IdentifierError;
use nest_domain::event::{DeviceEvent, DeviceFault, DevicePayload, Message};
use nest_domain::id::EntityId;

use crate::error::{DeviceError, describe};

/// Period between two reads of the same device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Why a poll loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// [`Device::close`] was called.
    Closed,
    /// The event sink has no consumer anymore.
    SinkClosed,
    /// A read failed; a [`DeviceEvent::Faulted`] was published.
    Faulted,
}

/// A digital input, digital output or relay output backed by one file.
///
/// Reads and writes on the same device are serialized by a single lock
/// around the file handle. The handle is opened on first read and kept.
#[derive(Debug)]
pub struct Device {
    identifier: DeviceIdentifier,
    slug: EntityId,
    path: PathBuf,
    handle: Mutex<Option<File>>,
    last_observed: std::sync::Mutex<Option<Message>>,
    stop: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl Device {
    /// Build a device for an already parsed identifier backed by `path`.
    pub fn new(identifier: DeviceIdentifier, path: impl Into<PathBuf>) -> Self {
        Self {
            slug: identifier.entity_id(),
            identifier,
            path: path.into(),
            handle: Mutex::new(None),
            last_observed: std::sync::Mutex::new(None),
            stop: std::sync::Mutex::new(None),
        }
    }

    /// Build a device from a path matching the sysfs layout.
    ///
    /// # Errors
    ///
    /// Returns the [`IdentifierError`] produced by
    /// [`DeviceIdentifier::parse`]. No file is touched.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, IdentifierError> {
        let path = path.into();
        let identifier = DeviceIdentifier::parse(&path.to_string_lossy())?;
        Ok(Self::new(identifier, path))
    }

    #[must_use]
    pub fn identifier(&self) -> DeviceIdentifier {
        self.identifier
    }

    #[must_use]
    pub fn slug(&self) -> &EntityId {
        &self.slug
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last value published by the poll loop, if any.
    #[must_use]
    pub fn last_observed(&self) -> Option<Message> {
        *self
            .last_observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the current value.
    ///
    /// Opens the file on first use, rewinds, and decodes one byte: `'1'` is
    /// `TurnOn`, `'0'` is `TurnOff`, anything else is `Unknown`. Does not
    /// touch the last observed value.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::HandleOpen`], [`DeviceError::Seek`],
    /// [`DeviceError::Read`] or [`DeviceError::ShortRead`].
    pub async fn read(&self) -> Result<DevicePayload, DeviceError> {
        let mut slot = self.handle.lock().await;
        let file = match slot.as_mut() {
            Some(file) => file,
            None => slot.insert(self.open().await?),
        };

        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|source| DeviceError::Seek {
                path: self.path.clone(),
                source,
            })?;

        let mut byte = [0_u8; 1];
        let count = file
            .read(&mut byte)
            .await
            .map_err(|source| DeviceError::Read {
                path: self.path.clone(),
                source,
            })?;
        if count == 0 {
            return Err(DeviceError::ShortRead {
                path: self.path.clone(),
            });
        }

        Ok(DevicePayload::new(
            self.slug.clone(),
            Message::from_byte(byte[0]),
        ))
    }

    async fn open(&self) -> Result<File, DeviceError> {
        File::open(&self.path)
            .await
            .map_err(|source| DeviceError::HandleOpen {
                path: self.path.clone(),
                source,
            })
    }

    /// Write `on` to the device, truncating the file first.
    ///
    /// Holds the same lock as [`read`](Self::read) so a poll never observes
    /// the file between truncate and write.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotWritable`] for digital inputs without
    /// touching the filesystem, [`DeviceError::Create`] or
    /// [`DeviceError::Write`] on I/O failure.
    #[tracing::instrument(skip(self), fields(slug = %self.slug))]
    pub async fn write(&self, on: bool) -> Result<(), DeviceError> {
        let format = self.identifier.format;
        if !format.is_writable() {
            return Err(DeviceError::NotWritable {
                slug: self.slug.to_string(),
                format,
            });
        }

        let _guard = self.handle.lock().await;
        let mut file = File::create(&self.path)
            .await
            .map_err(|source| DeviceError::Create {
                path: self.path.clone(),
                source,
            })?;
        let write_err = |source| DeviceError::Write {
            path: self.path.clone(),
            source,
        };
        file.write_all(if on { b"1" } else { b"0" })
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), "value written");
        Ok(())
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// Every `interval` the device is read; a value different from the last
    /// published one (or the first successful read) is published to
    /// `publisher`. Starting again replaces the previous loop, which stops.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn start<P>(self: &Arc<Self>, publisher: P, interval: Duration) -> JoinHandle<PollExit>
    where
        P: EventPublisher + Send + Sync + 'static,
    {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        let (stop_tx, stop_rx) = oneshot::channel();
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = Some(stop_tx);

        let device = Arc::clone(self);
        tokio::spawn(async move { device.poll(publisher, interval, stop_rx).await })
    }

    /// Stop the poll loop, if one is running.
    ///
    /// Returns whether a loop was signalled. Calling it again is a no-op.
    pub fn close(&self) -> bool {
        let stop = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match stop {
            Some(stop) => {
                // the loop may already be gone
                let _ = stop.send(());
                true
            }
            None => false,
        }
    }

    async fn poll<P: EventPublisher>(
        &self,
        publisher: P,
        interval: Duration,
        mut stop: oneshot::Receiver<()>,
    ) -> PollExit {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(slug = %self.slug, ?interval, "poll loop started");

        let exit = loop {
            tokio::select! {
                biased;
                _ = &mut stop => break PollExit::Closed,
                _ = ticker.tick() => {}
            }

            let payload = match self.read().await {
                Ok(payload) => payload,
                Err(err) => {
                    let reason = describe(&err);
                    tracing::error!(slug = %self.slug, error = %reason, "poll loop terminated");
                    let fault = DeviceFault::now(self.slug.clone(), reason);
                    // nobody may be listening anymore, the loop ends either way
                    let _ = publisher.publish(DeviceEvent::Faulted(fault)).await;
                    break PollExit::Faulted;
                }
            };

            if self.last_observed() == Some(payload.message) {
                continue;
            }

            let message = payload.message;
            tokio::select! {
                biased;
                _ = &mut stop => break PollExit::Closed,
                published = publisher.publish(payload.into()) => {
                    if published.is_err() {
                        break PollExit::SinkClosed;
                    }
                }
            }
            tracing::debug!(slug = %self.slug, %message, "state changed");
            *self
                .last_observed
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(message);
        };

        tracing::info!(slug = %self.slug, ?exit, "poll loop stopped");
        exit
    }
}
