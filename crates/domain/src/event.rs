//! Events exchanged between devices, entities and the automation engine.
//!
//! Every producer publishes [`DeviceEvent`]s. A state edge carries a
//! [`DevicePayload`]; a poll loop that gave up carries a [`DeviceFault`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// UTC timestamp attached to faults.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Decoded on/off value of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    TurnOn,
    TurnOff,
    /// The backing byte was neither `'0'` nor `'1'`. Never routed.
    Unknown,
}

impl Message {
    /// Decode the single byte stored in a device file.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' => Self::TurnOff,
            b'1' => Self::TurnOn,
            _ => Self::Unknown,
        }
    }

    /// The on/off value, or `None` for [`Unknown`](Self::Unknown).
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::TurnOn => Some(true),
            Self::TurnOff => Some(false),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for Message {
    fn from(on: bool) -> Self {
        if on { Self::TurnOn } else { Self::TurnOff }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TurnOn => f.write_str("TurnOn"),
            Self::TurnOff => f.write_str("TurnOff"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// One observation or command: `{sourceId, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    pub source_id: EntityId,
    pub message: Message,
}

impl DevicePayload {
    #[must_use]
    pub fn new(source_id: impl Into<EntityId>, message: Message) -> Self {
        Self {
            source_id: source_id.into(),
            message,
        }
    }
}

/// A producer stopped observing because of an I/O failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFault {
    pub source_id: EntityId,
    /// Rendered error chain.
    pub reason: String,
    pub at: Timestamp,
}

impl DeviceFault {
    /// Record a fault observed now.
    #[must_use]
    pub fn now(source_id: impl Into<EntityId>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            reason: reason.into(),
            at: chrono::Utc::now(),
        }
    }
}

/// Item carried on the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// The observed value differs from the previous observation.
    Changed(DevicePayload),
    /// The producer hit a terminal error and will emit nothing more.
    Faulted(DeviceFault),
}

impl DeviceEvent {
    /// Id of the entity that produced the event.
    #[must_use]
    pub fn source_id(&self) -> &EntityId {
        match self {
            Self::Changed(payload) => &payload.source_id,
            Self::Faulted(fault) => &fault.source_id,
        }
    }
}

impl From<DevicePayload> for DeviceEvent {
    fn from(payload: DevicePayload) -> Self {
        Self::Changed(payload)
    }
}
