//! Device addressing: formats, identifiers and slugs.
//!
//! A device is one digital I/O point exposed as a single-byte pseudo-file
//! whose path encodes its address:
//!
//! ```text
//! .../io_group{1|2|3}/{di|do|ro}_{1|2|3}_{NN}/{di|do|ro}_value
//! ```
//!
//! [`DeviceIdentifier::parse`] turns such a path into a typed address and
//! [`DeviceIdentifier::slug`] renders its canonical key (`ro-3-13`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;
use crate::id::EntityId;

static DEVICE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/io_group(?P<outer>[1-3])/(?P<format>di|do|ro)_(?P<group>[1-3])_(?P<number>[[:alnum:]]{2})/(?P<leaf>di|do|ro)_value$",
    )
    .expect("device path pattern is valid")
});

/// Kind of I/O point. Determines whether the device accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceFormat {
    DigitalInput,
    DigitalOutput,
    RelayOutput,
}

impl DeviceFormat {
    /// All formats, in slug order.
    pub const ALL: [Self; 3] = [Self::DigitalInput, Self::DigitalOutput, Self::RelayOutput];

    /// Short form used in paths and slugs.
    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::DigitalInput => "di",
            Self::DigitalOutput => "do",
            Self::RelayOutput => "ro",
        }
    }

    /// Only outputs accept writes; inputs are read-only.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::DigitalOutput | Self::RelayOutput)
    }
}

impl fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// The abbreviation was not one of `di`, `do`, `ro`.
#[derive(Debug, thiserror::Error)]
#[error("unknown device format {0:?}")]
pub struct UnknownFormat(pub String);

impl FromStr for DeviceFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "di" => Ok(Self::DigitalInput),
            "do" => Ok(Self::DigitalOutput),
            "ro" => Ok(Self::RelayOutput),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Structured address of a device: `{format, group, number}`.
///
/// Two paths that parse to the same identifier denote the same logical
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    pub format: DeviceFormat,
    /// I/O group, `1..=3`.
    pub group: u8,
    /// Device number within the group, `0..=99`.
    pub number: u8,
}

impl DeviceIdentifier {
    /// Parse a filesystem path into an identifier.
    ///
    /// # Errors
    ///
    /// - [`IdentifierError::NotADevicePath`] when the path does not follow
    ///   the device layout, including when the inner group numeral differs
    ///   from the `io_groupN` segment or the `<fmt>_value` leaf names
    ///   another format.
    /// - [`IdentifierError::MalformedDeviceNumber`] when the layout matches
    ///   but the number field is not numeric.
    pub fn parse(path: &str) -> Result<Self, IdentifierError> {
        let not_a_device = || IdentifierError::NotADevicePath {
            path: path.to_string(),
        };

        let caps = DEVICE_PATH.captures(path).ok_or_else(not_a_device)?;
        if caps["outer"] != caps["group"] || caps["format"] != caps["leaf"] {
            return Err(not_a_device());
        }

        let format = caps["format"].parse().map_err(|_| not_a_device())?;
        let group = caps["group"].parse().map_err(|_| not_a_device())?;
        let raw_number = &caps["number"];
        let number =
            raw_number
                .parse()
                .map_err(|source| IdentifierError::MalformedDeviceNumber {
                    path: path.to_string(),
                    value: raw_number.to_string(),
                    source,
                })?;

        Ok(Self {
            format,
            group,
            number,
        })
    }

    /// Canonical key `<fmt>-<group>-<NN>`, e.g. `do-3-07`.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}-{}-{:02}", self.format, self.group, self.number)
    }

    /// Parse a slug produced by [`slug`](Self::slug) back into an
    /// identifier. Returns `None` for anything else.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        let mut parts = slug.splitn(3, '-');
        let format = parts.next()?.parse().ok()?;
        let group = parts.next()?;
        let number = parts.next()?;

        let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(group, 1) || !digits(number, 2) {
            return None;
        }
        let group: u8 = group.parse().ok()?;
        if !(1..=3).contains(&group) {
            return None;
        }

        Some(Self {
            format,
            group,
            number: number.parse().ok()?,
        })
    }

    /// The slug as an [`EntityId`].
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        EntityId::from(self.slug())
    }

    /// Path of the value file relative to the device root,
    /// e.g. `io_group3/ro_3_13/ro_value`.
    #[must_use]
    pub fn relative_path(&self) -> String {
        let fmt = self.format.abbreviation();
        format!(
            "io_group{group}/{fmt}_{group}_{number:02}/{fmt}_value",
            group = self.group,
            number = self.number,
        )
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}
