//! Input device identifiers, enumeration and resolution.

use std::fmt;
use std::str::FromStr;

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use super::capture::CaptureError;

// ---------------------------------------------------------------------------
// DeviceId
// ---------------------------------------------------------------------------

/// Which microphone to open.
///
/// Parsed from a string: `"default"` (or empty) is the host's default input,
/// a plain integer is a position in [`list_input_devices`], anything else is
/// a device name matched case-insensitively.
///
/// ```
/// use voice_paddle::audio::DeviceId;
///
/// assert_eq!("default".parse::<DeviceId>().unwrap(), DeviceId::Default);
/// assert_eq!(" 2 ".parse::<DeviceId>().unwrap(), DeviceId::Index(2));
/// assert_eq!(
///     "USB Mic".parse::<DeviceId>().unwrap(),
///     DeviceId::Name("USB Mic".into())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceId {
    #[default]
    Default,
    Index(usize),
    Name(String),
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(DeviceId::Default);
        }
        Ok(match s.parse::<usize>() {
            Ok(index) => DeviceId::Index(index),
            Err(_) => DeviceId::Name(s.to_string()),
        })
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Default => f.write_str("default"),
            DeviceId::Index(i) => write!(f, "{i}"),
            DeviceId::Name(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// One row of the input device listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    /// Position in the host's input device list; usable as [`DeviceId::Index`].
    pub index: usize,
    pub name: String,
    /// Largest channel count any supported input config offers.
    pub max_input_channels: u16,
}

/// List the input devices of the default host.
///
/// # Errors
///
/// [`CaptureError::Enumerate`] when the host cannot enumerate devices.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let devices = host.input_devices()?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| InputDeviceInfo {
            index,
            name: device_name(&device),
            max_input_channels: device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0),
        })
        .collect())
}

/// Find the device `id` refers to on `host`.
///
/// # Errors
///
/// [`CaptureError::DeviceUnavailable`] when nothing matches.
pub fn resolve_input_device(host: &cpal::Host, id: &DeviceId) -> Result<cpal::Device, CaptureError> {
    let unavailable = |reason: &str| CaptureError::DeviceUnavailable {
        device: id.to_string(),
        reason: reason.to_string(),
    };

    match id {
        DeviceId::Default => host
            .default_input_device()
            .ok_or_else(|| unavailable("host has no default input device")),
        DeviceId::Index(index) => host
            .input_devices()?
            .nth(*index)
            .ok_or_else(|| unavailable("no input device at this index")),
        DeviceId::Name(name) => host
            .input_devices()?
            .find(|d| {
                d.name()
                    .map(|n| n.trim().eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| unavailable("no input device with this name")),
    }
}

pub(crate) fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "unknown-input".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
