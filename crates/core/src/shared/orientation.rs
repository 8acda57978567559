use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physical orientation of the capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

impl DeviceOrientation {
    pub const ALL: &[DeviceOrientation] = &[
        DeviceOrientation::Portrait,
        DeviceOrientation::PortraitUpsideDown,
        DeviceOrientation::LandscapeLeft,
        DeviceOrientation::LandscapeRight,
        DeviceOrientation::FaceUp,
        DeviceOrientation::FaceDown,
        DeviceOrientation::Unknown,
    ];

    /// Orientation of the captured image in the backend's convention.
    ///
    /// Fixed for a front-facing camera; face-up, face-down and unknown
    /// fall back to the portrait mapping.
    pub fn image_orientation(self) -> ImageOrientation {
        match self {
            DeviceOrientation::PortraitUpsideDown => ImageOrientation::RightMirrored,
            DeviceOrientation::LandscapeLeft => ImageOrientation::DownMirrored,
            DeviceOrientation::LandscapeRight => ImageOrientation::UpMirrored,
            DeviceOrientation::Portrait
            | DeviceOrientation::FaceUp
            | DeviceOrientation::FaceDown
            | DeviceOrientation::Unknown => ImageOrientation::LeftMirrored,
        }
    }
}

impl fmt::Display for DeviceOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceOrientation::Portrait => "portrait",
            DeviceOrientation::PortraitUpsideDown => "portrait-upside-down",
            DeviceOrientation::LandscapeLeft => "landscape-left",
            DeviceOrientation::LandscapeRight => "landscape-right",
            DeviceOrientation::FaceUp => "face-up",
            DeviceOrientation::FaceDown => "face-down",
            DeviceOrientation::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceOrientation::ALL
            .iter()
            .copied()
            .find(|o| o.to_string() == s)
            .ok_or_else(|| format!("unknown device orientation '{s}'"))
    }
}

/// EXIF-style image orientation understood by the detection backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageOrientation {
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    Left,
    LeftMirrored,
    Right,
    RightMirrored,
}
