use thiserror::Error;

use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::orientation::DeviceOrientation;

#[derive(Error, Debug)]
pub enum CaptureConfigurationError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid capture resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
}

/// What a source delivers once opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub orientation: DeviceOrientation,
}

impl CaptureFormat {
    pub fn validate(&self) -> Result<(), CaptureConfigurationError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureConfigurationError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

pub type FrameError = Box<dyn std::error::Error + Send + Sync>;
pub type FrameResult = Result<Frame, FrameError>;

/// Produces frames at its own pace.
///
/// Consumers never throttle a source; frames they cannot keep up with are
/// dropped on their side.
pub trait FrameSource: Send {
    /// Configures the device. Called once before [`FrameSource::frames`].
    fn open(&mut self) -> Result<CaptureFormat, CaptureConfigurationError>;

    /// Frames in capture order, with strictly increasing indices.
    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_>;

    /// Releases the device.
    fn close(&mut self);
}
