use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::orientation::DeviceOrientation;

/// Pixel layouts a frame payload can carry.
///
/// Capture is configured for 32-bit BGRA only; anything else is rejected
/// when a session starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
        }
    }
}

/// Row-major 3x3 camera intrinsic matrix attached by the capture device.
pub type CameraIntrinsics = [[f64; 3]; 3];

/// A single captured frame: contiguous BGRA bytes in row-major order plus
/// the capture metadata the detection backend needs.
///
/// The payload is treated as opaque by the pipeline. Whether it is decodable
/// is checked with [`Frame::is_well_formed`] instead of at construction,
/// because frames arrive from devices that may hand over truncated buffers.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    orientation: DeviceOrientation,
    intrinsics: Option<CameraIntrinsics>,
    index: usize,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        orientation: DeviceOrientation,
        index: usize,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Bgra8,
            orientation,
            intrinsics: None,
            index,
        }
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn orientation(&self) -> DeviceOrientation {
        self.orientation
    }

    pub fn intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.intrinsics.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the payload length matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len()
                == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Returns `None` for frames that are not well formed.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(self.shape(), &self.data).ok()
    }

    pub fn as_ndarray_mut(&mut self) -> Option<ArrayViewMut3<'_, u8>> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data).ok()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.format.bytes_per_pixel(),
        )
    }
}
