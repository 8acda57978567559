use std::path::Path;

use crate::presentation::domain::frame_writer::FrameWriter;
use crate::shared::frame::Frame;

/// Writes BGRA frames to image files using the `image` crate.
///
/// The output format follows the path's extension.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut rgba = frame.data().to_vec();
        for pixel in rgba.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let img = image::RgbaImage::from_raw(frame.width(), frame.height(), rgba)
            .ok_or("Failed to create image from frame data")?;
        img.save(path)?;
        Ok(())
    }
}
