use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::{
    CaptureConfigurationError, CaptureFormat, FrameError, FrameResult, FrameSource,
};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::orientation::DeviceOrientation;

/// Replays a directory of still images as a camera feed.
///
/// Files are read in name order. Every image must share the dimensions of
/// the first one. With a frame rate set, frames are released on a fixed
/// schedule the way a live camera would deliver them; without one they
/// are decoded as fast as the consumer pulls.
pub struct ImageSequenceSource {
    dir: PathBuf,
    orientation: DeviceOrientation,
    interval: Option<Duration>,
    paths: Vec<PathBuf>,
    format: Option<CaptureFormat>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, orientation: DeviceOrientation) -> Self {
        Self {
            dir: dir.into(),
            orientation,
            interval: None,
            paths: Vec::new(),
            format: None,
        }
    }

    /// Paces delivery at `fps`. Rates whose frame interval is not a
    /// representable duration (zero, negative, subnormal) disable pacing.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.interval = (fps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / fps).ok())
            .flatten();
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureConfigurationError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CaptureConfigurationError::DeviceUnavailable(format!("{}: {e}", dir.display()))
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Decodes one image into a BGRA frame.
fn load_frame(
    path: &Path,
    format: &CaptureFormat,
    index: usize,
) -> Result<Frame, FrameError> {
    let rgba = image::open(path)?.to_rgba8();
    if rgba.width() != format.width || rgba.height() != format.height {
        return Err(format!(
            "{}: expected {}x{}, got {}x{}",
            path.display(),
            format.width,
            format.height,
            rgba.width(),
            rgba.height()
        )
        .into());
    }
    let mut data = rgba.into_raw();
    for pixel in data.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    Ok(Frame::new(
        data,
        format.width,
        format.height,
        format.orientation,
        index,
    ))
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<CaptureFormat, CaptureConfigurationError> {
        let paths = list_images(&self.dir)?;
        let first = paths.first().ok_or_else(|| {
            CaptureConfigurationError::DeviceUnavailable(format!(
                "no images found in {}",
                self.dir.display()
            ))
        })?;
        let (width, height) = image::image_dimensions(first).map_err(|e| {
            CaptureConfigurationError::UnsupportedFormat(format!("{}: {e}", first.display()))
        })?;

        let format = CaptureFormat {
            width,
            height,
            pixel_format: PixelFormat::Bgra8,
            orientation: self.orientation,
        };
        format.validate()?;

        log::info!(
            "Opened {} frame(s) at {}x{} from {}",
            paths.len(),
            width,
            height,
            self.dir.display()
        );
        self.paths = paths;
        self.format = Some(format);
        Ok(format)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        let Some(format) = self.format else {
            return Box::new(std::iter::once(Err(
                "ImageSequenceSource: not opened".into()
            )));
        };
        let interval = self.interval;
        let start = Instant::now();

        Box::new(self.paths.iter().enumerate().map(move |(index, path)| {
            let due = interval
                .and_then(|i| i.checked_mul(u32::try_from(index).ok()?))
                .and_then(|offset| start.checked_add(offset));
            if let Some(due) = due {
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
            }
            load_frame(path, &format, index)
        }))
    }

    fn close(&mut self) {
        self.paths.clear();
        self.format = None;
    }
}
