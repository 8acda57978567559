/// Tracks at or below this confidence are marked last-frame and pruned.
pub const RETENTION_THRESHOLD: f64 = 0.3;

/// Detections must score strictly above this to start a track.
pub const DEFAULT_CREATION_THRESHOLD: f64 = 0.5;

/// Overlay outline width in pixels.
pub const DEFAULT_STROKE_WIDTH: u32 = 5;

/// Accepted frame rates for a paced image sequence.
pub const MIN_CAPTURE_FPS: f64 = 0.1;
pub const MAX_CAPTURE_FPS: f64 = 1000.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const SETTINGS_DIR_NAME: &str = "VisionTrack";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
