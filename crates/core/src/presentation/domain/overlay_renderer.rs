use crate::pipeline::detection_pipeline::ObservationUpdate;
use crate::shared::frame::Frame;

/// Draws observation overlays onto a frame.
///
/// Implementations modify the frame in-place (`&mut Frame`).
pub trait OverlayRenderer: Send {
    fn render(
        &self,
        frame: &mut Frame,
        updates: &[ObservationUpdate],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
