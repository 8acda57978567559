use ndarray::{s, ArrayView1, ArrayViewMut3, Axis};

use crate::pipeline::detection_pipeline::ObservationUpdate;
use crate::presentation::domain::overlay_renderer::OverlayRenderer;
use crate::shared::constants::DEFAULT_STROKE_WIDTH;
use crate::shared::frame::Frame;
use crate::shared::geometry::PixelRect;

/// BGRA green.
const OUTLINE_COLOR: [u8; 4] = [0, 255, 0, 255];
/// BGRA red.
const LAST_FRAME_COLOR: [u8; 4] = [0, 0, 255, 255];

/// Outlines each observation's bounding box.
///
/// The stroke is drawn inside the box so outlines never spill past the
/// object they mark. Boxes partly outside the frame are clipped.
pub struct BoxOverlayRenderer {
    stroke_width: u32,
    color: [u8; 4],
    last_frame_color: Option<[u8; 4]>,
}

impl BoxOverlayRenderer {
    pub fn new(stroke_width: u32) -> Self {
        Self {
            stroke_width: stroke_width.max(1),
            color: OUTLINE_COLOR,
            last_frame_color: None,
        }
    }

    /// Draws tracks in their final frame in a separate color.
    pub fn with_last_frame_highlight(mut self) -> Self {
        self.last_frame_color = Some(LAST_FRAME_COLOR);
        self
    }

    fn draw_outline(&self, pixels: &mut ArrayViewMut3<'_, u8>, rect: PixelRect, color: &[u8; 4]) {
        let x0 = rect.x as usize;
        let y0 = rect.y as usize;
        let x1 = x0 + rect.width as usize;
        let y1 = y0 + rect.height as usize;
        let stroke = self.stroke_width as usize;

        let top = (y0 + stroke).min(y1);
        let bottom = y1.saturating_sub(stroke).max(y0);
        let left = (x0 + stroke).min(x1);
        let right = x1.saturating_sub(stroke).max(x0);

        let color = ArrayView1::from(&color[..]);
        for (ya, yb, xa, xb) in [
            (y0, top, x0, x1),
            (bottom, y1, x0, x1),
            (y0, y1, x0, left),
            (y0, y1, right, x1),
        ] {
            let mut band = pixels.slice_mut(s![ya..yb, xa..xb, ..]);
            for mut px in band.lanes_mut(Axis(2)) {
                px.assign(&color);
            }
        }
    }
}

impl Default for BoxOverlayRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_STROKE_WIDTH)
    }
}

impl OverlayRenderer for BoxOverlayRenderer {
    fn render(
        &self,
        frame: &mut Frame,
        updates: &[ObservationUpdate],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (w, h) = (frame.width(), frame.height());
        let mut pixels = frame
            .as_ndarray_mut()
            .ok_or("frame payload does not match its dimensions")?;

        for update in updates {
            let Some(rect) = update
                .observation
                .bounding_box()
                .to_pixel_rect(w, h)
                .clamp_to(w, h)
            else {
                continue;
            };
            let color = match self.last_frame_color {
                Some(ref c) if update.is_last_frame => c,
                _ => &self.color,
            };
            self.draw_outline(&mut pixels, rect, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::observation::{FaceObservation, Observation};
    use crate::shared::geometry::NormalizedRect;
    use crate::shared::orientation::DeviceOrientation;

    fn blank(width: u32, height: u32) -> Frame {
        Frame::new(
            vec![0u8; (width * height * 4) as usize],
            width,
            height,
            DeviceOrientation::Portrait,
            0,
        )
    }

    fn update(rect: NormalizedRect, is_last_frame: bool) -> ObservationUpdate {
        ObservationUpdate {
            track_id: Some(1),
            observation: Observation::Face(FaceObservation::new(rect, 0.9)),
            is_last_frame,
        }
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width() + x) * 4) as usize;
        frame.data()[i..i + 4].try_into().unwrap()
    }

    #[test]
    fn test_outline_drawn_with_flip_and_hollow_center() {
        let mut frame = blank(20, 20);
        // Bottom-left origin: y 0.5..1.0 is the top half of the image.
        let rect = NormalizedRect::new(0.25, 0.5, 0.5, 0.5);
        BoxOverlayRenderer::new(2)
            .render(&mut frame, &[update(rect, false)])
            .unwrap();

        assert_eq!(pixel(&frame, 5, 0), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 14, 9), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 5, 9), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 10, 5), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 10, 15), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 4, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_stroke_wider_than_box_fills_it() {
        let mut frame = blank(10, 10);
        let rect = NormalizedRect::new(0.0, 0.0, 0.2, 0.2);
        BoxOverlayRenderer::new(5)
            .render(&mut frame, &[update(rect, false)])
            .unwrap();
        assert_eq!(pixel(&frame, 1, 9), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 0, 8), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 2, 9), [0, 0, 0, 0]);
    }

    #[test]
    fn test_box_outside_frame_is_skipped() {
        let mut frame = blank(10, 10);
        let rect = NormalizedRect::new(1.5, 0.2, 0.2, 0.2);
        BoxOverlayRenderer::default()
            .render(&mut frame, &[update(rect, false)])
            .unwrap();
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_box_is_clipped_to_frame() {
        let mut frame = blank(4, 4);
        let rect = NormalizedRect::new(0.5, 0.0, 1e12, 1.0);
        BoxOverlayRenderer::new(1)
            .render(&mut frame, &[update(rect, false)])
            .unwrap();
        assert_eq!(pixel(&frame, 2, 0), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 3, 3), OUTLINE_COLOR);
        assert_eq!(pixel(&frame, 1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_last_frame_highlight() {
        let mut frame = blank(10, 10);
        let rect = NormalizedRect::new(0.0, 0.0, 1.0, 1.0);
        BoxOverlayRenderer::new(1)
            .with_last_frame_highlight()
            .render(&mut frame, &[update(rect, true)])
            .unwrap();
        assert_eq!(pixel(&frame, 0, 0), LAST_FRAME_COLOR);
    }

    #[test]
    fn test_last_frame_uses_default_color_without_highlight() {
        let mut frame = blank(10, 10);
        let rect = NormalizedRect::new(0.0, 0.0, 1.0, 1.0);
        BoxOverlayRenderer::new(1)
            .render(&mut frame, &[update(rect, true)])
            .unwrap();
        assert_eq!(pixel(&frame, 9, 9), OUTLINE_COLOR);
    }

    #[test]
    fn test_malformed_frame_errors() {
        let mut frame = Frame::new(vec![0u8; 7], 10, 10, DeviceOrientation::Portrait, 0);
        assert!(BoxOverlayRenderer::default()
            .render(&mut frame, &[])
            .is_err());
    }

    #[test]
    fn test_zero_stroke_is_clamped() {
        assert_eq!(BoxOverlayRenderer::new(0).stroke_width, 1);
    }
}
