use std::path::Path;

use crate::capture::domain::frame_source::FrameSource;
use crate::pipeline::detection_pipeline::{DetectionPipeline, FrameReport, ObservationUpdate};
use crate::presentation::domain::frame_writer::FrameWriter;
use crate::presentation::domain::overlay_renderer::OverlayRenderer;

/// Called after each frame with the number of frames done. Returning
/// `false` cancels the run.
pub type ProgressCallback = Box<dyn Fn(usize) -> bool + Send>;

/// Offline pipeline: read → process → draw → write, for every frame.
///
/// Unlike a live session nothing is dropped; each frame is processed to
/// completion before the next is read. Frames whose backend call failed
/// are drawn with the last successful overlays.
pub struct AnnotateSequenceUseCase {
    source: Box<dyn FrameSource>,
    pipeline: DetectionPipeline,
    renderer: Box<dyn OverlayRenderer>,
    writer: Box<dyn FrameWriter>,
    on_progress: Option<ProgressCallback>,
}

impl AnnotateSequenceUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: DetectionPipeline,
        renderer: Box<dyn OverlayRenderer>,
        writer: Box<dyn FrameWriter>,
    ) -> Self {
        Self {
            source,
            pipeline,
            renderer,
            writer,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    /// Writes `frame_NNNNN.png` per input frame into `output_dir` and
    /// returns every frame's report.
    pub fn execute(
        &mut self,
        output_dir: &Path,
    ) -> Result<Vec<FrameReport>, Box<dyn std::error::Error>> {
        let format = self.source.open()?;
        log::info!(
            "Annotating {}x{} frames into {}",
            format.width,
            format.height,
            output_dir.display()
        );

        let result = self.annotate_frames(output_dir);
        self.source.close();

        self.pipeline.logger().summary();
        result
    }

    fn annotate_frames(
        &mut self,
        output_dir: &Path,
    ) -> Result<Vec<FrameReport>, Box<dyn std::error::Error>> {
        let mut reports = Vec::new();
        let mut shown: Vec<ObservationUpdate> = Vec::new();

        for frame_result in self.source.frames() {
            let mut frame = frame_result.map_err(|e| -> Box<dyn std::error::Error> { e })?;

            let report = self.pipeline.process_frame(&frame);
            if !report.backend_failed {
                shown.clone_from(&report.updates);
            }

            self.renderer.render(&mut frame, &shown)?;
            let path = output_dir.join(format!("frame_{:05}.png", frame.index()));
            self.writer.write(&path, &frame)?;

            reports.push(report);

            if let Some(ref callback) = self.on_progress {
                if !callback(reports.len()) {
                    log::info!("Cancelled after {} frame(s)", reports.len());
                    break;
                }
            }
        }
        Ok(reports)
    }
}
