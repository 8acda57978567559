use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::detection::domain::detection_backend::DetectionBackend;
use crate::detection::domain::observation::{Observation, TrackedObjectObservation};
use crate::detection::domain::tracking_request::ActiveTrackSet;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::constants::RETENTION_THRESHOLD;
use crate::shared::frame::Frame;
use crate::shared::orientation::ImageOrientation;
use crate::shared::settings::{PipelineMode, PipelineSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// No active tracks; the next frame runs full detection.
    Idle,
    /// A full-frame detection call is in flight.
    Detecting,
    /// One or more tracks are followed frame to frame.
    Tracking,
}

/// One object's state as reported for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationUpdate {
    /// `None` in detect-only mode.
    pub track_id: Option<u64>,
    pub observation: Observation,
    /// The track ends with this frame.
    pub is_last_frame: bool,
}

/// Outcome of processing one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_index: usize,
    pub state: PipelineState,
    pub updates: Vec<ObservationUpdate>,
    /// The detection or tracking call failed; no updates were produced and
    /// the active tracks were left untouched.
    pub backend_failed: bool,
}

/// Per-frame detection/tracking state machine.
///
/// While no object is tracked every frame gets one full detection; each
/// observation scoring above the creation threshold starts a track. While
/// tracks exist, one batched tracking call moves them all forward, and a
/// region-restricted detection per surviving track recovers pose metrics
/// the tracker cannot provide. Tracks the backend gives up on, or whose
/// confidence falls to [`RETENTION_THRESHOLD`] or below, are reported one
/// last time and then pruned.
///
/// Backend failures are absorbed: the frame yields no updates and the
/// active tracks carry over unchanged.
pub struct DetectionPipeline {
    backend: Box<dyn DetectionBackend>,
    settings: PipelineSettings,
    tracks: ActiveTrackSet,
    state: PipelineState,
    logger: Box<dyn PipelineLogger>,
}

impl DetectionPipeline {
    pub fn new(backend: Box<dyn DetectionBackend>, settings: PipelineSettings) -> Self {
        Self {
            backend,
            settings,
            tracks: ActiveTrackSet::new(),
            state: PipelineState::Idle,
            logger: Box::new(NullPipelineLogger),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn active_tracks(&self) -> &ActiveTrackSet {
        &self.tracks
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Drops every track and returns to `Idle`.
    pub fn reset(&mut self) {
        if !self.tracks.is_empty() {
            log::debug!("Discarding {} active track(s)", self.tracks.len());
        }
        self.tracks.clear();
        self.state = PipelineState::Idle;
    }

    pub fn into_backend(self) -> Box<dyn DetectionBackend> {
        self.backend
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        if !frame.is_well_formed() {
            log::warn!(
                "Skipping frame {}: {}x{} payload of {} bytes is not decodable",
                frame.index(),
                frame.width(),
                frame.height(),
                frame.data().len()
            );
            return self.failed_report(frame);
        }

        let orientation = frame.orientation().image_orientation();
        let report = match self.settings.mode {
            PipelineMode::DetectOnly => self.detect_only(frame, orientation),
            PipelineMode::DetectAndTrack if self.tracks.is_empty() => {
                self.detect_new(frame, orientation)
            }
            PipelineMode::DetectAndTrack => self.track_existing(frame, orientation),
        };

        self.logger.frame(frame.index());
        self.logger.metric("active_tracks", self.tracks.len() as f64);
        report
    }

    fn detect_only(&mut self, frame: &Frame, orientation: ImageOrientation) -> FrameReport {
        self.state = PipelineState::Detecting;
        let result = self.timed("detect", |backend| backend.detect(frame, orientation, None));
        self.state = PipelineState::Idle;

        let observations = match result {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                return self.failed_report(frame);
            }
        };

        let threshold = self.settings.creation_threshold;
        let updates = observations
            .into_iter()
            .filter(|o| o.confidence() > threshold)
            .map(|observation| ObservationUpdate {
                track_id: None,
                observation,
                is_last_frame: false,
            })
            .collect();
        self.report(frame, updates)
    }

    fn detect_new(&mut self, frame: &Frame, orientation: ImageOrientation) -> FrameReport {
        self.state = PipelineState::Detecting;
        let result = self.timed("detect", |backend| backend.detect(frame, orientation, None));

        let observations = match result {
            Ok(observations) => observations,
            Err(e) => {
                self.state = PipelineState::Idle;
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                return self.failed_report(frame);
            }
        };

        let threshold = self.settings.creation_threshold;
        let mut updates = Vec::new();
        for observation in observations {
            if observation.confidence() <= threshold {
                continue;
            }
            let id = self.tracks.insert(observation.clone());
            updates.push(ObservationUpdate {
                track_id: Some(id),
                observation,
                is_last_frame: false,
            });
        }

        if updates.is_empty() {
            self.state = PipelineState::Idle;
        } else {
            log::debug!(
                "Started {} track(s) on frame {}",
                updates.len(),
                frame.index()
            );
            self.state = PipelineState::Tracking;
        }
        self.report(frame, updates)
    }

    fn track_existing(&mut self, frame: &Frame, orientation: ImageOrientation) -> FrameReport {
        let started = Instant::now();
        let result = self.backend.track(frame, orientation, self.tracks.requests());
        self.logger.timing("track", elapsed_ms(started));

        let results = match result {
            Ok(results) => results,
            Err(e) => {
                log::warn!(
                    "Tracking failed on frame {} for {} track(s): {e}",
                    frame.index(),
                    self.tracks.len()
                );
                return self.failed_report(frame);
            }
        };

        let updated = self.apply_tracking_results(results);

        let mut updates = Vec::with_capacity(updated.len());
        for (id, mut observation, is_last_frame) in updated {
            if !is_last_frame && self.settings.refine_after_tracking {
                self.refine(frame, orientation, id, &mut observation);
            }
            updates.push(ObservationUpdate {
                track_id: Some(id),
                observation,
                is_last_frame,
            });
        }

        for finished in self.tracks.prune_finished() {
            log::debug!(
                "Track {} ended on frame {} (confidence {:.2})",
                finished.id,
                frame.index(),
                finished.target.confidence()
            );
        }
        self.state = if self.tracks.is_empty() {
            PipelineState::Idle
        } else {
            PipelineState::Tracking
        };
        self.report(frame, updates)
    }

    /// Stores each result in its request and flags lost tracks. Returns
    /// `(id, observation, is_last_frame)` for every request that received
    /// a result, in track order. Requests without a result keep their
    /// previous target and are not reported.
    fn apply_tracking_results(
        &mut self,
        results: Vec<TrackedObjectObservation>,
    ) -> Vec<(u64, Observation, bool)> {
        let mut by_id: HashMap<u64, TrackedObjectObservation> =
            results.into_iter().map(|r| (r.request_id, r)).collect();

        let mut updated = Vec::new();
        for request in self.tracks.iter_mut() {
            let Some(result) = by_id.remove(&request.id) else {
                continue;
            };
            if result.is_final || result.observation.confidence() <= RETENTION_THRESHOLD {
                request.is_last_frame = true;
            }
            request.target = result.observation;
            updated.push((request.id, request.target.clone(), request.is_last_frame));
        }

        if !by_id.is_empty() {
            log::debug!("Ignoring {} result(s) for unknown tracks", by_id.len());
        }
        updated
    }

    /// Runs a detection restricted to the track's box and copies pose
    /// metrics from the best-overlapping result of the same kind. On
    /// failure the tracked observation is reported without them.
    fn refine(
        &mut self,
        frame: &Frame,
        orientation: ImageOrientation,
        id: u64,
        observation: &mut Observation,
    ) {
        let region = observation.bounding_box();
        let result = self.timed("refine", |backend| {
            backend.detect(frame, orientation, Some(&region))
        });

        match result {
            Ok(found) => {
                let best = found
                    .iter()
                    .filter(|o| o.kind() == observation.kind())
                    .max_by(|a, b| {
                        let ia = a.bounding_box().iou(&region);
                        let ib = b.bounding_box().iou(&region);
                        ia.partial_cmp(&ib).unwrap_or(std::cmp::Ordering::Equal)
                    });
                if let Some(refined) = best {
                    observation.refine_with(refined);
                }
            }
            Err(e) => log::warn!(
                "Refinement failed for track {id} on frame {}: {e}",
                frame.index()
            ),
        }
    }

    fn timed<T>(&mut self, stage: &str, call: impl FnOnce(&mut dyn DetectionBackend) -> T) -> T {
        let started = Instant::now();
        let result = call(self.backend.as_mut());
        self.logger.timing(stage, elapsed_ms(started));
        result
    }

    fn report(&self, frame: &Frame, updates: Vec<ObservationUpdate>) -> FrameReport {
        FrameReport {
            frame_index: frame.index(),
            state: self.state,
            updates,
            backend_failed: false,
        }
    }

    fn failed_report(&self, frame: &Frame) -> FrameReport {
        FrameReport {
            frame_index: frame.index(),
            state: self.state,
            updates: Vec::new(),
            backend_failed: true,
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
