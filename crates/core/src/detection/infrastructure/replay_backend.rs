use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::math::greedy_match;
use crate::detection::domain::detection_backend::{BackendError, DetectionBackend};
use crate::detection::domain::observation::{
    Observation, ObservationKind, TrackedObjectObservation,
};
use crate::detection::domain::tracking_request::TrackingRequest;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::orientation::ImageOrientation;

/// Minimum IoU between a request's last position and a scripted
/// observation for the tracker to follow it.
const MIN_TRACK_IOU: f64 = 0.1;

#[derive(Error, Debug)]
pub enum ReplayScriptError {
    #[error("failed to read replay script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse replay script {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ground-truth observations per frame index, plus frames on which every
/// backend call fails.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub frames: HashMap<usize, Vec<Observation>>,
    pub failures: HashSet<usize>,
}

impl ReplayScript {
    pub fn from_file(path: &Path) -> Result<Self, ReplayScriptError> {
        let json = fs::read_to_string(path).map_err(|source| ReplayScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ReplayScriptError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Detection backend that replays a pre-recorded script by frame index.
///
/// Detection returns the scripted observations (only those overlapping the
/// region hint, when one is given). Tracking follows each request to the
/// best-overlapping scripted observation of the same kind; requests that
/// match nothing come back at zero confidence, which the pipeline treats
/// as a lost track.
pub struct ReplayBackend {
    script: ReplayScript,
}

impl ReplayBackend {
    pub fn new(script: ReplayScript) -> Self {
        Self { script }
    }

    fn check_frame(&self, frame: &Frame) -> Result<(), BackendError> {
        if !frame.is_well_formed() {
            return Err(BackendError::MalformedFrame {
                index: frame.index(),
                reason: "payload does not match dimensions".to_string(),
            });
        }
        if self.script.failures.contains(&frame.index()) {
            return Err(BackendError::Internal(format!(
                "scripted failure on frame {}",
                frame.index()
            )));
        }
        Ok(())
    }

    fn scripted(&self, frame: &Frame) -> &[Observation] {
        self.script
            .frames
            .get(&frame.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl DetectionBackend for ReplayBackend {
    fn detect(
        &mut self,
        frame: &Frame,
        _orientation: ImageOrientation,
        region: Option<&NormalizedRect>,
    ) -> Result<Vec<Observation>, BackendError> {
        self.check_frame(frame)?;
        Ok(self
            .scripted(frame)
            .iter()
            .filter(|o| region.map_or(true, |r| o.bounding_box().intersects(r)))
            .cloned()
            .collect())
    }

    fn track(
        &mut self,
        frame: &Frame,
        _orientation: ImageOrientation,
        requests: &[TrackingRequest],
    ) -> Result<Vec<TrackedObjectObservation>, BackendError> {
        self.check_frame(frame)?;
        let candidates = self.scripted(frame);

        let mut matched: HashMap<usize, usize> = HashMap::new();
        for kind in [ObservationKind::Face, ObservationKind::Rectangle] {
            let tracks = boxes_of_kind(requests.iter().map(|r| &r.target), kind);
            let dets = boxes_of_kind(candidates.iter(), kind);
            matched.extend(greedy_match(&tracks, &dets, MIN_TRACK_IOU));
        }

        Ok(requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                let observation = match matched.get(&i) {
                    Some(&ci) => position_only(&candidates[ci]),
                    None => {
                        let mut lost = request.target.clone();
                        lost.set_confidence(0.0);
                        lost
                    }
                };
                TrackedObjectObservation {
                    request_id: request.id,
                    observation,
                    is_final: false,
                }
            })
            .collect())
    }
}

fn boxes_of_kind<'a>(
    observations: impl Iterator<Item = &'a Observation>,
    kind: ObservationKind,
) -> Vec<(usize, [f64; 4])> {
    observations
        .enumerate()
        .filter(|(_, o)| o.kind() == kind)
        .map(|(i, o)| (i, o.bounding_box().to_bbox()))
        .collect()
}

/// Trackers report where an object is, not how it is posed.
fn position_only(observation: &Observation) -> Observation {
    let mut tracked = observation.clone();
    if let Observation::Face(face) = &mut tracked {
        face.roll = None;
        face.yaw = None;
        face.capture_quality = None;
    }
    tracked
}
