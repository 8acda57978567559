use serde::{Deserialize, Serialize};

use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Face,
    Rectangle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: NormalizedRect,
    /// Head roll in radians.
    #[serde(default)]
    pub roll: Option<f64>,
    /// Head yaw in radians.
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub capture_quality: Option<f64>,
    pub confidence: f64,
}

impl FaceObservation {
    pub fn new(bounding_box: NormalizedRect, confidence: f64) -> Self {
        Self {
            bounding_box,
            roll: None,
            yaw: None,
            capture_quality: None,
            confidence,
        }
    }

    pub fn has_pose(&self) -> bool {
        self.roll.is_some() && self.yaw.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectangleObservation {
    pub top_left: NormalizedPoint,
    pub top_right: NormalizedPoint,
    pub bottom_right: NormalizedPoint,
    pub bottom_left: NormalizedPoint,
    pub confidence: f64,
}

impl RectangleObservation {
    pub fn corners(&self) -> [NormalizedPoint; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Axis-aligned rectangle with the given bounds.
    pub fn axis_aligned(rect: NormalizedRect, confidence: f64) -> Self {
        let [x1, y1, x2, y2] = rect.to_bbox();
        Self {
            top_left: NormalizedPoint::new(x1, y2),
            top_right: NormalizedPoint::new(x2, y2),
            bottom_right: NormalizedPoint::new(x2, y1),
            bottom_left: NormalizedPoint::new(x1, y1),
            confidence,
        }
    }
}

/// One detected object in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Observation {
    Face(FaceObservation),
    Rectangle(RectangleObservation),
}

impl Observation {
    pub fn kind(&self) -> ObservationKind {
        match self {
            Observation::Face(_) => ObservationKind::Face,
            Observation::Rectangle(_) => ObservationKind::Rectangle,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Observation::Face(f) => f.confidence,
            Observation::Rectangle(r) => r.confidence,
        }
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        match self {
            Observation::Face(f) => f.confidence = confidence,
            Observation::Rectangle(r) => r.confidence = confidence,
        }
    }

    pub fn bounding_box(&self) -> NormalizedRect {
        match self {
            Observation::Face(f) => f.bounding_box,
            Observation::Rectangle(r) => NormalizedRect::enclosing(&r.corners()),
        }
    }

    /// Copies the metrics a tracker cannot produce from `refined`, keeping
    /// this observation's tracked position and confidence.
    ///
    /// Faces take roll, yaw and capture quality; rectangles take the refined
    /// corner geometry. Observations of a different kind are ignored.
    pub fn refine_with(&mut self, refined: &Observation) {
        match (self, refined) {
            (Observation::Face(tracked), Observation::Face(detected)) => {
                tracked.roll = detected.roll;
                tracked.yaw = detected.yaw;
                tracked.capture_quality = detected.capture_quality;
            }
            (Observation::Rectangle(tracked), Observation::Rectangle(detected)) => {
                let confidence = tracked.confidence;
                *tracked = detected.clone();
                tracked.confidence = confidence;
            }
            _ => {}
        }
    }
}

/// Result of one tracking request for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedObjectObservation {
    pub request_id: u64,
    pub observation: Observation,
    /// The tracker has given up on this object.
    pub is_final: bool,
}
