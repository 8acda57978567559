use thiserror::Error;

use crate::detection::domain::observation::{Observation, TrackedObjectObservation};
use crate::detection::domain::tracking_request::TrackingRequest;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::orientation::ImageOrientation;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("malformed frame {index}: {reason}")]
    MalformedFrame { index: usize, reason: String },
    #[error("backend failure: {0}")]
    Internal(String),
}

/// Domain interface for the vision service that finds and follows objects.
///
/// Implementations may keep per-sequence state (e.g. tracker internals),
/// hence `&mut self`. Camera intrinsics travel with the frame.
pub trait DetectionBackend: Send {
    /// Full detection over the frame, or over `region` when given.
    fn detect(
        &mut self,
        frame: &Frame,
        orientation: ImageOrientation,
        region: Option<&NormalizedRect>,
    ) -> Result<Vec<Observation>, BackendError>;

    /// One tracking step for every request, as a single batched call.
    ///
    /// A failure covers the whole batch; no per-request errors exist.
    fn track(
        &mut self,
        frame: &Frame,
        orientation: ImageOrientation,
        requests: &[TrackingRequest],
    ) -> Result<Vec<TrackedObjectObservation>, BackendError>;
}
