use std::fmt;

use serde::Serialize;

use crate::detection::domain::observation::Observation;
use crate::pipeline::detection_pipeline::ObservationUpdate;

/// Head pose read-out for the most recent face that carries one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceOrientationSummary {
    pub roll_degrees: f64,
    pub yaw_degrees: f64,
    pub capture_quality: Option<f64>,
}

impl FaceOrientationSummary {
    /// Angles come from the last face in `updates` with both roll and yaw
    /// set; quality from the last face that has one, posed or not.
    pub fn from_updates(updates: &[ObservationUpdate]) -> Option<Self> {
        let mut faces = updates.iter().rev().filter_map(|u| match &u.observation {
            Observation::Face(face) => Some(face),
            Observation::Rectangle(_) => None,
        });
        let (roll, yaw) = faces
            .clone()
            .find_map(|face| face.roll.zip(face.yaw))?;
        let capture_quality = faces.find_map(|face| face.capture_quality);
        Some(Self {
            roll_degrees: roll.to_degrees(),
            yaw_degrees: yaw.to_degrees(),
            capture_quality,
        })
    }
}

impl fmt::Display for FaceOrientationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roll {:.1}°, yaw {:.1}°",
            self.roll_degrees, self.yaw_degrees
        )?;
        match self.capture_quality {
            Some(q) => write!(f, ", quality {q:.2}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    use crate::detection::domain::observation::{FaceObservation, RectangleObservation};
    use crate::shared::geometry::NormalizedRect;

    fn update(observation: Observation) -> ObservationUpdate {
        ObservationUpdate {
            track_id: Some(1),
            observation,
            is_last_frame: false,
        }
    }

    fn face(roll: Option<f64>, yaw: Option<f64>, quality: Option<f64>) -> Observation {
        Observation::Face(FaceObservation {
            bounding_box: NormalizedRect::new(0.1, 0.1, 0.2, 0.2),
            roll,
            yaw,
            capture_quality: quality,
            confidence: 0.9,
        })
    }

    #[test]
    fn test_converts_radians_to_degrees() {
        let summary =
            FaceOrientationSummary::from_updates(&[update(face(Some(FRAC_PI_2), Some(-0.5), Some(0.4)))])
                .unwrap();
        assert_relative_eq!(summary.roll_degrees, 90.0, epsilon = 1e-9);
        assert_relative_eq!(summary.yaw_degrees, -28.64788975654116, epsilon = 1e-9);
        assert_eq!(summary.capture_quality, Some(0.4));
    }

    #[test]
    fn test_uses_last_face_with_both_angles() {
        let updates = [
            update(face(Some(0.1), Some(0.1), None)),
            update(face(Some(0.2), Some(0.2), Some(0.9))),
            update(face(Some(0.3), None, None)),
            update(Observation::Rectangle(RectangleObservation::axis_aligned(
                NormalizedRect::new(0.5, 0.5, 0.1, 0.1),
                0.9,
            ))),
        ];
        let summary = FaceOrientationSummary::from_updates(&updates).unwrap();
        assert_relative_eq!(summary.roll_degrees, 0.2f64.to_degrees());
        assert_eq!(summary.capture_quality, Some(0.9));
    }

    #[test]
    fn test_quality_taken_from_face_without_pose() {
        let updates = [
            update(face(Some(0.2), Some(0.2), Some(0.3))),
            update(face(None, None, Some(0.7))),
        ];
        let summary = FaceOrientationSummary::from_updates(&updates).unwrap();
        assert_relative_eq!(summary.yaw_degrees, 0.2f64.to_degrees());
        assert_eq!(summary.capture_quality, Some(0.7));
    }

    #[test]
    fn test_none_without_posed_face() {
        assert!(FaceOrientationSummary::from_updates(&[]).is_none());
        assert!(FaceOrientationSummary::from_updates(&[update(face(None, None, None))]).is_none());
    }

    #[test]
    fn test_display() {
        let summary = FaceOrientationSummary {
            roll_degrees: 12.0,
            yaw_degrees: -3.24,
            capture_quality: Some(0.5),
        };
        assert_eq!(summary.to_string(), "roll 12.0°, yaw -3.2°, quality 0.50");
        let no_quality = FaceOrientationSummary {
            capture_quality: None,
            ..summary
        };
        assert_eq!(no_quality.to_string(), "roll 12.0°, yaw -3.2°");
    }
}
