//! Per-frame pose composition.
//!
//! Maps one [`CaptureRecord`] to one [`FramePose`].  The camera arm's base is
//! the world frame, so the camera branch only applies the hand-eye transform;
//! the light branch additionally left-multiplies by the base-to-base transform.
//!
//! ```text
//! world_from_camera = gripper_to_base1 · camera_to_gripper
//! world_from_light  = base2_to_base1 · (gripper_to_base2 · light_to_gripper)
//! ```

use rigpose_geometry::RigidTransform;
use rigpose_geometry::transform::{check_rotation, matrix_from_rows, matrix_to_rows};
use rigpose_geometry::units::{m_to_mm, mm_to_m};
use rigpose_types::{
    CaptureRecord, Effector, EffectorPose, EffectorSample, FramePose, IDENTITY_ROWS, RigError,
};

use crate::calibration::{CalibrationChain, MissingLightPolicy, ResolverConfig};

/// Number of joint angles kept in the output.
pub const SERVO_ANGLES_KEPT: usize = 6;

/// Length of the all-zero joint list assumed when a sample reports none.
pub const DEFAULT_SERVO_ANGLE_COUNT: usize = 7;

/// Keep at most the first six joint angles.
///
/// An absent list is treated as seven zeros.  A present list shorter than six
/// is returned as is.
pub fn servo_angles_or_default(angles: Option<&[f64]>) -> Vec<f64> {
    let default = [0.0; DEFAULT_SERVO_ANGLE_COUNT];
    let source = angles.unwrap_or(&default);
    source.iter().copied().take(SERVO_ANGLES_KEPT).collect()
}

/// Composes world-frame poses from capture records.
#[derive(Debug, Clone)]
pub struct PoseComposer {
    chain: CalibrationChain,
    missing_light: MissingLightPolicy,
    rotation_tolerance: Option<f64>,
}

impl PoseComposer {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            chain: config.calibration.chain(),
            missing_light: config.missing_light.clone(),
            rotation_tolerance: config.validate_rotations.then_some(config.rotation_tolerance),
        }
    }

    pub fn chain(&self) -> &CalibrationChain {
        &self.chain
    }

    /// Compose both end-effector poses for the record at position `index` of
    /// the log.
    pub fn compose(&self, index: usize, record: &CaptureRecord) -> Result<FramePose, RigError> {
        self.check_sample(index, record.frame_id, Effector::Camera, &record.camera)?;
        let camera = self.camera_pose(&record.camera);

        let light = match (&record.light, &self.missing_light) {
            (Some(sample), _) => {
                self.check_sample(index, record.frame_id, Effector::Light, sample)?;
                self.light_pose(sample)
            }
            (None, MissingLightPolicy::FixedPose { position }) => fixed_light_pose(*position),
            (None, MissingLightPolicy::Reject) => {
                return Err(RigError::MalformedRecord {
                    index,
                    frame_id: record.frame_id,
                    reason: "missing light sample".to_string(),
                });
            }
        };

        Ok(FramePose {
            frame_id: record.frame_id,
            camera,
            light,
        })
    }

    fn camera_pose(&self, sample: &EffectorSample) -> EffectorPose {
        let gripper_to_base1 = gripper_transform(sample);
        let world_from_camera = gripper_to_base1.compose(&self.chain.camera_to_gripper);

        EffectorPose {
            position: m_to_mm(&world_from_camera.translation()),
            rotation: matrix_to_rows(&world_from_camera.rotation()),
            // base1 is the world frame; the reported position needs no change.
            gripper_position: sample.position,
            servo_angles: servo_angles_or_default(sample.servo_angles.as_deref()),
        }
    }

    fn light_pose(&self, sample: &EffectorSample) -> EffectorPose {
        let gripper_to_base2 = gripper_transform(sample);
        let base2_from_light = gripper_to_base2.compose(&self.chain.light_to_gripper);
        let world_from_light = self.chain.base2_to_base1.compose(&base2_from_light);

        let gripper_world = self
            .chain
            .base2_to_base1
            .transform_point(&mm_to_m(&sample.position));

        EffectorPose {
            position: m_to_mm(&world_from_light.translation()),
            rotation: matrix_to_rows(&world_from_light.rotation()),
            gripper_position: m_to_mm(&gripper_world),
            servo_angles: servo_angles_or_default(sample.servo_angles.as_deref()),
        }
    }

    fn check_sample(
        &self,
        index: usize,
        frame_id: i64,
        effector: Effector,
        sample: &EffectorSample,
    ) -> Result<(), RigError> {
        if sample.position.iter().any(|v| !v.is_finite()) {
            return Err(RigError::MalformedRecord {
                index,
                frame_id,
                reason: format!("non-finite {effector} position {:?}", sample.position),
            });
        }
        if sample.rotation_matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(RigError::MalformedRecord {
                index,
                frame_id,
                reason: format!("non-finite {effector} rotation_matrix"),
            });
        }
        if let Some(tolerance) = self.rotation_tolerance {
            check_rotation(&matrix_from_rows(&sample.rotation_matrix), tolerance).map_err(|e| {
                RigError::InvalidRotation {
                    index,
                    frame_id,
                    effector,
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

/// Gripper pose in its arm's base frame, translated into meters.
fn gripper_transform(sample: &EffectorSample) -> RigidTransform {
    RigidTransform::from_parts(
        &matrix_from_rows(&sample.rotation_matrix),
        &mm_to_m(&sample.position),
    )
}

fn fixed_light_pose(position: [f64; 3]) -> EffectorPose {
    EffectorPose {
        position,
        rotation: IDENTITY_ROWS,
        gripper_position: position,
        servo_angles: vec![0.0; SERVO_ANGLES_KEPT],
    }
}
