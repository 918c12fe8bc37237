//! Calibration constants and resolver configuration.
//!
//! The defaults are the offline-measured values for the HCI capture rig and
//! must stay bit-identical to the recorded datasets.  A deployment may replace
//! them through the `[resolver.calibration]` table of the config file.

use nalgebra::Vector3;
use rigpose_geometry::RigidTransform;
use rigpose_geometry::transform::matrix_from_rows;
use rigpose_types::{IDENTITY_ROWS, Matrix3Rows};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Default constants
// ─────────────────────────────────────────────────────────────────────────────

/// Camera optical frame expressed in the camera arm's gripper frame.
pub const CAMERA_TO_GRIPPER_ROTATION: Matrix3Rows = [
    [-7.17667595e-04, 9.99776474e-01, 2.11302413e-02],
    [-4.42126179e-03, 2.11268680e-02, -9.99767027e-01],
    [-9.99989969e-01, -8.10922726e-04, 4.40511146e-03],
];
pub const CAMERA_TO_GRIPPER_TRANSLATION: [f64; 3] =
    [3.26272696e-02, -1.61560433e-02, 2.80920856e-02];

/// Light frame expressed in the light arm's gripper frame.
pub const LIGHT_TO_GRIPPER_ROTATION: Matrix3Rows = IDENTITY_ROWS;
pub const LIGHT_TO_GRIPPER_TRANSLATION: [f64; 3] = [0.0, -0.102, 0.02112];

/// Light arm base expressed in the camera arm base (the world frame).
pub const BASE2_TO_BASE1_ROTATION: Matrix3Rows = [
    [9.99999959e-01, 2.33227594e-04, -1.69051819e-04],
    [-2.36740680e-04, 9.99777598e-01, -2.10878871e-02],
    [1.64095944e-04, 2.10879262e-02, 9.99777611e-01],
];
pub const BASE2_TO_BASE1_TRANSLATION: [f64; 3] = [7.22042468e-03, 8.26339062e-03, 3.93500345e-03];

/// Light position used when a record carries no light sample, millimeters.
pub const DEFAULT_LIGHT_POSITION_MM: [f64; 3] = [0.0, 300.0, 400.0];

/// Tolerance used by the opt-in rotation check.
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 1e-6;

// ─────────────────────────────────────────────────────────────────────────────
// Config types
// ─────────────────────────────────────────────────────────────────────────────

/// A rotation + translation pair in meters, as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    pub rotation: Matrix3Rows,
    pub translation: [f64; 3],
}

impl TransformConfig {
    pub fn to_transform(&self) -> RigidTransform {
        RigidTransform::from_parts(
            &matrix_from_rows(&self.rotation),
            &Vector3::new(self.translation[0], self.translation[1], self.translation[2]),
        )
    }
}

/// The three fixed transforms of the rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_camera_to_gripper")]
    pub camera_to_gripper: TransformConfig,
    #[serde(default = "default_light_to_gripper")]
    pub light_to_gripper: TransformConfig,
    #[serde(default = "default_base2_to_base1")]
    pub base2_to_base1: TransformConfig,
}

fn default_camera_to_gripper() -> TransformConfig {
    TransformConfig {
        rotation: CAMERA_TO_GRIPPER_ROTATION,
        translation: CAMERA_TO_GRIPPER_TRANSLATION,
    }
}
fn default_light_to_gripper() -> TransformConfig {
    TransformConfig {
        rotation: LIGHT_TO_GRIPPER_ROTATION,
        translation: LIGHT_TO_GRIPPER_TRANSLATION,
    }
}
fn default_base2_to_base1() -> TransformConfig {
    TransformConfig {
        rotation: BASE2_TO_BASE1_ROTATION,
        translation: BASE2_TO_BASE1_TRANSLATION,
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            camera_to_gripper: default_camera_to_gripper(),
            light_to_gripper: default_light_to_gripper(),
            base2_to_base1: default_base2_to_base1(),
        }
    }
}

impl Calibration {
    /// All three transforms set to identity.  Used to check the pipeline's
    /// unit handling in isolation.
    pub fn identity() -> Self {
        let identity = TransformConfig {
            rotation: IDENTITY_ROWS,
            translation: [0.0; 3],
        };
        Self {
            camera_to_gripper: identity,
            light_to_gripper: identity,
            base2_to_base1: identity,
        }
    }

    /// Build the homogeneous transforms once.
    pub fn chain(&self) -> CalibrationChain {
        CalibrationChain {
            camera_to_gripper: self.camera_to_gripper.to_transform(),
            light_to_gripper: self.light_to_gripper.to_transform(),
            base2_to_base1: self.base2_to_base1.to_transform(),
        }
    }
}

/// Calibration in homogeneous form, ready for composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationChain {
    pub camera_to_gripper: RigidTransform,
    pub light_to_gripper: RigidTransform,
    pub base2_to_base1: RigidTransform,
}

/// What to emit for the light when a record has no light sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MissingLightPolicy {
    /// Substitute a fixed pose: identity rotation at `position` (mm).
    FixedPose { position: [f64; 3] },
    /// Treat a missing light sample as a malformed record.
    Reject,
}

impl Default for MissingLightPolicy {
    fn default() -> Self {
        MissingLightPolicy::FixedPose {
            position: DEFAULT_LIGHT_POSITION_MM,
        }
    }
}

/// Everything the [`PoseResolver`][crate::PoseResolver] needs besides its
/// capture source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub missing_light: MissingLightPolicy,

    /// Reject records whose rotation matrices are not proper rotations.
    #[serde(default)]
    pub validate_rotations: bool,

    #[serde(default = "default_rotation_tolerance")]
    pub rotation_tolerance: f64,
}

fn default_rotation_tolerance() -> f64 {
    DEFAULT_ROTATION_TOLERANCE
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            missing_light: MissingLightPolicy::default(),
            validate_rotations: false,
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_embeds_literal_constants() {
        let chain = Calibration::default().chain();
        let m = chain.camera_to_gripper.matrix();
        assert_eq!(m[(0, 0)], -7.17667595e-04);
        assert_eq!(m[(1, 2)], -9.99767027e-01);
        assert_eq!(m[(2, 3)], 2.80920856e-02);

        let b = chain.base2_to_base1.matrix();
        assert_eq!(b[(0, 0)], 9.99999959e-01);
        assert_eq!(b[(2, 1)], 2.10879262e-02);
        assert_eq!(b[(1, 3)], 8.26339062e-03);
        assert_eq!(b[(3, 3)], 1.0);

        let l = chain.light_to_gripper.translation();
        assert_eq!(l.y, -0.102);
        assert_eq!(l.z, 0.02112);
    }

    #[test]
    fn default_calibration_rotations_are_nearly_orthonormal() {
        let chain = Calibration::default().chain();
        assert!(chain.camera_to_gripper.check_rotation(1e-6).is_ok());
        assert!(chain.base2_to_base1.check_rotation(1e-6).is_ok());
        assert!(chain.light_to_gripper.check_rotation(0.0).is_ok());
    }

    #[test]
    fn missing_light_policy_defaults_to_fixed_pose() {
        assert_eq!(
            MissingLightPolicy::default(),
            MissingLightPolicy::FixedPose {
                position: [0.0, 300.0, 400.0]
            }
        );
    }

    #[test]
    fn resolver_config_fills_defaults_from_empty_json() {
        let cfg: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ResolverConfig::default());
    }

    #[test]
    fn resolver_config_reads_reject_policy_and_partial_calibration() {
        let json = r#"{
            "missing_light": {"mode": "reject"},
            "validate_rotations": true,
            "calibration": {
                "light_to_gripper": {
                    "rotation": [[1,0,0],[0,1,0],[0,0,1]],
                    "translation": [0.0, -0.1, 0.0]
                }
            }
        }"#;
        let cfg: ResolverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.missing_light, MissingLightPolicy::Reject);
        assert!(cfg.validate_rotations);
        assert_eq!(cfg.calibration.light_to_gripper.translation, [0.0, -0.1, 0.0]);
        assert_eq!(
            cfg.calibration.camera_to_gripper,
            Calibration::default().camera_to_gripper
        );
    }
}
