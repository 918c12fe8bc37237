//! `rigpose-types` – shared wire types for the rigpose workspace.
//!
//! Input records come from a capture log written by the rig controller; output
//! poses are what the resolver hands to the HTTP layer.  Positions on the wire
//! are always millimeters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row-major 3×3 matrix as it appears on the wire.
pub type Matrix3Rows = [[f64; 3]; 3];

/// The 3×3 identity in wire form.
pub const IDENTITY_ROWS: Matrix3Rows = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// One end-effector's reported state, relative to its own arm's base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectorSample {
    /// Orientation of the gripper in the arm's base frame.
    pub rotation_matrix: Matrix3Rows,
    /// Gripper position in the arm's base frame, millimeters.
    pub position: [f64; 3],
    /// Joint angles in degrees, as reported by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servo_angles: Option<Vec<f64>>,
}

/// One entry of the capture log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    #[serde(rename = "id")]
    pub frame_id: i64,
    pub camera: EffectorSample,
    /// Absent for datasets captured without an active light arm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<EffectorSample>,
}

/// World-frame pose of a single end-effector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectorPose {
    /// Tool position in the world frame, millimeters.
    pub position: [f64; 3],
    /// Tool orientation in the world frame.
    pub rotation: Matrix3Rows,
    /// Raw gripper position re-expressed in the world frame, millimeters.
    pub gripper_position: [f64; 3],
    /// First six joint angles, degrees.
    pub servo_angles: Vec<f64>,
}

/// Both end-effector poses for one captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FramePose {
    pub frame_id: i64,
    pub camera: EffectorPose,
    pub light: EffectorPose,
}

/// Which arm a record-level error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effector {
    Camera,
    Light,
}

impl std::fmt::Display for Effector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effector::Camera => write!(f, "camera"),
            Effector::Light => write!(f, "light"),
        }
    }
}

/// Global error type for capture-log resolution and the layers around it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RigError {
    #[error("Malformed record #{index} (frame {frame_id}): {reason}")]
    MalformedRecord {
        index: usize,
        frame_id: i64,
        reason: String,
    },

    #[error("Record #{index} could not be parsed: {reason}")]
    UnparseableRecord { index: usize, reason: String },

    #[error("Invalid {effector} rotation in record #{index} (frame {frame_id}): {reason}")]
    InvalidRotation {
        index: usize,
        frame_id: i64,
        effector: Effector,
        reason: String,
    },

    #[error("Capture log error: {0}")]
    CaptureLog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_record_reads_id_key() {
        let json = r#"{
            "id": 7,
            "camera": {
                "rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]],
                "position": [100, 200.5, 300],
                "servo_angles": [1, 2, 3, 4, 5, 6, 7]
            }
        }"#;
        let record: CaptureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.frame_id, 7);
        assert_eq!(record.camera.rotation_matrix, IDENTITY_ROWS);
        assert_eq!(record.camera.position, [100.0, 200.5, 300.0]);
        assert_eq!(record.camera.servo_angles.as_ref().map(Vec::len), Some(7));
        assert!(record.light.is_none());
    }

    #[test]
    fn capture_record_ignores_unknown_keys() {
        let json = r#"{
            "id": 1,
            "timestamp": "2024-01-01T00:00:00Z",
            "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [0,0,0], "quat": [1,0,0,0]}
        }"#;
        let record: CaptureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.frame_id, 1);
        assert!(record.camera.servo_angles.is_none());
    }

    #[test]
    fn capture_record_without_camera_is_rejected() {
        let json = r#"{"id": 3, "light": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [0,0,0]}}"#;
        let err = serde_json::from_str::<CaptureRecord>(json).unwrap_err();
        assert!(err.to_string().contains("camera"));
    }

    #[test]
    fn short_position_is_rejected() {
        let json = r#"{"id": 3, "camera": {"rotation_matrix": [[1,0,0],[0,1,0],[0,0,1]], "position": [0,0]}}"#;
        assert!(serde_json::from_str::<CaptureRecord>(json).is_err());
    }

    #[test]
    fn non_numeric_rotation_is_rejected() {
        let json = r#"{"id": 3, "camera": {"rotation_matrix": [["a",0,0],[0,1,0],[0,0,1]], "position": [0,0,0]}}"#;
        assert!(serde_json::from_str::<CaptureRecord>(json).is_err());
    }

    #[test]
    fn frame_pose_serializes_nested_effectors() {
        let pose = EffectorPose {
            position: [0.0, 300.0, 400.0],
            rotation: IDENTITY_ROWS,
            gripper_position: [0.0, 300.0, 400.0],
            servo_angles: vec![0.0; 6],
        };
        let frame = FramePose {
            frame_id: 12,
            camera: pose.clone(),
            light: pose,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["frame_id"], 12);
        assert_eq!(value["light"]["position"][1], 300.0);
        assert_eq!(value["camera"]["servo_angles"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn frame_pose_schema_lists_effectors() {
        let schema = schemars::schema_for!(FramePose);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("gripper_position"));
        assert!(json.contains("frame_id"));
    }

    #[test]
    fn rig_error_display() {
        let err = RigError::MalformedRecord {
            index: 4,
            frame_id: 9,
            reason: "non-finite position".to_string(),
        };
        assert!(err.to_string().contains("#4"));
        assert!(err.to_string().contains("frame 9"));

        let err = RigError::InvalidRotation {
            index: 0,
            frame_id: 1,
            effector: Effector::Light,
            reason: "determinant 2".to_string(),
        };
        assert!(err.to_string().contains("light rotation"));
    }
}
