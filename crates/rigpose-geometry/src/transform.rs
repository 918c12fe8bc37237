//! Rigid-body transforms in homogeneous form.
//!
//! A [`RigidTransform`] stores a 4×4 matrix whose top-left 3×3 block is a
//! rotation and whose top-right column is a translation.  `a.compose(b)` is the
//! plain matrix product `a · b`: if `a` = T_A_B and `b` = T_B_C the result is
//! T_A_C.  The product is not commutative, so call sites spell out the order.
//!
//! The builder does not check that the rotation block is orthonormal.  Use
//! [`check_rotation`] when the input comes from somewhere untrusted.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::{Matrix3, Vector3};
//! use rigpose_geometry::RigidTransform;
//!
//! // gripper is 0.1 m along +X of the arm base.
//! let base_from_gripper =
//!     RigidTransform::from_parts(&Matrix3::identity(), &Vector3::new(0.1, 0.0, 0.0));
//! // tool is 0.05 m along +Z of the gripper.
//! let gripper_from_tool =
//!     RigidTransform::from_parts(&Matrix3::identity(), &Vector3::new(0.0, 0.0, 0.05));
//!
//! let base_from_tool = base_from_gripper.compose(&gripper_from_tool);
//! assert!((base_from_tool.translation() - Vector3::new(0.1, 0.0, 0.05)).norm() < 1e-12);
//! ```

use std::ops::Mul;

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Errors raised by the optional rotation check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error(
        "matrix is not a rotation: max |RᵀR − I| = {orthogonality_error:.3e}, det = {determinant:.6}"
    )]
    NotARotation {
        orthogonality_error: f64,
        determinant: f64,
    },
}

/// Verify that `rotation` is orthonormal with determinant +1, within `tolerance`.
///
/// NaN entries always fail.
pub fn check_rotation(rotation: &Matrix3<f64>, tolerance: f64) -> Result<(), GeometryError> {
    let orthogonality_error = (rotation.transpose() * rotation - Matrix3::identity()).amax();
    let determinant = rotation.determinant();
    let orthonormal = orthogonality_error <= tolerance;
    let proper = (determinant - 1.0).abs() <= tolerance;
    if orthonormal && proper {
        Ok(())
    } else {
        Err(GeometryError::NotARotation {
            orthogonality_error,
            determinant,
        })
    }
}

/// Build a [`Matrix3`] from row-major nested arrays.
#[rustfmt::skip]
pub fn matrix_from_rows(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2],
        rows[1][0], rows[1][1], rows[1][2],
        rows[2][0], rows[2][1], rows[2][2],
    )
}

/// Flatten a [`Matrix3`] back into row-major nested arrays.
pub fn matrix_to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// RigidTransform
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body transform stored as a 4×4 homogeneous matrix.
///
/// Represents the pose of frame B relative to frame A: a point expressed in B
/// is mapped into A by rotating it with the rotation block and adding the
/// translation column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix4<f64>,
}

impl RigidTransform {
    /// Embed `rotation` and `translation` in a homogeneous matrix.
    ///
    /// Rotation fills the top-left 3×3 block, translation the top-right
    /// column, and the bottom row is `[0, 0, 0, 1]`.  Both arguments must use
    /// the same linear unit.
    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { matrix }
    }

    /// Same as [`from_parts`](Self::from_parts) but from wire-shaped arrays.
    pub fn from_rows(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> Self {
        Self::from_parts(
            &matrix_from_rows(rotation),
            &Vector3::new(translation[0], translation[1], translation[2]),
        )
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Compose two transforms: returns `self · other`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Rigid inverse `[Rᵀ | −Rᵀt]`.  Only meaningful for a valid rotation.
    pub fn inverse(&self) -> Self {
        let rt = self.rotation().transpose();
        let t = -(rt * self.translation());
        Self::from_parts(&rt, &t)
    }

    /// Map a point through the homogeneous matrix (`M · [p, 1]`).
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        let h = self.matrix * Vector4::new(point.x, point.y, point.z, 1.0);
        Vector3::new(h.x, h.y, h.z)
    }

    /// The top-left 3×3 block.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The top-right translation column.
    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// The underlying homogeneous matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Check the rotation block, see [`check_rotation`].
    pub fn check_rotation(&self, tolerance: f64) -> Result<(), GeometryError> {
        check_rotation(&self.rotation(), tolerance)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

impl Mul<&RigidTransform> for &RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: &RigidTransform) -> Self::Output {
        self.compose(rhs)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
