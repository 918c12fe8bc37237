//! `rigpose-geometry` – rigid-body math for the imaging rig.
//!
//! # Modules
//!
//! - [`transform`] – [`RigidTransform`][transform::RigidTransform]: a 4×4
//!   homogeneous transform built from a rotation matrix and a translation,
//!   composed by matrix multiplication.
//! - [`units`] – millimeter/meter conversion used at the boundary between the
//!   capture log (mm) and the transform chain (m).

pub mod transform;
pub mod units;

pub use transform::{GeometryError, RigidTransform};
