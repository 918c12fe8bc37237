//! Length unit conversion between the capture log and the transform chain.
//!
//! The rig controller reports millimeters; calibration constants and the
//! composed transforms are in meters.

use nalgebra::Vector3;

/// Millimeters per meter.
pub const MM_PER_M: f64 = 1000.0;

/// Convert a millimeter position into meters, component-wise `v / 1000`.
pub fn mm_to_m(position_mm: &[f64; 3]) -> Vector3<f64> {
    Vector3::new(
        position_mm[0] / MM_PER_M,
        position_mm[1] / MM_PER_M,
        position_mm[2] / MM_PER_M,
    )
}

/// Convert a meter vector back into millimeters, component-wise `v * 1000`.
pub fn m_to_mm(position_m: &Vector3<f64>) -> [f64; 3] {
    [
        position_m.x * MM_PER_M,
        position_m.y * MM_PER_M,
        position_m.z * MM_PER_M,
    ]
}
