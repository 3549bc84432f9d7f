//! Conversion between the DSON source frame and the output frame.
//!
//! Source data is right-handed, Z-up and measured in centimeters. Output data
//! is right-handed, Y-up and measured in meters. Rotations are given in
//! degrees per source axis and come out in radians per output axis.

use glam::DVec3;

/// Source units per output unit.
pub const CENTIMETERS_PER_METER: f64 = 100.0;

/// Convert a source-space point (cm, Z-up) to output space (m, Y-up).
///
/// `(x, y, z) -> (x / 100, z / -100, y / 100)`
pub fn point_to_output(p: DVec3) -> DVec3 {
    DVec3::new(
        p.x / CENTIMETERS_PER_METER,
        p.z / -CENTIMETERS_PER_METER,
        p.y / CENTIMETERS_PER_METER,
    )
}

/// Inverse of [`point_to_output`].
pub fn point_from_output(p: DVec3) -> DVec3 {
    DVec3::new(
        p.x * CENTIMETERS_PER_METER,
        p.z * CENTIMETERS_PER_METER,
        -p.y * CENTIMETERS_PER_METER,
    )
}

/// Convert per-axis source rotation (degrees) to output radians.
///
/// Uses the same axis permutation as points but without any scaling or sign
/// flip: `(rx, ry, rz) -> (rad(rx), rad(rz), rad(ry))`.
pub fn rotation_to_output(r: DVec3) -> DVec3 {
    DVec3::new(r.x.to_radians(), r.z.to_radians(), r.y.to_radians())
}

/// Inverse of [`rotation_to_output`].
pub fn rotation_from_output(r: DVec3) -> DVec3 {
    DVec3::new(r.x.to_degrees(), r.z.to_degrees(), r.y.to_degrees())
}

/// Per-axis scale factors only swap Y and Z.
pub fn scale_to_output(s: DVec3) -> DVec3 {
    DVec3::new(s.x, s.z, s.y)
}
