// Re-export glam for convenience
pub use glam::*;

// DSON math types
mod axis;
mod coords;
mod frame;

pub use axis::{Axis, AxisSign, ParseAxisError, RotationOrder};
pub use coords::{
    point_from_output, point_to_output, rotation_from_output, rotation_to_output,
    scale_to_output, CENTIMETERS_PER_METER,
};
pub use frame::{BoneAxis, BoneSegment, DEGENERATE_NUDGE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_creation() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_point_conversion_is_exported() {
        let p = point_to_output(DVec3::new(100.0, 200.0, 300.0));
        assert_eq!(p, DVec3::new(1.0, -3.0, 2.0));
    }
}
