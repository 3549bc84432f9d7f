//! Bone rest frames.
//!
//! A bone is laid out along a single signed axis of length
//! `|end - center|`, rotated by its orientation and moved to its center
//! point. All inputs are in output space.

use glam::{DMat3, DVec3};

use crate::axis::{Axis, AxisSign, RotationOrder};

/// Offset added to the end point's Z when a bone has zero length.
pub const DEGENERATE_NUDGE: f64 = 0.3;

/// Per-bone axis metadata, fixed when the bone is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoneAxis {
    /// Signed axis the bone's tail points along.
    pub sign: AxisSign,
    /// Rotation order for the bone's pose channels.
    pub pose_order: RotationOrder,
}

impl BoneAxis {
    /// Derive the signed axis and pose rotation order.
    ///
    /// `order` is the bone's output-space rotation order; its first letter
    /// picks the axis. The sign is positive when the end point lies further
    /// along that axis than the center point.
    pub fn derive(center: DVec3, end: DVec3, order: RotationOrder) -> BoneAxis {
        let (_, end) = nudge_degenerate(center, end);
        let axis = order.dominant();
        let i = axis.index();
        let positive = center[i] < end[i];
        BoneAxis {
            sign: AxisSign::new(axis, positive),
            pose_order: order.pose_order(),
        }
    }
}

/// Returns `(was_degenerate, end)` with the end point nudged along +Z when it
/// coincides with the center point.
pub(crate) fn nudge_degenerate(center: DVec3, end: DVec3) -> (bool, DVec3) {
    if center == end {
        (true, DVec3::new(end.x, end.y, end.z + DEGENERATE_NUDGE))
    } else {
        (false, end)
    }
}

/// Head/tail placement of one skeletal segment in armature space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneSegment {
    pub head: DVec3,
    pub tail: DVec3,
    /// Rest rotation applied to the axis-aligned bone.
    pub rest: DMat3,
    /// Set when the end point had to be nudged.
    pub degenerate: bool,
}

impl BoneSegment {
    /// Lay out a bone from its center, end point and orientation (radians,
    /// output axes) along `sign`.
    ///
    /// The orientation is applied as an Euler rotation in X, Z, Y order with
    /// the Y angle negated.
    pub fn build(center: DVec3, end: DVec3, orientation: DVec3, sign: AxisSign) -> BoneSegment {
        let (degenerate, end) = nudge_degenerate(center, end);
        let length = (center - end).length();

        let mut local_tail = DVec3::ZERO;
        local_tail[sign.axis.index()] = sign.factor() * length;

        let rest = Self::rest_rotation(orientation);
        BoneSegment {
            head: center,
            tail: rest * local_tail + center,
            rest,
            degenerate,
        }
    }

    /// `Ry(-o.y) * Rz(o.z) * Rx(o.x)`: X applied first, then Z, then Y.
    pub fn rest_rotation(orientation: DVec3) -> DMat3 {
        DMat3::from_rotation_y(-orientation.y)
            * DMat3::from_rotation_z(orientation.z)
            * DMat3::from_rotation_x(orientation.x)
    }

    pub fn length(&self) -> f64 {
        (self.tail - self.head).length()
    }

    /// Unit direction from head to tail.
    pub fn direction(&self) -> DVec3 {
        (self.tail - self.head).normalize_or_zero()
    }
}

impl Default for BoneAxis {
    fn default() -> Self {
        BoneAxis {
            sign: AxisSign::new(Axis::Y, true),
            pose_order: RotationOrder::XYZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn derive(center: [f64; 3], end: [f64; 3], source_order: &str) -> BoneAxis {
        let order: RotationOrder = source_order.parse().unwrap();
        BoneAxis::derive(
            DVec3::from_array(center),
            DVec3::from_array(end),
            order.to_output(),
        )
    }

    #[test]
    fn test_sign_positive_x() {
        // source XYZ -> output XZY, dominant X
        let b = derive([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], "XYZ");
        assert_eq!(b.sign.label(), "+X");
        assert_eq!(b.pose_order.to_string(), "YZX");
    }

    #[test]
    fn test_sign_negative_x() {
        let b = derive([0.0, 0.0, 0.0], [-1.0, 0.0, 0.0], "XZY");
        assert_eq!(b.sign.label(), "-X");
        assert_eq!(b.pose_order.to_string(), "YXZ");
    }

    #[test]
    fn test_sign_positive_y() {
        // source ZXY -> output YXZ, dominant Y
        let b = derive([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], "ZXY");
        assert_eq!(b.sign.label(), "+Y");
        assert_eq!(b.pose_order.to_string(), "YXZ");
    }

    #[test]
    fn test_sign_negative_y() {
        let b = derive([0.0, 0.5, 0.0], [0.0, 0.1, 0.0], "ZYX");
        assert_eq!(b.sign.label(), "-Y");
        assert_eq!(b.pose_order.to_string(), "YZX");
    }

    #[test]
    fn test_sign_positive_z() {
        // source YZX -> output ZYX, dominant Z
        let b = derive([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], "YZX");
        assert_eq!(b.sign.label(), "+Z");
        assert_eq!(b.pose_order.to_string(), "YZX");
    }

    #[test]
    fn test_sign_negative_z() {
        // source YXZ -> output ZXY, dominant Z
        let b = derive([0.0, 0.0, 1.0], [0.0, 0.0, 0.2], "YXZ");
        assert_eq!(b.sign.label(), "-Z");
        assert_eq!(b.pose_order.to_string(), "YXZ");
    }

    #[test]
    fn test_degenerate_bone_is_nudged() {
        let c = DVec3::new(0.1, 0.2, 0.3);
        let seg = BoneSegment::build(c, c, DVec3::ZERO, AxisSign::new(Axis::Z, true));
        assert!(seg.degenerate);
        assert!((seg.length() - DEGENERATE_NUDGE).abs() < EPS);
        assert!((seg.head - c).length() < EPS);

        // The nudge happens before the sign is decided.
        let b = BoneAxis::derive(c, c, "ZXY".parse().unwrap());
        assert_eq!(b.sign.label(), "+Z");
    }

    #[test]
    fn test_segment_unrotated() {
        let seg = BoneSegment::build(
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 2.0),
            DVec3::ZERO,
            AxisSign::new(Axis::Y, false),
        );
        assert!(!seg.degenerate);
        assert!((seg.head - DVec3::new(1.0, 0.0, 0.0)).length() < EPS);
        assert!((seg.tail - DVec3::new(1.0, -2.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_segment_rotated_about_z() {
        let seg = BoneSegment::build(
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            AxisSign::new(Axis::X, true),
        );
        assert!((seg.tail - DVec3::new(0.0, 1.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_rest_rotation_negates_y() {
        let m = BoneSegment::rest_rotation(DVec3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0));
        // Rotating +X about Y by -90 degrees points it along +Z.
        let v = m * DVec3::X;
        assert!((v - DVec3::Z).length() < EPS);
    }
}
