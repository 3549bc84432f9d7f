//! Axis labels, rotation orders and signed bone axes.

use std::fmt;
use std::str::FromStr;

use glam::{DMat3, DVec3};

/// One of the three cartesian axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (x = 0, y = 1, z = 2).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }

    /// Parse a single axis letter, case-insensitive.
    pub fn from_letter(c: char) -> Option<Axis> {
        match c.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            _ => None,
        }
    }

    /// Exchange `a` and `b`, leaving the third axis alone.
    fn swapped(self, a: Axis, b: Axis) -> Axis {
        if self == a {
            b
        } else if self == b {
            a
        } else {
            self
        }
    }
}

/// Error returned when an axis label or rotation order cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAxisError(pub String);

impl fmt::Display for ParseAxisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid axis '{}'", self.0)
    }
}

impl std::error::Error for ParseAxisError {}

/// Euler rotation order as three distinct axes, first axis applied first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RotationOrder(pub [Axis; 3]);

impl RotationOrder {
    pub const XYZ: RotationOrder = RotationOrder([Axis::X, Axis::Y, Axis::Z]);

    /// First letter of the order. For bones this is the axis the bone
    /// points along.
    pub fn dominant(&self) -> Axis {
        self.0[0]
    }

    fn swap(&self, a: Axis, b: Axis) -> RotationOrder {
        RotationOrder(self.0.map(|axis| axis.swapped(a, b)))
    }

    /// Relabel a source-space order for the output frame (Y and Z exchange
    /// places): XYZ -> XZY, YZX -> ZYX, ZXY -> YXZ and so on.
    pub fn to_output(&self) -> RotationOrder {
        self.swap(Axis::Y, Axis::Z)
    }

    /// Rotation order used for a bone's pose channels, derived from its
    /// output-space order. Bones along X swap X and Y, bones along Y keep the
    /// order, bones along Z swap Y and Z.
    pub fn pose_order(&self) -> RotationOrder {
        match self.dominant() {
            Axis::X => self.swap(Axis::X, Axis::Y),
            Axis::Y => *self,
            Axis::Z => self.swap(Axis::Y, Axis::Z),
        }
    }

    /// Rotation matrix for per-axis Euler angles (radians), applying the
    /// first axis of the order first.
    pub fn matrix(&self, angles: DVec3) -> DMat3 {
        self.0.iter().fold(DMat3::IDENTITY, |m, axis| {
            axis.rotation(angles[axis.index()]) * m
        })
    }
}

impl Axis {
    /// Rotation about this axis.
    pub fn rotation(self, angle: f64) -> DMat3 {
        match self {
            Axis::X => DMat3::from_rotation_x(angle),
            Axis::Y => DMat3::from_rotation_y(angle),
            Axis::Z => DMat3::from_rotation_z(angle),
        }
    }
}

impl Default for RotationOrder {
    fn default() -> Self {
        RotationOrder::XYZ
    }
}

impl FromStr for RotationOrder {
    type Err = ParseAxisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes: Vec<Axis> = s.chars().filter_map(Axis::from_letter).collect();
        if axes.len() != 3 || s.chars().count() != 3 {
            return Err(ParseAxisError(s.to_string()));
        }
        if axes[0] == axes[1] || axes[0] == axes[2] || axes[1] == axes[2] {
            return Err(ParseAxisError(s.to_string()));
        }
        Ok(RotationOrder([axes[0], axes[1], axes[2]]))
    }
}

impl fmt::Display for RotationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            write!(f, "{}", axis.letter())?;
        }
        Ok(())
    }
}

/// The signed axis a bone's tail points along in its rest frame
/// (`+X`, `-X`, `+Y`, `-Y`, `+Z`, `-Z`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AxisSign {
    pub axis: Axis,
    pub positive: bool,
}

impl AxisSign {
    pub fn new(axis: Axis, positive: bool) -> Self {
        Self { axis, positive }
    }

    /// +1.0 or -1.0
    pub fn factor(&self) -> f64 {
        if self.positive {
            1.0
        } else {
            -1.0
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AxisSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.positive { '+' } else { '-' };
        write!(f, "{}{}", sign, self.axis.letter())
    }
}

impl FromStr for AxisSign {
    type Err = ParseAxisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let positive = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(ParseAxisError(s.to_string())),
        };
        let axis = chars
            .next()
            .and_then(Axis::from_letter)
            .ok_or_else(|| ParseAxisError(s.to_string()))?;
        if chars.next().is_some() {
            return Err(ParseAxisError(s.to_string()));
        }
        Ok(AxisSign { axis, positive })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(s: &str) -> RotationOrder {
        s.parse().unwrap()
    }

    #[test]
    fn test_matrix_applies_first_axis_first() {
        let angles = DVec3::new(std::f64::consts::FRAC_PI_2, 0.0, std::f64::consts::FRAC_PI_2);
        // X first: +Y -> +Z, then Z leaves +Z alone.
        let m = order("XYZ").matrix(angles);
        assert!((m * DVec3::Y - DVec3::Z).length() < 1e-9);
        // Z first: +Y -> -X, then X leaves -X alone.
        let m = order("ZYX").matrix(angles);
        assert!((m * DVec3::Y + DVec3::X).length() < 1e-9);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(order("YZX").to_string(), "YZX");
        assert!("XXY".parse::<RotationOrder>().is_err());
        assert!("XY".parse::<RotationOrder>().is_err());
        assert!("XYW".parse::<RotationOrder>().is_err());
    }

    #[test]
    fn test_to_output_swaps_y_and_z_letters() {
        let table = [
            ("XYZ", "XZY"),
            ("XZY", "XYZ"),
            ("YXZ", "ZXY"),
            ("YZX", "ZYX"),
            ("ZXY", "YXZ"),
            ("ZYX", "YZX"),
        ];
        for (source, output) in table {
            assert_eq!(order(source).to_output(), order(output), "{source}");
        }
    }

    #[test]
    fn test_pose_order_per_dominant_axis() {
        // X: swap X and Y
        assert_eq!(order("XZY").pose_order(), order("YZX"));
        assert_eq!(order("XYZ").pose_order(), order("YXZ"));
        // Y: identity
        assert_eq!(order("YXZ").pose_order(), order("YXZ"));
        assert_eq!(order("YZX").pose_order(), order("YZX"));
        // Z: swap Y and Z
        assert_eq!(order("ZXY").pose_order(), order("YXZ"));
        assert_eq!(order("ZYX").pose_order(), order("YZX"));
    }

    #[test]
    fn test_axis_sign_labels() {
        for label in ["+X", "-X", "+Y", "-Y", "+Z", "-Z"] {
            let sign: AxisSign = label.parse().unwrap();
            assert_eq!(sign.label(), label);
        }
        assert!("X".parse::<AxisSign>().is_err());
        assert!("+Q".parse::<AxisSign>().is_err());
        assert_eq!(AxisSign::new(Axis::Y, false).factor(), -1.0);
    }
}
