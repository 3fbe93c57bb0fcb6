use serde::{Deserialize, Serialize};

/// Radial symmetry never goes above this many folds.
pub const MAX_FOLDS: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymmetryKind {
    /// Mirror image across the axis line `x = axis.x`, the left/right
    /// symmetry of a face.  Draws the same copy as `Horizontal`.
    #[default]
    Bilateral,
    /// Left↔Right across the vertical line `x = axis.x`.
    Horizontal,
    /// Top↔Bottom across the horizontal line `y = axis.y`.
    Vertical,
    /// Rotated copies around the axis centre.
    Radial,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct SymmetryAxis {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetrySettings {
    #[serde(rename = "type")]
    pub kind: SymmetryKind,
    pub fold_count: u32,
    pub axis: SymmetryAxis,
}

impl Default for SymmetrySettings {
    fn default() -> Self {
        Self {
            kind: SymmetryKind::Bilateral,
            fold_count: 6,
            axis: SymmetryAxis::default(),
        }
    }
}

/// One mirror copy: an optional reflection across the axis lines followed
/// by a rotation around the axis point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorTransform {
    flip_x: bool,
    flip_y: bool,
    /// Radians, clockwise in canvas space (y down).
    angle: f32,
    ax: f32,
    ay: f32,
}

impl MirrorTransform {
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let mut dx = x - self.ax;
        let mut dy = y - self.ay;
        if self.flip_x {
            dx = -dx;
        }
        if self.flip_y {
            dy = -dy;
        }
        if self.angle != 0.0 {
            let (s, c) = self.angle.sin_cos();
            let rx = dx * c - dy * s;
            let ry = dx * s + dy * c;
            dx = rx;
            dy = ry;
        }
        (self.ax + dx, self.ay + dy)
    }

    /// Extra rotation a shape drawn through this transform picks up.
    /// Reflections of the axis-aligned primitives we draw are themselves
    /// axis-aligned, so only radial copies rotate.
    pub fn rotation(&self) -> f32 {
        self.angle
    }
}

impl SymmetrySettings {
    pub fn folds(&self) -> u32 {
        self.fold_count.clamp(2, MAX_FOLDS)
    }

    /// The mirror copies to apply in addition to the original operation.
    pub fn transforms(&self) -> Vec<MirrorTransform> {
        let base = MirrorTransform {
            flip_x: false,
            flip_y: false,
            angle: 0.0,
            ax: self.axis.x,
            ay: self.axis.y,
        };
        match self.kind {
            SymmetryKind::Bilateral | SymmetryKind::Horizontal => {
                vec![MirrorTransform { flip_x: true, ..base }]
            }
            SymmetryKind::Vertical => vec![MirrorTransform { flip_y: true, ..base }],
            SymmetryKind::Radial => {
                let n = self.folds();
                (1..n)
                    .map(|k| MirrorTransform {
                        angle: std::f32::consts::TAU * k as f32 / n as f32,
                        ..base
                    })
                    .collect()
            }
        }
    }

    /// Mirrored copies of `(x, y)` (the original point is not included).
    pub fn mirror_points(&self, x: f32, y: f32) -> Vec<(f32, f32)> {
        self.transforms().iter().map(|t| t.apply(x, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: SymmetryKind, folds: u32) -> SymmetrySettings {
        SymmetrySettings {
            kind,
            fold_count: folds,
            axis: SymmetryAxis { x: 50.0, y: 40.0 },
        }
    }

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
    }

    #[test]
    fn reflections() {
        assert_eq!(
            settings(SymmetryKind::Horizontal, 0).mirror_points(10.0, 5.0),
            vec![(90.0, 5.0)]
        );
        assert_eq!(
            settings(SymmetryKind::Vertical, 0).mirror_points(10.0, 5.0),
            vec![(10.0, 75.0)]
        );
        assert_eq!(
            settings(SymmetryKind::Bilateral, 0).mirror_points(10.0, 5.0),
            vec![(90.0, 5.0)]
        );
    }

    #[test]
    fn bilateral_is_a_mirror_not_a_half_turn() {
        let mirror = settings(SymmetryKind::Bilateral, 0);
        let half_turn = settings(SymmetryKind::Radial, 2);
        assert_ne!(mirror.mirror_points(60.0, 30.0), half_turn.mirror_points(60.0, 30.0));
        // Points on the mirror line map to themselves
        assert_eq!(mirror.mirror_points(50.0, 7.0), vec![(50.0, 7.0)]);
    }

    #[test]
    fn radial_adds_n_minus_one_rotations() {
        let pts = settings(SymmetryKind::Radial, 4).mirror_points(60.0, 40.0);
        assert_eq!(pts.len(), 3);
        assert!(close(pts[0], (50.0, 50.0)));
        assert!(close(pts[1], (40.0, 40.0)));
        assert!(close(pts[2], (50.0, 30.0)));
    }

    #[test]
    fn fold_count_is_clamped() {
        assert_eq!(settings(SymmetryKind::Radial, 0).mirror_points(0.0, 0.0).len(), 1);
        assert_eq!(
            settings(SymmetryKind::Radial, 1000).mirror_points(0.0, 0.0).len(),
            MAX_FOLDS as usize - 1
        );
    }
}
