//! 2D vector math and facing used across the simulation.

use std::ops::{Add, Mul, Sub};

/// A 2D point or displacement, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Builds a vector from components.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: Self) -> f32 {
        (*self - other).length()
    }

    /// Squared euclidean distance to `other`; avoids a sqrt when only
    /// ordering/threshold comparisons are needed.
    #[must_use]
    pub fn distance_sq(&self, other: Self) -> f32 {
        let d = *self - other;
        d.x * d.x + d.y * d.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns a unit-length copy, or `fallback` if this vector is (near)
    /// zero length.
    #[must_use]
    pub fn normalized_or(&self, fallback: Self) -> Self {
        let len = self.length();
        if len < f32::EPSILON {
            fallback
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Clamps each component into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, min: Self, max: Self) -> Self {
        Self::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Facing direction, derived from a movement or aim delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Facing {
    /// Facing away from the camera / +y.
    #[default]
    Down,
    /// Facing toward the camera / -y.
    Up,
    /// Facing -x.
    Left,
    /// Facing +x.
    Right,
}

/// Derives the facing that best matches delta `(dx, dy)`.
///
/// Ties prefer the horizontal axis. A zero delta returns `Down` via
/// [`Facing::default`].
#[must_use]
pub fn derive_facing(dx: f32, dy: f32) -> Facing {
    if dx == 0.0 && dy == 0.0 {
        return Facing::default();
    }
    if dx.abs() >= dy.abs() {
        if dx >= 0.0 {
            Facing::Right
        } else {
            Facing::Left
        }
    } else if dy > 0.0 {
        Facing::Down
    } else {
        Facing::Up
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.distance(a), 5.0);
    }

    #[test]
    fn derive_facing_prefers_horizontal_on_tie() {
        assert_eq!(derive_facing(5.0, 5.0), Facing::Right);
        assert_eq!(derive_facing(-5.0, 5.0), Facing::Left);
    }

    #[test]
    fn derive_facing_vertical() {
        assert_eq!(derive_facing(0.0, 5.0), Facing::Down);
        assert_eq!(derive_facing(0.0, -5.0), Facing::Up);
    }
}
