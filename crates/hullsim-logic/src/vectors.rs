//! 2D vector and axis-aligned bounding box types.
//!
//! World coordinates are y-up, in meters.

use serde::{Deserialize, Serialize};

/// 2D vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2f {
    pub x: f32,
    pub y: f32,
}

impl Vec2f {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    pub fn cross(&self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn square_length(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(&self) -> f32 {
        self.square_length().sqrt()
    }

    /// Unit vector, or zero for a zero-length vector.
    pub fn normalise(&self) -> Self {
        self.normalise_with_length(self.length())
    }

    /// Unit vector given a pre-computed length; zero when `length` is zero.
    pub fn normalise_with_length(&self, length: f32) -> Self {
        if length > 0.0 {
            Self {
                x: self.x / length,
                y: self.y / length,
            }
        } else {
            Self::ZERO
        }
    }

    /// Rotated 90° counter-clockwise.
    pub fn to_perpendicular(&self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Component-wise square, keeping the sign of each component.
    pub fn signed_square(&self) -> Self {
        Self {
            x: self.x * self.x.abs(),
            y: self.y * self.y.abs(),
        }
    }

    pub fn clamp(&self, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            x: self.x.clamp(min_x, max_x),
            y: self.y.clamp(min_y, max_y),
        }
    }

    pub fn distance(&self, other: Self) -> f32 {
        (*self - other).length()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2f {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::AddAssign for Vec2f {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl std::ops::Sub for Vec2f {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl std::ops::SubAssign for Vec2f {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl std::ops::Mul<f32> for Vec2f {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl std::ops::MulAssign<f32> for Vec2f {
    fn mul_assign(&mut self, scalar: f32) {
        self.x *= scalar;
        self.y *= scalar;
    }
}

impl std::ops::Div<f32> for Vec2f {
    type Output = Self;
    fn div(self, scalar: f32) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
        }
    }
}

impl std::ops::Neg for Vec2f {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Axis-aligned bounding box.
///
/// An empty box has `left > right`; extending it with a point makes it
/// degenerate at that point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Aabb {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Aabb {
    pub fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn empty() -> Self {
        Self {
            left: f32::MAX,
            right: f32::MIN,
            top: f32::MIN,
            bottom: f32::MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }

    pub fn extend_to(&mut self, point: Vec2f) {
        self.left = self.left.min(point.x);
        self.right = self.right.max(point.x);
        self.top = self.top.max(point.y);
        self.bottom = self.bottom.min(point.y);
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn center(&self) -> Vec2f {
        Vec2f::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn contains(&self, point: Vec2f) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.bottom && point.y <= self.top
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

/// Collection of bounding boxes produced by one simulation step,
/// one per external frontier.
#[derive(Debug, Clone, Default)]
pub struct AabbSet {
    aabbs: Vec<Aabb>,
}

impl AabbSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, aabb: Aabb) {
        self.aabbs.push(aabb);
    }

    pub fn clear(&mut self) {
        self.aabbs.clear();
    }

    pub fn len(&self) -> usize {
        self.aabbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aabbs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aabb> {
        self.aabbs.iter()
    }

    /// Union of all boxes in the set.
    pub fn union(&self) -> Aabb {
        let mut result = Aabb::empty();
        for aabb in &self.aabbs {
            if !aabb.is_empty() {
                result.extend_to(Vec2f::new(aabb.left, aabb.bottom));
                result.extend_to(Vec2f::new(aabb.right, aabb.top));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perpendicular_is_ccw() {
        let v = Vec2f::new(1.0, 0.0);
        assert_eq!(v.to_perpendicular(), Vec2f::new(0.0, 1.0));
        assert_eq!(v.cross(v.to_perpendicular()), 1.0);
    }

    #[test]
    fn test_normalise_zero_is_zero() {
        assert_eq!(Vec2f::ZERO.normalise(), Vec2f::ZERO);
        let n = Vec2f::new(3.0, 4.0).normalise();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_aabb_extend_and_union() {
        let mut a = Aabb::empty();
        assert!(a.is_empty());
        a.extend_to(Vec2f::new(1.0, 2.0));
        a.extend_to(Vec2f::new(-1.0, -3.0));
        assert_eq!(a, Aabb::new(-1.0, 1.0, 2.0, -3.0));
        assert!(a.contains(Vec2f::ZERO));

        let mut set = AabbSet::new();
        set.add(a);
        set.add(Aabb::new(5.0, 6.0, 10.0, 9.0));
        let u = set.union();
        assert_eq!(u, Aabb::new(-1.0, 6.0, 10.0, -3.0));
    }
}
