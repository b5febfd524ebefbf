use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub};

/// 2D vector in world units
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalize(self) -> Self {
        match self.length() {
            len if len > 0.0 => self * len.recip(),
            _ => Self::ZERO,
        }
    }

    #[inline]
    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn distance_to(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    /// `t = 0` gives `self`, `t = 1` gives `other`
    #[inline]
    pub fn lerp(self, other: Vec2, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Closest point to `point` on the segment `from..to`
    pub fn closest_point_on_segment(from: Vec2, to: Vec2, point: Vec2) -> Vec2 {
        let segment = to - from;
        let len_sq = segment.length_sq();
        if len_sq == 0.0 {
            return from;
        }
        from.lerp(to, ((point - from).dot(segment) / len_sq).clamp(0.0, 1.0))
    }

    /// Truncate toward zero to integer world coordinates for the wire
    #[inline]
    pub fn to_wire(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    pub fn approx_eq(self, other: Vec2, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

macro_rules! componentwise {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt) => {
        impl $trait for Vec2 {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: Self) -> Self {
                Self::new(self.x $op rhs.x, self.y $op rhs.y)
            }
        }

        impl $assign_trait for Vec2 {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }
    };
}

componentwise!(Add, add, AddAssign, add_assign, +);

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}
