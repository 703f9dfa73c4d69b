//! Three-vector used for hit positions, momenta and directions.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cartesian three-vector in detector coordinates (mm, or GeV for momenta).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CartesianVector {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component (beam axis).
    pub z: f32,
}

impl CartesianVector {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared magnitude.
    #[inline]
    #[must_use]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Magnitude.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> f32 {
        (*self - *other).magnitude_squared()
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction.
    ///
    /// The zero vector has no direction and is returned unchanged.
    #[must_use]
    pub fn unit_vector(&self) -> Self {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            *self * (1.0 / magnitude)
        } else {
            *self
        }
    }

    /// Cosine of the opening angle between two vectors, 0 if either is null.
    #[must_use]
    pub fn cos_opening_angle(&self, other: &Self) -> f32 {
        let magnitudes = self.magnitude() * other.magnitude();
        if magnitudes > 0.0 {
            (self.dot(other) / magnitudes).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Transverse (xy-plane) magnitude.
    #[inline]
    #[must_use]
    pub fn transverse(&self) -> f32 {
        self.x.hypot(self.y)
    }

    /// True if every component is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for CartesianVector {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for CartesianVector {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for CartesianVector {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for CartesianVector {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for CartesianVector {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}
