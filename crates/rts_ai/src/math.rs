//! Fixed-point math utilities for deterministic decision making.
//!
//! Every distance, score and offset the AI computes goes through fixed-point
//! arithmetic so that two hosts evaluating the same snapshot emit the same
//! commands bit for bit.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all AI math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Build a fixed-point value from an integer ratio.
///
/// Returns zero when `den` is zero so tunables never divide by zero.
#[must_use]
pub fn ratio(num: i64, den: i64) -> Fixed {
    if den == 0 {
        return Fixed::ZERO;
    }
    Fixed::from_num(num) / Fixed::from_num(den)
}

/// Build a fixed-point value from whole world units.
#[must_use]
pub fn units(n: i32) -> Fixed {
    Fixed::from_num(n)
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole world units.
    #[must_use]
    pub fn from_units(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Whether `other` lies within `radius` (inclusive).
    #[must_use]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= radius.saturating_mul(radius)
    }

    /// Squared length of the vector.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x.saturating_mul(other.x) + self.y.saturating_mul(other.y)
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(
            self.x.saturating_mul(factor),
            self.y.saturating_mul(factor),
        )
    }

    /// Vector rotated 90 degrees counter-clockwise.
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Point `distance` units from `self`, heading away from `from`.
    ///
    /// Falls back to `fallback_dir` when the two points coincide.
    #[must_use]
    pub fn away_from(self, from: Self, distance: Fixed, fallback_dir: Self) -> Self {
        let mut dir = (self - from).normalize();
        if dir == Self::ZERO {
            dir = fallback_dir.normalize();
        }
        self + dir.scale(distance)
    }

    /// Clamp the vector into the rectangle `[min, max]`.
    #[must_use]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }
}

/// Average of a set of points, or `None` if there are none.
#[must_use]
pub fn centroid<I>(points: I) -> Option<Vec2Fixed>
where
    I: IntoIterator<Item = Vec2Fixed>,
{
    let mut sum_x = Fixed::ZERO;
    let mut sum_y = Fixed::ZERO;
    let mut count: i32 = 0;
    for p in points {
        sum_x = sum_x.saturating_add(p.x);
        sum_y = sum_y.saturating_add(p.y);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = Fixed::from_num(count);
    Some(Vec2Fixed::new(sum_x / n, sum_y / n))
}

/// Unit directions on a 16-point compass, in thousandths.
///
/// Used instead of trigonometry so sampled angles stay deterministic.
const COMPASS_MILLIS: [(i32, i32); 16] = [
    (1000, 0),
    (924, 383),
    (707, 707),
    (383, 924),
    (0, 1000),
    (-383, 924),
    (-707, 707),
    (-924, 383),
    (-1000, 0),
    (-924, -383),
    (-707, -707),
    (-383, -924),
    (0, -1000),
    (383, -924),
    (707, -707),
    (924, -383),
];

/// Number of entries in the compass table.
pub const COMPASS_POINTS: usize = COMPASS_MILLIS.len();

/// Unit vector for compass point `index` (wraps around).
#[must_use]
pub fn compass_direction(index: usize) -> Vec2Fixed {
    let (x, y) = COMPASS_MILLIS[index % COMPASS_POINTS];
    Vec2Fixed::new(ratio(i64::from(x), 1000), ratio(i64::from(y), 1000))
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
