//! Fixed-point math utilities for deterministic simulation.
//!
//! All battle simulation uses fixed-point arithmetic so that two runs
//! fed the same data and the same Δt sequence produce bit-identical
//! state. Decimal values only exist at the data boundary (JSON/RON
//! files), where they are converted once.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
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

/// Convert a decimal from a data file into [`Fixed`].
///
/// Returns `None` for NaN, infinities and values outside the fixed range.
#[must_use]
pub fn from_decimal(value: f64) -> Option<Fixed> {
    Fixed::checked_from_num(value)
}

/// Serde support for fixed-point numbers.
///
/// Binary formats (bincode snapshots) carry the raw bit representation
/// (i64) to preserve exact precision. Human-readable formats (JSON data
/// files, RON config) carry a plain decimal.
pub mod fixed_serde {
    use super::{from_decimal, Fixed};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            value.to_num::<f64>().serialize(serializer)
        } else {
            value.to_bits().serialize(serializer)
        }
    }

    /// Deserialize a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let decimal = f64::deserialize(deserializer)?;
            from_decimal(decimal)
                .ok_or_else(|| D::Error::custom(format!("{decimal} is out of fixed-point range")))
        } else {
            let bits = i64::deserialize(deserializer)?;
            Ok(Fixed::from_bits(bits))
        }
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Same encoding as [`fixed_serde`], preserving `None` as a serialized
/// `None` value.
pub mod option_fixed_serde {
    use super::{from_decimal, Fixed};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) if serializer.is_human_readable() => {
                serializer.serialize_some(&v.to_num::<f64>())
            }
            Some(v) => serializer.serialize_some(&v.to_bits()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            match Option::<f64>::deserialize(deserializer)? {
                Some(decimal) => from_decimal(decimal).map(Some).ok_or_else(|| {
                    D::Error::custom(format!("{decimal} is out of fixed-point range"))
                }),
                None => Ok(None),
            }
        } else {
            let opt = Option::<i64>::deserialize(deserializer)?;
            Ok(opt.map(Fixed::from_bits))
        }
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
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

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
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
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Move from `self` towards `target` by at most `max_step`.
    ///
    /// Returns the new point and the distance actually travelled. Never
    /// overshoots: when `target` is within `max_step` the result is
    /// exactly `target`.
    #[must_use]
    pub fn step_towards(self, target: Self, max_step: Fixed) -> (Self, Fixed) {
        let offset = target - self;
        let dist = offset.length();
        if dist <= max_step {
            return (target, dist);
        }
        if max_step <= Fixed::ZERO {
            return (self, Fixed::ZERO);
        }
        let step = Self::new(
            offset.x.saturating_mul(max_step) / dist,
            offset.y.saturating_mul(max_step) / dist,
        );
        (self + step, max_step)
    }
}

/// Computes the square root of a non-negative fixed-point number.
///
/// Works on the raw bits with an integer square root, so the result is
/// exact whenever the input is a perfect square (e.g. `25 -> 5`) and is
/// otherwise the largest representable value not exceeding the true root.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    // value = bits / 2^32, so sqrt(value) * 2^32 = sqrt(bits * 2^32).
    let scaled = u128::from(value.to_bits().unsigned_abs()) << Fixed::FRAC_NBITS;
    let root = isqrt(scaled);
    Fixed::from_bits(i64::try_from(root).unwrap_or(i64::MAX))
}

/// Integer floor square root (Newton's method).
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
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

impl std::ops::Mul<Fixed> for Vec2Fixed {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}
