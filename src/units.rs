//! Typed volumes with tolerance-aware comparison.
//!
//! The full physical-quantity library (concentrations, flow rates, unit
//! conversion) is an external collaborator; planning only needs volumes,
//! so this module carries the thin interface the core consumes. All
//! volume arithmetic in the planner goes through this type so rounding
//! decisions live in exactly one place.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A liquid volume in microlitres.
///
/// Volumes compare with a fixed rounding tolerance: two volumes closer
/// than [`Volume::TOLERANCE_UL`] are considered equal, and volumes below
/// [`Volume::APPROX_ZERO_UL`] are treated as zero rather than emitted as
/// no-op transfers.
///
/// # Examples
///
/// ```
/// use aliquot::Volume;
///
/// let a = Volume::ul(100.0);
/// let b = Volume::ul(100.00001);
/// assert!(a.approx_eq(b));
/// assert!(!Volume::ul(0.0005).is_meaningful());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(f64);

impl Volume {
    /// Equality tolerance, in microlitres.
    pub const TOLERANCE_UL: f64 = 1e-4;

    /// Threshold below which a volume is treated as zero.
    pub const APPROX_ZERO_UL: f64 = 1e-3;

    /// The zero volume.
    pub const ZERO: Self = Self(0.0);

    /// Creates a volume from microlitres.
    #[must_use]
    pub const fn ul(v: f64) -> Self {
        Self(v)
    }

    /// Creates a volume from millilitres.
    #[must_use]
    pub fn ml(v: f64) -> Self {
        Self(v * 1000.0)
    }

    /// Returns the raw microlitre value.
    #[must_use]
    pub const fn as_ul(self) -> f64 {
        self.0
    }

    /// True if the two volumes are within the rounding tolerance.
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        (self.0 - other.0).abs() <= Self::TOLERANCE_UL
    }

    /// True if this volume is large enough to act on.
    ///
    /// Volumes below the approx-zero threshold are dropped by the
    /// decomposer instead of being emitted as no-op instructions.
    #[must_use]
    pub fn is_meaningful(self) -> bool {
        self.0 > Self::APPROX_ZERO_UL
    }

    /// True if this volume is negative beyond tolerance.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < -Self::TOLERANCE_UL
    }

    /// Tolerance-aware greater-than.
    #[must_use]
    pub fn definitely_greater(self, other: Self) -> bool {
        self.0 > other.0 + Self::TOLERANCE_UL
    }

    /// Tolerance-aware less-than.
    #[must_use]
    pub fn definitely_less(self, other: Self) -> bool {
        self.0 + Self::TOLERANCE_UL < other.0
    }

    /// The smaller of two volumes.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// The larger of two volumes.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Clamps a negative-within-tolerance volume to exactly zero.
    ///
    /// Running-volume threading can leave tiny negative residues from
    /// float subtraction; those are rounding noise, not overdrafts.
    #[must_use]
    pub fn clamp_zero(self) -> Self {
        if self.0 < 0.0 && !self.is_negative() {
            Self::ZERO
        } else {
            self
        }
    }
}

impl Add for Volume {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Volume {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Volume {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<f64> for Volume {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<f64> for Volume {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self(self.0 / rhs)
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ul", self.0)
    }
}

/// A flow rate in microlitres per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowRate(f64);

impl FlowRate {
    /// Creates a flow rate from microlitres per second.
    #[must_use]
    pub const fn ul_per_s(v: f64) -> Self {
        Self(v)
    }

    /// Returns the raw value in microlitres per second.
    #[must_use]
    pub const fn as_ul_per_s(self) -> f64 {
        self.0
    }

    /// The smaller of two flow rates.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// The larger of two flow rates.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ul/s", self.0)
    }
}
