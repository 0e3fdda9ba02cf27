//! Unit types for flows of water.
use serde::{Deserialize, Serialize};

/// A flow of water in megalitres per day (MLD).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
#[display("{_0:.2} MLD")]
#[serde(transparent)]
pub struct Mld(pub f64);

impl Mld {
    /// Returns the value of the flow as a f64.
    pub fn value(self) -> f64 {
        self.0
    }

    /// The smaller of two flows
    pub fn min(self, other: Mld) -> Mld {
        Mld(self.0.min(other.0))
    }

    /// The larger of two flows
    pub fn max(self, other: Mld) -> Mld {
        Mld(self.0.max(other.0))
    }
}

impl std::ops::Mul<f64> for Mld {
    type Output = Mld;

    fn mul(self, rhs: f64) -> Mld {
        Mld(self.0 * rhs)
    }
}

impl std::iter::Sum for Mld {
    fn sum<I: Iterator<Item = Mld>>(iter: I) -> Mld {
        Mld(iter.map(Mld::value).sum())
    }
}

impl float_cmp::ApproxEq for Mld {
    type Margin = float_cmp::F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        self.0.approx_eq(other.0, margin)
    }
}
