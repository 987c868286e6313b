//! Fuzzy membership curves
//!
//! All curves map onto [0, 1]:
//! - **S** rises from 0 at `a` to 1 at `b`
//! - **Z** is the complement `1 − S`
//! - **Trapezoidal** rises on `[a, m1]`, holds 1 on `[m1, m2]` and falls on `[m2, b]`

use foresight_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Curve name as persisted in the normalization block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipKind {
    S,
    Z,
    Trapezoidal,
}

/// A membership curve with its endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Membership {
    S { a: f64, b: f64 },
    Z { a: f64, b: f64 },
    Trapezoidal { a: f64, m1: f64, m2: f64, b: f64 },
}

impl Membership {
    pub fn kind(&self) -> MembershipKind {
        match self {
            Membership::S { .. } => MembershipKind::S,
            Membership::Z { .. } => MembershipKind::Z,
            Membership::Trapezoidal { .. } => MembershipKind::Trapezoidal,
        }
    }

    pub fn endpoints(&self) -> Vec<f64> {
        match *self {
            Membership::S { a, b } | Membership::Z { a, b } => vec![a, b],
            Membership::Trapezoidal { a, m1, m2, b } => vec![a, m1, m2, b],
        }
    }

    /// Build a curve from its kind and endpoint list.
    ///
    /// S and Z take two endpoints, trapezoidal takes four. Endpoints must be
    /// finite and non-decreasing.
    pub fn from_parts(kind: MembershipKind, endpoints: &[f64]) -> Result<Self> {
        let expected = match kind {
            MembershipKind::S | MembershipKind::Z => 2,
            MembershipKind::Trapezoidal => 4,
        };
        if endpoints.len() != expected {
            return Err(Error::InvalidParameter {
                name: "endpoints",
                value: format!("{:?}", endpoints),
                reason: format!("{:?} membership takes {} endpoints", kind, expected),
            });
        }
        if endpoints.iter().any(|e| !e.is_finite()) || endpoints.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidParameter {
                name: "endpoints",
                value: format!("{:?}", endpoints),
                reason: "endpoints must be finite and non-decreasing".into(),
            });
        }

        Ok(match kind {
            MembershipKind::S => Membership::S {
                a: endpoints[0],
                b: endpoints[1],
            },
            MembershipKind::Z => Membership::Z {
                a: endpoints[0],
                b: endpoints[1],
            },
            MembershipKind::Trapezoidal => Membership::Trapezoidal {
                a: endpoints[0],
                m1: endpoints[1],
                m2: endpoints[2],
                b: endpoints[3],
            },
        })
    }

    /// Degree of membership of `x`
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            Membership::S { a, b } => s_shape(x, a, b),
            Membership::Z { a, b } => z_shape(x, a, b),
            Membership::Trapezoidal { a, m1, m2, b } => trapezoidal(x, a, m1, m2, b),
        }
    }
}

/// Ascending linear S curve
#[inline]
pub fn s_shape(x: f64, a: f64, b: f64) -> f64 {
    if a == b {
        return if x < a { 0.0 } else { 1.0 };
    }
    if x <= a {
        0.0
    } else if x >= b {
        1.0
    } else {
        (x - a) / (b - a)
    }
}

/// Descending Z curve, `1 − S`
#[inline]
pub fn z_shape(x: f64, a: f64, b: f64) -> f64 {
    1.0 - s_shape(x, a, b)
}

/// Trapezoid with feet at `a`, `b` and plateau `[m1, m2]`
#[inline]
pub fn trapezoidal(x: f64, a: f64, m1: f64, m2: f64, b: f64) -> f64 {
    if x < a || x > b {
        0.0
    } else if x < m1 {
        (x - a) / (m1 - a)
    } else if x <= m2 {
        1.0
    } else {
        (b - x) / (b - m2)
    }
}
