//! Strategy scores and MPAT classification

use super::conditioning::rescale_linear;
use serde::{Deserialize, Serialize};

/// Diagonal of the 100 × 100 condition plane, `√20000`
pub const MAX_DISTANCE: f64 = 141.421_356_237_309_5;

/// Minimum of `max(Adapt, Protect)` for inputs in [0, 100]
pub const ADAPT_PROTECT_FLOOR: f64 = 29.28932;

/// Scores at or above this mark a strong MPAT class
pub const STRONG_SCORE: f64 = 60.0;

/// The four PROMOTe management strategies, in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Monitor,
    Protect,
    Adapt,
    Transform,
}

impl Strategy {
    /// Every strategy; earlier entries win ties
    pub const ALL: [Strategy; 4] = [
        Strategy::Monitor,
        Strategy::Protect,
        Strategy::Adapt,
        Strategy::Transform,
    ];

    /// `(current, future)` corner the strategy scores highest at
    pub fn target(&self) -> (f64, f64) {
        match self {
            Strategy::Monitor => (100.0, 100.0),
            Strategy::Protect => (100.0, 0.0),
            Strategy::Adapt => (0.0, 100.0),
            Strategy::Transform => (0.0, 0.0),
        }
    }

    /// MPAT matrix code, 1..=4
    pub fn code(&self) -> u8 {
        match self {
            Strategy::Monitor => 1,
            Strategy::Protect => 2,
            Strategy::Adapt => 3,
            Strategy::Transform => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Monitor => "monitor",
            Strategy::Protect => "protect",
            Strategy::Adapt => "adapt",
            Strategy::Transform => "transform",
        }
    }

    /// Distance score: 100 at the target corner, 0 at the opposite one
    #[inline]
    pub fn score(&self, current: f64, future: f64) -> f64 {
        let (tx, ty) = self.target();
        let d = ((current - tx).powi(2) + (future - ty).powi(2)).sqrt();
        (100.0 * (1.0 - d / MAX_DISTANCE)).clamp(0.0, 100.0)
    }
}

/// All four scores in [`Strategy::ALL`] order
#[inline]
pub fn strategy_scores(current: f64, future: f64) -> [f64; 4] {
    Strategy::ALL.map(|s| s.score(current, future))
}

/// `max(Adapt, Protect)` stretched from `[ADAPT_PROTECT_FLOOR, 100]` onto [0, 100]
#[inline]
pub fn adapt_protect(adapt: f64, protect: f64) -> f64 {
    rescale_linear(adapt.max(protect), (ADAPT_PROTECT_FLOOR, 100.0), (0.0, 100.0)).clamp(0.0, 100.0)
}

/// Integrated Condition Score from the conditioned current value and the
/// Monitor score
#[inline]
pub fn integrated_condition(current: f64, monitor: f64) -> f64 {
    let avg = (current + monitor) / 2.0;
    if avg <= 10.0 {
        0.0
    } else if avg >= 85.0 {
        100.0
    } else {
        rescale_linear(avg, (10.0, 85.0), (0.0, 100.0))
    }
}

/// Winning strategy and its score; ties go to the earliest strategy
#[inline]
pub fn mpat_class(scores: &[f64; 4]) -> (Strategy, f64) {
    let mut best = 0;
    for i in 1..4 {
        if scores[i] > scores[best] {
            best = i;
        }
    }
    (Strategy::ALL[best], scores[best])
}

/// MPAT strength code `s·10 + (m ≥ 60)`
#[inline]
pub fn mpat_strength(strategy: Strategy, score: f64) -> u8 {
    strategy.code() * 10 + u8::from(score >= STRONG_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_corner_scenario() {
        assert_relative_eq!(Strategy::Monitor.score(100.0, 100.0), 100.0);
        assert_relative_eq!(Strategy::Monitor.score(0.0, 0.0), 0.0, epsilon = 1e-9);
        for s in Strategy::ALL {
            let v = s.score(50.0, 50.0);
            assert!((v - 50.0).abs() <= 5.0);
        }
        let centre = strategy_scores(50.0, 50.0);
        assert!(centre.iter().all(|&v| (v - centre[0]).abs() < 1e-12));
    }

    #[test]
    fn test_target_and_opposite_corners() {
        for s in Strategy::ALL {
            let (tx, ty) = s.target();
            assert!((s.score(tx, ty) - 100.0).abs() <= 0.01);
            assert!(s.score(100.0 - tx, 100.0 - ty).abs() <= 0.01);
        }
    }

    #[test]
    fn test_score_symmetry() {
        // Two points at distance 30 from the Protect corner
        let a = Strategy::Protect.score(70.0, 0.0);
        let b = Strategy::Protect.score(100.0, 30.0);
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_bounds() {
        let lower = 400.0 - 100.0 * (2.0 + 2.0_f64.sqrt()) / 2.0_f64.sqrt();
        for c in (0..=100).step_by(5) {
            for f in (0..=100).step_by(5) {
                let sum: f64 = strategy_scores(c as f64, f as f64).iter().sum();
                assert!(sum <= 200.0 + 1e-9, "({}, {}) sum {}", c, f, sum);
                assert!(sum >= lower - 1e-9, "({}, {}) sum {}", c, f, sum);
            }
        }
    }

    #[test]
    fn test_adapt_protect_floor() {
        let (a, p) = (Strategy::Adapt.score(0.0, 0.0), Strategy::Protect.score(0.0, 0.0));
        assert_relative_eq!(a.max(p), ADAPT_PROTECT_FLOOR, epsilon = 1e-4);
        assert!(adapt_protect(a, p) < 1e-3);
        assert_relative_eq!(adapt_protect(100.0, 10.0), 100.0);
        assert_eq!(adapt_protect(20.0, 10.0), 0.0);
    }

    #[test]
    fn test_integrated_condition_piecewise() {
        assert_eq!(integrated_condition(5.0, 10.0), 0.0);
        assert_eq!(integrated_condition(90.0, 90.0), 100.0);
        assert_relative_eq!(integrated_condition(47.5, 47.5), 50.0);
    }

    #[test]
    fn test_mpat_ties_and_strength() {
        assert_eq!(mpat_class(&[50.0, 50.0, 50.0, 50.0]).0, Strategy::Monitor);
        assert_eq!(mpat_class(&[10.0, 70.0, 70.0, 5.0]).0, Strategy::Protect);
        assert_eq!(mpat_class(&[10.0, 20.0, 30.0, 40.0]).0, Strategy::Transform);
        assert_eq!(mpat_strength(Strategy::Adapt, 59.9), 30);
        assert_eq!(mpat_strength(Strategy::Adapt, 60.0), 31);
        assert_eq!(mpat_strength(Strategy::Transform, 99.0), 41);
    }
}
