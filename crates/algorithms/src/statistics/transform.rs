//! Skew-correcting transformations
//!
//! Every transformation here is monotone non-decreasing, so percentiles and
//! outlier bounds can be carried across by transforming their values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Search interval for the power parameter of Box–Cox and Yeo–Johnson
const LAMBDA_BOUNDS: (f64, f64) = (-5.0, 5.0);

/// Largest number of values a λ fit looks at; longer samples are strided
const FIT_SAMPLE_LIMIT: usize = 100_000;

/// Name of a transformation as persisted in the normalization block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    None,
    Log,
    Sqrt,
    BoxCox,
    YeoJohnson,
}

impl TransformKind {
    /// Candidates in evaluation (and tie-break) order
    pub const CANDIDATES: [TransformKind; 4] = [
        TransformKind::Log,
        TransformKind::Sqrt,
        TransformKind::BoxCox,
        TransformKind::YeoJohnson,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::None => "none",
            TransformKind::Log => "log",
            TransformKind::Sqrt => "sqrt",
            TransformKind::BoxCox => "box-cox",
            TransformKind::YeoJohnson => "yeo-johnson",
        }
    }
}

/// Fitted parameters of a transformation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
}

/// Failure to fit a transformation to a sample
#[derive(Debug, Clone, Error)]
#[error("{} fit failed: {reason}", kind.name())]
pub struct FitError {
    pub kind: TransformKind,
    pub reason: String,
}

impl FitError {
    fn new(kind: TransformKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// A fitted transformation with the parameters needed to reapply it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Transformation {
    #[default]
    None,
    Log { shift: f64 },
    Sqrt { shift: f64 },
    BoxCox { lambda: f64, shift: f64 },
    YeoJohnson { lambda: f64 },
}

impl Transformation {
    pub fn kind(&self) -> TransformKind {
        match self {
            Transformation::None => TransformKind::None,
            Transformation::Log { .. } => TransformKind::Log,
            Transformation::Sqrt { .. } => TransformKind::Sqrt,
            Transformation::BoxCox { .. } => TransformKind::BoxCox,
            Transformation::YeoJohnson { .. } => TransformKind::YeoJohnson,
        }
    }

    pub fn params(&self) -> TransformParams {
        match *self {
            Transformation::None => TransformParams::default(),
            Transformation::Log { shift } | Transformation::Sqrt { shift } => TransformParams {
                shift: Some(shift),
                lambda: None,
            },
            Transformation::BoxCox { lambda, shift } => TransformParams {
                shift: Some(shift),
                lambda: Some(lambda),
            },
            Transformation::YeoJohnson { lambda } => TransformParams {
                shift: None,
                lambda: Some(lambda),
            },
        }
    }

    /// Rebuild a transformation from its persisted name and parameters
    pub fn from_parts(kind: TransformKind, params: &TransformParams) -> Self {
        let shift = params.shift.unwrap_or(0.0);
        let lambda = params.lambda.unwrap_or(1.0);
        match kind {
            TransformKind::None => Transformation::None,
            TransformKind::Log => Transformation::Log { shift },
            TransformKind::Sqrt => Transformation::Sqrt { shift },
            TransformKind::BoxCox => Transformation::BoxCox { lambda, shift },
            TransformKind::YeoJohnson => Transformation::YeoJohnson { lambda },
        }
    }

    /// Apply to a single value. Values outside the domain yield NaN or −∞.
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Transformation::None => x,
            Transformation::Log { shift } => (x + shift).ln(),
            Transformation::Sqrt { shift } => (x + shift).sqrt(),
            Transformation::BoxCox { lambda, shift } => box_cox(x + shift, lambda),
            Transformation::YeoJohnson { lambda } => yeo_johnson(x, lambda),
        }
    }

    /// Transform a sample, returning `None` if any output is non-finite
    pub fn apply_all(&self, values: &[f32]) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(values.len());
        for &v in values {
            let t = self.apply(v as f64) as f32;
            if !t.is_finite() {
                return None;
            }
            out.push(t);
        }
        Some(out)
    }

    /// Fit a transformation of the given kind to a sample
    pub fn fit(kind: TransformKind, sample: &[f32]) -> Result<Self, FitError> {
        let min = sample
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, |m, v| m.min(v as f64));
        if !min.is_finite() {
            return Err(FitError::new(kind, "sample has no finite values"));
        }

        match kind {
            TransformKind::None => Ok(Transformation::None),
            TransformKind::Log => Ok(Transformation::Log {
                shift: positive_shift(min),
            }),
            TransformKind::Sqrt => Ok(Transformation::Sqrt {
                shift: if min < 0.0 { -min } else { 0.0 },
            }),
            TransformKind::BoxCox => {
                let shift = positive_shift(min);
                let shifted: Vec<f64> = fit_subsample(sample).map(|v| v + shift).collect();
                let log_sum: f64 = shifted.iter().map(|v| v.ln()).sum();
                let n = shifted.len() as f64;
                let lambda = maximize_bounded(
                    |lambda| {
                        let var = variance_of(shifted.iter().map(|&x| box_cox(x, lambda)));
                        (lambda - 1.0) * log_sum - n / 2.0 * var.ln()
                    },
                    LAMBDA_BOUNDS,
                )
                .ok_or_else(|| FitError::new(kind, "log-likelihood is not finite"))?;
                Ok(Transformation::BoxCox { lambda, shift })
            }
            TransformKind::YeoJohnson => {
                let values: Vec<f64> = fit_subsample(sample).collect();
                let sign_log_sum: f64 = values.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
                let n = values.len() as f64;
                let lambda = maximize_bounded(
                    |lambda| {
                        let var = variance_of(values.iter().map(|&x| yeo_johnson(x, lambda)));
                        -n / 2.0 * var.ln() + (lambda - 1.0) * sign_log_sum
                    },
                    LAMBDA_BOUNDS,
                )
                .ok_or_else(|| FitError::new(kind, "log-likelihood is not finite"))?;
                Ok(Transformation::YeoJohnson { lambda })
            }
        }
    }
}

/// Shift that makes every value at least 1 when the minimum is not positive
fn positive_shift(min: f64) -> f64 {
    if min <= 0.0 {
        -min + 1.0
    } else {
        0.0
    }
}

fn fit_subsample(sample: &[f32]) -> impl Iterator<Item = f64> + '_ {
    let step = (sample.len() / FIT_SAMPLE_LIMIT).max(1);
    sample
        .iter()
        .step_by(step)
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| v as f64)
}

fn variance_of(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (n, sum) = values.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if n == 0 {
        return f64::NAN;
    }
    let mean = sum / n as f64;
    values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64
}

/// Box–Cox transform of a strictly positive value
pub fn box_cox(x: f64, lambda: f64) -> f64 {
    if x <= 0.0 {
        return f64::NAN;
    }
    if lambda.abs() < 1e-12 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

/// Yeo–Johnson transform, defined for every real value
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < 1e-12 {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < 1e-12 {
        -(-x).ln_1p()
    } else {
        -((-x + 1.0).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Golden-section search for the maximum of `f` on `[lo, hi]`.
///
/// Non-finite objective values count as −∞. Returns `None` when no finite
/// value is found.
fn maximize_bounded<F: Fn(f64) -> f64>(f: F, (lo, hi): (f64, f64)) -> Option<f64> {
    const INV_PHI: f64 = 0.618_033_988_749_894_8;
    const TOLERANCE: f64 = 1e-6;
    const MAX_ITER: usize = 200;

    let eval = |x: f64| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::NEG_INFINITY
        }
    };

    let (mut a, mut b) = (lo, hi);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = eval(c);
    let mut fd = eval(d);

    for _ in 0..MAX_ITER {
        if (b - a).abs() < TOLERANCE {
            break;
        }
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = eval(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = eval(d);
        }
    }

    let x = (a + b) / 2.0;
    if eval(x).is_finite() {
        Some(x)
    } else {
        None
    }
}
