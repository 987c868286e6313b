//! Cell types a [`Raster`](crate::Raster) can hold

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// A value stored in one raster cell.
///
/// The pipeline moves two kinds of layers, `f32` scores and `u8`
/// categories. Both float widths are written to disk as 32-bit samples.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Fill for decoded samples that cannot be represented
    fn default_nodata() -> Self;

    /// Non-finite floats are always invalid, whatever the sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Written as 8-bit samples instead of 32-bit float
    fn is_byte() -> bool {
        false
    }

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

impl RasterElement for u8 {
    fn default_nodata() -> Self {
        crate::CATEGORICAL_NODATA
    }

    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        nodata == Some(*self)
    }

    fn is_byte() -> bool {
        true
    }
}

macro_rules! float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                crate::DEFAULT_NODATA as $t
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                !self.is_finite()
                    || nodata.is_some_and(|nd| {
                        nd.is_finite() && (self - nd).abs() <= <$t>::EPSILON * 100.0 * nd.abs().max(1.0)
                    })
            }
        }
    )*};
}

float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_sentinel_and_non_finite() {
        assert!((-9999.0_f32).is_nodata(Some(-9999.0)));
        assert!(f32::NAN.is_nodata(None));
        assert!(f64::NEG_INFINITY.is_nodata(Some(-9999.0)));
        assert!(!(-9998.0_f32).is_nodata(Some(-9999.0)));
        assert!(!0.0_f32.is_nodata(Some(f32::NAN)));
        assert_eq!(f32::default_nodata(), -9999.0);
    }

    #[test]
    fn test_category_sentinel() {
        assert!(255_u8.is_nodata(Some(255)));
        assert!(!0_u8.is_nodata(None));
        assert!(!4_u8.is_nodata(Some(255)));
        assert!(u8::is_byte() && !f32::is_byte());
    }
}
