//! Cell value trait for rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Floating-point cells treat NaN as no-data in addition to the raster's
/// explicit sentinel, so intermediate grids can mark missing cells without
/// carrying a separate mask.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel used when a raster of this type needs a no-data value and
    /// none was provided.
    fn default_nodata() -> Self;

    /// Whether this value is no-data given the raster sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert to f64 (None if not representable)
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }
        }
    )*};
}

impl_raster_element_int!(i8, i16, i32, u8, u16, u32);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn float_sentinel_matches() {
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!(-9998.0_f64).is_nodata(Some(-9999.0)));
        assert!(!0.0_f64.is_nodata(Some(f64::NAN)));
    }

    #[test]
    fn int_sentinel_matches() {
        assert!(255u8.is_nodata(Some(255)));
        assert!(!0u8.is_nodata(Some(255)));
        assert!(!i8::MIN.is_nodata(None));
    }
}
