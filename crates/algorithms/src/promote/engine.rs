//! PROMOTe raster products

use super::conditioning::{condition_current, FutureScaling};
use super::scores::{
    adapt_protect, integrated_condition, mpat_class, mpat_strength, strategy_scores, Strategy,
};
use crate::blocks::{evaluate_blocks, stitch};
use foresight_core::{CancelFlag, Error, Raster, Result, CATEGORICAL_NODATA, DEFAULT_NODATA};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters for [`promote`]
#[derive(Debug, Clone, Copy)]
pub struct PromoteParams {
    /// Nodata of the six float outputs
    pub nodata: f32,
    /// Nodata of the MPAT matrix and strength rasters
    pub categorical_nodata: u8,
    pub block_size: usize,
}

impl Default for PromoteParams {
    fn default() -> Self {
        Self {
            nodata: DEFAULT_NODATA,
            categorical_nodata: CATEGORICAL_NODATA,
            block_size: 256,
        }
    }
}

/// Number of valid cells assigned to each MPAT class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub monitor: usize,
    pub protect: usize,
    pub adapt: usize,
    pub transform: usize,
}

impl ClassCounts {
    fn add(&mut self, strategy: Strategy) {
        match strategy {
            Strategy::Monitor => self.monitor += 1,
            Strategy::Protect => self.protect += 1,
            Strategy::Adapt => self.adapt += 1,
            Strategy::Transform => self.transform += 1,
        }
    }

    fn merge(&mut self, other: &ClassCounts) {
        self.monitor += other.monitor;
        self.protect += other.protect;
        self.adapt += other.adapt;
        self.transform += other.transform;
    }

    pub fn total(&self) -> usize {
        self.monitor + self.protect + self.adapt + self.transform
    }
}

/// Run-level facts stamped alongside the PROMOTe rasters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteSummary {
    pub class_counts: ClassCounts,
    pub valid_cells: usize,
    pub future_scaling: FutureScaling,
    /// Order in which tied strategies are resolved
    pub tie_break: Vec<Strategy>,
}

/// The eight PROMOTe products on the input grid
#[derive(Debug, Clone)]
pub struct PromoteOutputs {
    pub monitor: Raster<f32>,
    pub protect: Raster<f32>,
    pub adapt: Raster<f32>,
    pub transform: Raster<f32>,
    pub adapt_protect: Raster<f32>,
    pub integrated_condition: Raster<f32>,
    pub mpat: Raster<u8>,
    pub mpat_strength: Raster<u8>,
    pub summary: PromoteSummary,
}

impl PromoteOutputs {
    /// Float products with their output names
    pub fn float_layers(&self) -> [(&'static str, &Raster<f32>); 6] {
        [
            ("monitor", &self.monitor),
            ("protect", &self.protect),
            ("adapt", &self.adapt),
            ("transform", &self.transform),
            ("adapt_protect", &self.adapt_protect),
            ("integrated_condition", &self.integrated_condition),
        ]
    }

    /// Categorical products with their output names
    pub fn categorical_layers(&self) -> [(&'static str, &Raster<u8>); 2] {
        [("mpat", &self.mpat), ("mpat_strength", &self.mpat_strength)]
    }
}

struct PromoteBlock {
    scores: [Array2<f32>; 4],
    adapt_protect: Array2<f32>,
    ics: Array2<f32>,
    mpat: Array2<u8>,
    strength: Array2<u8>,
    counts: ClassCounts,
}

/// Range-based scaling of the valid future values
fn detect_future_scaling(future: &Raster<f32>) -> Result<FutureScaling> {
    let (min, max) = future
        .data()
        .iter()
        .filter(|&&v| !future.is_nodata(v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    if !(min.is_finite() && max.is_finite()) {
        return Err(Error::EmptyRaster);
    }
    Ok(FutureScaling::detect(min, max))
}

/// Score every cell valid in both landscapes and derive the MPAT products.
///
/// Current values are clamped to [0, 100]; future values are conditioned
/// by [`FutureScaling`]. Cells invalid in either input are nodata in every
/// output.
///
/// # Errors
/// `SizeMismatch` if the rasters differ in shape, `EmptyRaster` if no cell is
/// valid in both, `Cancelled` if the flag is raised between blocks.
pub fn promote(
    current: &Raster<f32>,
    future: &Raster<f32>,
    params: &PromoteParams,
    cancel: &CancelFlag,
) -> Result<PromoteOutputs> {
    if current.shape() != future.shape() {
        return Err(Error::size_mismatch(current.shape(), future.shape()));
    }
    let scaling = detect_future_scaling(future)?;
    let nodata = params.nodata;
    let cat_nodata = params.categorical_nodata;

    let blocks = evaluate_blocks(current.shape(), params.block_size, cancel, |w| {
        let cur = current.window(w)?;
        let fut = future.window(w)?;
        let shape = (w.rows, w.cols);
        let mut block = PromoteBlock {
            scores: std::array::from_fn(|_| Array2::from_elem(shape, nodata)),
            adapt_protect: Array2::from_elem(shape, nodata),
            ics: Array2::from_elem(shape, nodata),
            mpat: Array2::from_elem(shape, cat_nodata),
            strength: Array2::from_elem(shape, cat_nodata),
            counts: ClassCounts::default(),
        };

        for ((idx, &c), &f) in cur.indexed_iter().zip(fut.iter()) {
            if current.is_nodata(c) || future.is_nodata(f) {
                continue;
            }
            let c = condition_current(c as f64);
            let f = scaling.apply(f as f64);
            let scores = strategy_scores(c, f);
            for (out, &s) in block.scores.iter_mut().zip(scores.iter()) {
                out[idx] = s as f32;
            }
            block.adapt_protect[idx] = adapt_protect(scores[2], scores[1]) as f32;
            block.ics[idx] = integrated_condition(c, scores[0]) as f32;

            let (strategy, best) = mpat_class(&scores);
            block.mpat[idx] = strategy.code();
            block.strength[idx] = mpat_strength(strategy, best);
            block.counts.add(strategy);
        }
        Ok(block)
    })?;

    let shape = current.shape();
    let mut scores: [Array2<f32>; 4] = std::array::from_fn(|_| Array2::from_elem(shape, nodata));
    let mut ap = Array2::from_elem(shape, nodata);
    let mut ics = Array2::from_elem(shape, nodata);
    let mut mpat = Array2::from_elem(shape, cat_nodata);
    let mut strength = Array2::from_elem(shape, cat_nodata);
    let mut counts = ClassCounts::default();

    for (w, block) in &blocks {
        for (out, b) in scores.iter_mut().zip(block.scores.iter()) {
            stitch(out, w, b);
        }
        stitch(&mut ap, w, &block.adapt_protect);
        stitch(&mut ics, w, &block.ics);
        stitch(&mut mpat, w, &block.mpat);
        stitch(&mut strength, w, &block.strength);
        counts.merge(&block.counts);
    }

    let valid_cells = counts.total();
    if valid_cells == 0 {
        return Err(Error::EmptyRaster);
    }
    info!(
        "PROMOTe scored {} cells (M {}, P {}, A {}, T {}), future scaling {:?}",
        valid_cells, counts.monitor, counts.protect, counts.adapt, counts.transform, scaling
    );

    let float = |data: Array2<f32>| {
        let mut r = Raster::from_array(data);
        r.set_transform(*current.transform());
        r.set_crs(current.crs().cloned());
        r.set_nodata(Some(nodata));
        r
    };
    let categorical = |data: Array2<u8>| {
        let mut r = Raster::from_array(data);
        r.set_transform(*current.transform());
        r.set_crs(current.crs().cloned());
        r.set_nodata(Some(cat_nodata));
        r
    };

    let [monitor, protect, adapt, transform] = scores;
    Ok(PromoteOutputs {
        monitor: float(monitor),
        protect: float(protect),
        adapt: float(adapt),
        transform: float(transform),
        adapt_protect: float(ap),
        integrated_condition: float(ics),
        mpat: categorical(mpat),
        mpat_strength: categorical(strength),
        summary: PromoteSummary {
            class_counts: counts,
            valid_cells,
            future_scaling: scaling,
            tie_break: Strategy::ALL.to_vec(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use foresight_core::GeoTransform;

    fn raster(values: Vec<f32>, rows: usize, cols: usize) -> Raster<f32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(-120.0, 45.0, 0.001, -0.001));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn test_corners() {
        let current = raster(vec![100.0, 0.0, 50.0, 100.0], 2, 2);
        let future = raster(vec![100.0, 0.0, 50.0, 0.0], 2, 2);
        let out = promote(&current, &future, &PromoteParams::default(), &CancelFlag::new()).unwrap();

        assert_relative_eq!(out.monitor.get(0, 0).unwrap(), 100.0);
        assert!(out.monitor.get(0, 1).unwrap().abs() < 0.01);
        assert_eq!(out.mpat.get(0, 0).unwrap(), 1);
        assert_eq!(out.mpat_strength.get(0, 0).unwrap(), 11);
        assert_eq!(out.mpat.get(0, 1).unwrap(), 4);
        assert_eq!(out.mpat.get(1, 1).unwrap(), 2);
        // Centre ties resolve to Monitor
        assert_eq!(out.mpat.get(1, 0).unwrap(), 1);
        assert_eq!(out.mpat_strength.get(1, 0).unwrap(), 10);
        assert_eq!(out.summary.tie_break, Strategy::ALL.to_vec());
        assert_eq!(out.summary.class_counts.monitor, 2);
    }

    #[test]
    fn test_nodata_propagates_to_every_output() {
        let current = raster(vec![-9999.0, 40.0, 60.0, 80.0], 2, 2);
        let future = raster(vec![20.0, -9999.0, 60.0, 10.0], 2, 2);
        let out = promote(&current, &future, &PromoteParams::default(), &CancelFlag::new()).unwrap();

        for (_, r) in out.float_layers() {
            assert_eq!(r.get(0, 0).unwrap(), -9999.0);
            assert_eq!(r.get(0, 1).unwrap(), -9999.0);
            assert!(r.get(1, 0).unwrap() != -9999.0);
        }
        for (_, r) in out.categorical_layers() {
            assert_eq!(r.get(0, 0).unwrap(), 255);
            assert_eq!(r.nodata(), Some(255));
        }
        assert_eq!(out.summary.valid_cells, 2);
    }

    #[test]
    fn test_fraction_future_is_scaled() {
        let current = raster(vec![100.0, 100.0], 1, 2);
        let future = raster(vec![1.0, 0.5], 1, 2);
        let out = promote(&current, &future, &PromoteParams::default(), &CancelFlag::new()).unwrap();
        assert_eq!(out.summary.future_scaling, FutureScaling::Fraction);
        assert_relative_eq!(out.monitor.get(0, 0).unwrap(), 100.0);
    }

    #[test]
    fn test_output_ranges() {
        let n = 40;
        let current: Vec<f32> = (0..n * n).map(|i| ((i * 37) % 101) as f32).collect();
        let future: Vec<f32> = (0..n * n).map(|i| ((i * 53) % 97) as f32).collect();
        let current = raster(current, n, n);
        let future = raster(future, n, n);
        let params = PromoteParams {
            block_size: 16,
            ..Default::default()
        };
        let out = promote(&current, &future, &params, &CancelFlag::new()).unwrap();

        for (_, r) in out.float_layers() {
            for &v in r.data().iter() {
                assert!(v.is_finite() && (0.0..=100.0).contains(&v));
            }
        }
        for &v in out.mpat.data().iter() {
            assert!((1..=4).contains(&v));
        }
        for &v in out.mpat_strength.data().iter() {
            assert!([10, 11, 20, 21, 30, 31, 40, 41].contains(&v));
        }
        let sums = out
            .monitor
            .data()
            .iter()
            .zip(out.protect.data().iter())
            .zip(out.adapt.data().iter())
            .zip(out.transform.data().iter())
            .map(|(((m, p), a), t)| m + p + a + t);
        for s in sums {
            assert!((158.57..=200.01).contains(&s), "sum {}", s);
        }
        assert_eq!(out.summary.valid_cells, n * n);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = raster(vec![1.0; 4], 2, 2);
        let b = raster(vec![1.0; 6], 2, 3);
        assert!(matches!(
            promote(&a, &b, &PromoteParams::default(), &CancelFlag::new()),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
