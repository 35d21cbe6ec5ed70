//! Per-feature standardization.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{Artifact, ArtifactKind};
use crate::error::{EngineError, EngineResult};

/// Fitted affine transform `(x - mean) / scale` per column.
///
/// The scale is the population standard deviation; constant columns keep a
/// scale of 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(data: ArrayView2<'_, f64>) -> EngineResult<Self> {
        if data.nrows() == 0 {
            return Err(EngineError::invalid_input(
                "features",
                "cannot fit a standardizer on zero rows",
            ));
        }
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    pub fn transform(&self, data: ArrayView2<'_, f64>) -> EngineResult<Array2<f64>> {
        self.check_width(data.ncols())?;
        Ok((&data - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> EngineResult<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    fn check_width(&self, got: usize) -> EngineResult<()> {
        if got != self.n_features() {
            return Err(EngineError::invalid_input(
                "features",
                format!("standardizer expects {} columns, got {}", self.n_features(), got),
            ));
        }
        Ok(())
    }
}

impl Artifact for Standardizer {
    const KIND: ArtifactKind = ArtifactKind::Standardizer;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_gives_zero_mean_unit_variance() {
        let data = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [6.0, 40.0]];
        let scaler = Standardizer::fit(data.view()).unwrap();
        let scaled = scaler.transform(data.view()).unwrap();

        for col in scaled.axis_iter(Axis(1)) {
            assert!(col.mean().unwrap().abs() < 1e-12);
            assert!((col.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let data = array![[3.0, 1.0], [3.0, 2.0]];
        let scaler = Standardizer::fit(data.view()).unwrap();
        assert_eq!(scaler.scale()[0], 1.0);
        let scaled = scaler.transform(data.view()).unwrap();
        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[1, 0]], 0.0);
    }

    #[test]
    fn test_transform_does_not_refit() {
        let train = array![[0.0], [2.0]];
        let scaler = Standardizer::fit(train.view()).unwrap();
        let unseen = array![[4.0], [6.0]];
        let scaled = scaler.transform(unseen.view()).unwrap();
        assert_eq!(scaled[[0, 0]], 3.0);
        assert_eq!(scaled[[1, 0]], 5.0);
        assert_eq!(scaler.mean()[0], 1.0);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let scaler = Standardizer::fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        let err = scaler.transform_row(array![1.0, 2.0, 3.0].view()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_empty_fit_is_rejected() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(Standardizer::fit(empty.view()).is_err());
    }
}
