//! Gradient-enhanced PLS (GE-PLS) dimension reduction.
//!
//! Around each training point, a local stencil of points is generated with a
//! design of experiments (Box-Behnken when the input dimension is at least 3,
//! 3-level full factorial otherwise) and the outputs are predicted by first order
//! Taylor expansion using the known gradient. A PLS regression fitted on each
//! stencil gives the rotations of the inputs, the absolute values of which are
//! averaged over the training points to get the PLS coefficients
//! (dim, n_comp) used to compress distances (see [crate::componentwise_distance_pls]).
//!
//! Optionally, extra training points can be generated along the most influential
//! directions of each training point.

use crate::errors::{KernelError, Result};
use crate::parameters::{GePlsParams, GePlsValidParams};
use kriging_doe::{BoxBehnken, CodedDesign, FullFactorial};
use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa::{Float, ParamGuard};
use linfa_pls::PlsRegression;
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Gradient-enhanced PLS coefficients with the optional extra training points
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct GePls<F: Float> {
    /// PLS coefficients (dim, n_comp)
    coefficients: Array2<F>,
    /// Extra points (n_obs * extra_points, dim)
    x_extra: Array2<F>,
    /// Outputs at extra points (n_obs * extra_points, 1)
    y_extra: Array2<F>,
}

impl<F: Float> GePls<F> {
    /// Gradient-enhanced PLS parameters with `n_comp` components
    pub fn params(n_comp: usize) -> GePlsParams<F> {
        GePlsParams::new(n_comp)
    }

    /// PLS coefficients (dim, n_comp), all values are non negative
    pub fn coefficients(&self) -> &Array2<F> {
        &self.coefficients
    }

    /// Extra points (n_obs * extra_points, dim)
    pub fn x_extra(&self) -> &Array2<F> {
        &self.x_extra
    }

    /// Outputs predicted at extra points (n_obs * extra_points, 1)
    pub fn y_extra(&self) -> &Array2<F> {
        &self.y_extra
    }
}

impl<F: Float> GePlsParams<F> {
    /// Check parameters then compute GE-PLS coefficients.
    /// See [GePlsValidParams::fit]
    pub fn fit(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
        gradients: &ArrayBase<impl Data<Elem = F>, Ix2>,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<GePls<F>> {
        self.check_ref()?.fit(x, y, gradients, xlimits)
    }
}

impl<F: Float> GePlsValidParams<F> {
    /// Compute GE-PLS coefficients given training inputs `x` (n_obs, dim),
    /// outputs `y` (n_obs, 1), output gradients `gradients` (n_obs, dim)
    /// and input bounds `xlimits` (dim, 2).
    pub fn fit(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
        gradients: &ArrayBase<impl Data<Elem = F>, Ix2>,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<GePls<F>> {
        let (n_obs, dim) = x.dim();
        self.check_shapes(x, y, gradients, xlimits)?;

        let steps = (&xlimits.column(1) - &xlimits.column(0)) * self.delta_x;
        let mut coefficients = Array2::zeros((dim, self.n_comp));
        let mut x_extra = Array2::zeros((n_obs * self.extra_points, dim));
        let mut y_extra = Array2::zeros((n_obs * self.extra_points, 1));

        for (i, ((xi, yi), gi)) in x
            .rows()
            .into_iter()
            .zip(y.column(0))
            .zip(gradients.rows())
            .enumerate()
        {
            let coeff_i = if self.zero_y {
                Array2::zeros((dim, self.n_comp))
            } else {
                self.local_rotations(&xi, *yi, &gi, &steps)?
            };
            coefficients += &coeff_i.mapv(|v| v.abs());

            if self.extra_points > 0 {
                let mut dims: Vec<usize> = (0..dim).collect();
                dims.sort_by(|a, b| {
                    coeff_i[[*a, 0]]
                        .abs()
                        .partial_cmp(&coeff_i[[*b, 0]].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                for (k, &j) in dims[dim - self.extra_points..].iter().enumerate() {
                    let row = i * self.extra_points + k;
                    x_extra.row_mut(row).assign(&xi);
                    x_extra[[row, j]] += steps[j];
                    y_extra[[row, 0]] = *yi + gi[j] * steps[j];
                }
            }
        }
        if n_obs > 0 {
            coefficients /= F::cast(n_obs);
        }
        debug!("GE-PLS coefficients: {coefficients}");
        Ok(GePls {
            coefficients,
            x_extra,
            y_extra,
        })
    }

    fn check_shapes(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
        gradients: &ArrayBase<impl Data<Elem = F>, Ix2>,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<()> {
        let (n_obs, dim) = x.dim();
        if y.dim() != (n_obs, 1) {
            return Err(KernelError::DimensionMismatch(format!(
                "y should have shape ({n_obs}, 1), got {:?}",
                y.dim()
            )));
        }
        if gradients.dim() != (n_obs, dim) {
            return Err(KernelError::DimensionMismatch(format!(
                "gradients should have shape ({n_obs}, {dim}), got {:?}",
                gradients.dim()
            )));
        }
        if xlimits.dim() != (dim, 2) {
            return Err(KernelError::DimensionMismatch(format!(
                "xlimits should have shape ({dim}, 2), got {:?}",
                xlimits.dim()
            )));
        }
        if self.n_comp > dim {
            return Err(KernelError::InvalidValueError(format!(
                "Number of PLS components ({}) should not exceed input dimension ({dim})",
                self.n_comp
            )));
        }
        if self.extra_points > dim {
            return Err(KernelError::InvalidValueError(format!(
                "Number of extra points ({}) should not exceed input dimension ({dim})",
                self.extra_points
            )));
        }
        Ok(())
    }

    /// Inputs of the local stencil around `xi`, Box-Behnken design
    /// with one center point for dim >= 3 otherwise 3-level full factorial
    fn stencil(&self, xi: &ArrayView1<F>, steps: &Array1<F>) -> Array2<F> {
        let dim = xi.len();
        if dim >= 3 {
            BoxBehnken::new(dim).n_center(1).stencil(xi, steps)
        } else {
            FullFactorial::new(dim, 3).stencil(xi, steps)
        }
    }

    /// Rotations (dim, n_comp) of the PLS regression fitted on the local
    /// stencil around `xi` with outputs given by first order Taylor expansion
    fn local_rotations(
        &self,
        xi: &ArrayView1<F>,
        yi: F,
        gi: &ArrayView1<F>,
        steps: &Array1<F>,
    ) -> Result<Array2<F>> {
        let dim = xi.len();
        if gi.iter().all(|g| *g == F::zero()) {
            warn!("GE-PLS: null gradient, null rotations used");
            return Ok(Array2::zeros((dim, self.n_comp)));
        }
        let x_loc = self.stencil(xi, steps);
        let mut y_loc = Array2::from_elem((x_loc.nrows(), 1), yi);
        Zip::from(y_loc.rows_mut())
            .and(x_loc.rows())
            .for_each(|mut y_k, x_k| y_k[0] += (&x_k - xi).dot(gi));

        let ds = Dataset::new(x_loc, y_loc);
        PlsRegression::params(self.n_comp).fit(&ds).map_or_else(
            |e| match e {
                linfa_pls::PlsError::PowerMethodConstantResidualError() => {
                    warn!("GE-PLS: constant output on local stencil, null rotations used");
                    Ok(Array2::zeros((dim, self.n_comp)))
                }
                err => Err(err.into()),
            },
            |pls| Ok(pls.rotations().0.to_owned()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array, Axis};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use ndarray_stats::QuantileExt;
    use rand_xoshiro::Xoshiro256Plus;

    fn linear_dataset(
        n: usize,
        weights: &Array1<f64>,
    ) -> (Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
        let dim = weights.len();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let x = Array::random_using((n, dim), Uniform::new(-1., 1.), &mut rng);
        let y = x.dot(weights).insert_axis(Axis(1));
        let grads = Array2::from_shape_fn((n, dim), |(_, j)| weights[j]);
        let mut xlimits = Array2::zeros((dim, 2));
        xlimits.column_mut(0).fill(-1.);
        xlimits.column_mut(1).fill(1.);
        (x, y, grads, xlimits)
    }

    #[test]
    fn test_ge_pls_shape_and_sign() {
        let weights = array![1., -2., 0.5, 0.1];
        let (x, y, grads, xlimits) = linear_dataset(5, &weights);
        let gepls = GePls::params(2).fit(&x, &y, &grads, &xlimits).unwrap();
        assert_eq!(gepls.coefficients().dim(), (4, 2));
        assert!(gepls.coefficients().iter().all(|v| *v >= 0.));
        assert_eq!(gepls.x_extra().dim(), (0, 4));
        assert_eq!(gepls.y_extra().dim(), (0, 1));
    }

    #[test]
    fn test_ge_pls_linear_influence() {
        let weights = array![0.1, 3., -0.5];
        let (x, y, grads, xlimits) = linear_dataset(4, &weights);
        let gepls = GePls::params(1).fit(&x, &y, &grads, &xlimits).unwrap();
        let first = gepls.coefficients().column(0).to_owned();
        assert_eq!(first.argmax().unwrap(), 1);
        // first rotation is aligned with the gradient
        let expected = weights.mapv(f64::abs) / weights.dot(&weights).sqrt();
        assert_abs_diff_eq!(first, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_ge_pls_2d_and_1d() {
        let weights = array![2., -1.];
        let (x, y, grads, xlimits) = linear_dataset(3, &weights);
        let gepls = GePls::params(1).fit(&x, &y, &grads, &xlimits).unwrap();
        assert_eq!(gepls.coefficients().column(0).argmax().unwrap(), 0);

        let weights = array![2.];
        let (x, y, grads, xlimits) = linear_dataset(3, &weights);
        let gepls = GePls::params(1).fit(&x, &y, &grads, &xlimits).unwrap();
        assert_abs_diff_eq!(gepls.coefficients(), &array![[1.]], epsilon = 1e-6);
    }

    #[test]
    fn test_ge_pls_zero_y() {
        let weights = array![1., 2., 3.];
        let (x, y, grads, xlimits) = linear_dataset(3, &weights);
        let gepls = GePls::params(2)
            .zero_y(true)
            .fit(&x, &y, &grads, &xlimits)
            .unwrap();
        assert_eq!(gepls.coefficients(), &Array2::<f64>::zeros((3, 2)));
    }

    #[test]
    fn test_ge_pls_flat_function() {
        let weights = array![0., 0., 0.];
        let (x, y, grads, xlimits) = linear_dataset(2, &weights);
        let gepls = GePls::params(1).fit(&x, &y, &grads, &xlimits).unwrap();
        assert_eq!(gepls.coefficients(), &Array2::<f64>::zeros((3, 1)));
    }

    #[test]
    fn test_ge_pls_extra_points() {
        let weights = array![0.1, 3., -0.5];
        let (x, y, grads, xlimits) = linear_dataset(2, &weights);
        let delta_x = 1e-3;
        let gepls = GePls::params(1)
            .delta_x(delta_x)
            .extra_points(2)
            .fit(&x, &y, &grads, &xlimits)
            .unwrap();
        assert_eq!(gepls.x_extra().dim(), (4, 3));
        assert_eq!(gepls.y_extra().dim(), (4, 1));
        let step = delta_x * 2.;
        for i in 0..2 {
            // most influential dimension comes last
            let (a, b) = (2 * i, 2 * i + 1);
            let mut xa = x.row(i).to_owned();
            xa[2] += step;
            let mut xb = x.row(i).to_owned();
            xb[1] += step;
            assert_abs_diff_eq!(gepls.x_extra().row(a), xa, epsilon = 1e-12);
            assert_abs_diff_eq!(gepls.x_extra().row(b), xb, epsilon = 1e-12);
            assert_abs_diff_eq!(gepls.y_extra()[[a, 0]], y[[i, 0]] - 0.5 * step, epsilon = 1e-12);
            assert_abs_diff_eq!(gepls.y_extra()[[b, 0]], y[[i, 0]] + 3. * step, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ge_pls_bad_inputs() {
        let weights = array![1., 2.];
        let (x, y, grads, xlimits) = linear_dataset(3, &weights);
        assert!(matches!(
            GePls::params(3).fit(&x, &y, &grads, &xlimits),
            Err(KernelError::InvalidValueError(_))
        ));
        assert!(matches!(
            GePls::params(1).fit(&x, &y, &grads.t(), &xlimits),
            Err(KernelError::DimensionMismatch(_))
        ));
        assert!(matches!(
            GePls::params(1).fit(&x, &x, &grads, &xlimits),
            Err(KernelError::DimensionMismatch(_))
        ));
        assert!(GePls::params(0).fit(&x, &y, &grads, &xlimits).is_err());
    }
}
