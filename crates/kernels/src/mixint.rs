//! Correlation of mixed continuous/categorical inputs.
//!
//! Continuous (float, integer, ordered) components are correlated with one of the
//! [Correlation] kernels while each categorical component with `L` levels gets
//! a `L x L` correlation block parameterized by hyperspherical angles, so that the
//! block is a valid correlation matrix whatever the hyperparameter values.
//! The overall correlation is the product of the continuous correlation and
//! the categorical ones.

use crate::correlation_models::{Correlation, CorrelationModel};
use crate::errors::{KernelError, Result};
use crate::types::{compute_n_param, CategoricalKernel, XType};
use linfa::Float;
use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Correlation model of inputs described by variable types
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct MixedCorrelation {
    corr: Correlation,
    cat_kernel: CategoricalKernel,
    xtypes: Vec<XType>,
}

impl MixedCorrelation {
    /// Mixed correlation using `corr` for continuous components of inputs
    /// typed by `xtypes` and the default categorical kernel
    pub fn new(corr: Correlation, xtypes: &[XType]) -> Self {
        MixedCorrelation {
            corr,
            cat_kernel: CategoricalKernel::default(),
            xtypes: xtypes.to_vec(),
        }
    }

    /// Set the categorical kernel
    pub fn cat_kernel(mut self, cat_kernel: CategoricalKernel) -> Self {
        self.cat_kernel = cat_kernel;
        self
    }

    /// Continuous correlation model
    pub fn corr(&self) -> Correlation {
        self.corr
    }

    /// Variable types of the input components
    pub fn xtypes(&self) -> &[XType] {
        &self.xtypes
    }

    /// Number of hyperparameters
    pub fn n_params(&self) -> usize {
        compute_n_param(&self.xtypes, self.cat_kernel)
    }

    /// Splits `theta` into the continuous hyperparameters and the hyperparameters
    /// of each categorical component in declaration order
    pub fn split_theta<F: Float>(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<(Array1<F>, Vec<Array1<F>>)> {
        if theta.len() != self.n_params() {
            return Err(KernelError::DimensionMismatch(format!(
                "theta length ({}) should be {} for the given variable types",
                theta.len(),
                self.n_params()
            )));
        }
        let mut theta_cont = vec![];
        let mut theta_cats = vec![];
        let mut offset = 0;
        for xtype in self.xtypes.iter() {
            match xtype {
                XType::Enum(n_levels) => {
                    let n = self.cat_kernel.n_params(*n_levels);
                    theta_cats.push(theta.slice(ndarray::s![offset..offset + n]).to_owned());
                    offset += n;
                }
                _ => {
                    theta_cont.push(theta[offset]);
                    offset += 1;
                }
            }
        }
        Ok((Array1::from(theta_cont), theta_cats))
    }

    /// Correlation block (n_levels, n_levels) between the levels of a categorical
    /// component given its hyperparameters `theta_cat` and the hyperparameter
    /// bounds `(lower, upper)`.
    ///
    /// Off-diagonal values lie in [exp(-upper), 1], the diagonal is 1.
    pub fn categorical_block<F: Float>(
        &self,
        theta_cat: &ArrayBase<impl Data<Elem = F>, Ix1>,
        n_levels: usize,
        theta_bounds: (F, F),
    ) -> Result<Array2<F>> {
        categorical_block(theta_cat, n_levels, theta_bounds, self.cat_kernel)
    }

    /// Computes the correlation between pairs of points given the componentwise
    /// distances `d` (n_pairs, nx) preprocessed for the continuous kernel
    /// and the level pairs `lij` (n_cat, n_pairs, 2) of categorical components.
    pub fn value<F: Float>(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        theta_bounds: (F, F),
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        lij: &Array3<usize>,
    ) -> Result<Array1<F>> {
        let (theta_cont, theta_cats) = self.split_theta(theta)?;
        let r_cont = self.continuous_value(&theta_cont, d)?;
        let r_cat = self.categorical_value(&theta_cats, theta_bounds, d.nrows(), lij)?;
        Ok(r_cont * r_cat)
    }

    /// Computes the derivative of the correlation with respect to the
    /// `grad_ind`-th continuous hyperparameter
    pub fn theta_derivative<F: Float>(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        theta_bounds: (F, F),
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        lij: &Array3<usize>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        let (theta_cont, theta_cats) = self.split_theta(theta)?;
        let d_cont = self.continuous_distances(d)?;
        let dr_cont = self.corr.theta_derivative(&theta_cont, &d_cont, grad_ind)?;
        let r_cat = self.categorical_value(&theta_cats, theta_bounds, d.nrows(), lij)?;
        Ok(dr_cont * r_cat)
    }

    fn continuous_distances<F: Float>(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        if d.ncols() != self.xtypes.len() {
            return Err(KernelError::DimensionMismatch(format!(
                "distances should have {} columns, got {}",
                self.xtypes.len(),
                d.ncols()
            )));
        }
        let cont: Vec<usize> = self
            .xtypes
            .iter()
            .enumerate()
            .filter(|(_, xt)| !xt.is_categorical())
            .map(|(i, _)| i)
            .collect();
        Ok(Array2::from_shape_fn((d.nrows(), cont.len()), |(i, j)| {
            d[[i, cont[j]]]
        }))
    }

    fn continuous_value<F: Float>(
        &self,
        theta_cont: &Array1<F>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        let d_cont = self.continuous_distances(d)?;
        if d_cont.ncols() == 0 {
            return Ok(Array1::ones(d.nrows()));
        }
        self.corr.value(theta_cont, &d_cont)
    }

    fn categorical_value<F: Float>(
        &self,
        theta_cats: &[Array1<F>],
        theta_bounds: (F, F),
        n_pairs: usize,
        lij: &Array3<usize>,
    ) -> Result<Array1<F>> {
        let n_cat = theta_cats.len();
        if lij.dim() != (n_cat, n_pairs, 2) {
            return Err(KernelError::DimensionMismatch(format!(
                "level pairs should have shape {:?}, got {:?}",
                (n_cat, n_pairs, 2),
                lij.dim()
            )));
        }
        let n_levels = crate::types::categorical_levels(&self.xtypes);
        let mut r = Array1::ones(n_pairs);
        for ((theta_cat, &nl), levels) in theta_cats
            .iter()
            .zip(n_levels.iter())
            .zip(lij.axis_iter(Axis(0)))
        {
            let block = self.categorical_block(theta_cat, nl, theta_bounds)?;
            debug!("Categorical block ({nl} levels): {block}");
            if let Some(l) = levels.iter().find(|l| **l >= nl) {
                return Err(KernelError::InvalidValueError(format!(
                    "level {l} out of range for a categorical variable with {nl} levels"
                )));
            }
            Zip::from(&mut r)
                .and(levels.rows())
                .for_each(|r_k, lk| *r_k *= block[[lk[0], lk[1]]]);
        }
        Ok(r)
    }
}

/// Builds the angle matrix (n_levels, n_levels) from the angles filling
/// its upper triangle row by row, symmetrized, with unit diagonal
fn angle_matrix<F: Float>(angles: &ArrayView1<F>, n_levels: usize) -> Array2<F> {
    let mut theta_mat = Array2::eye(n_levels);
    let mut v = 0;
    for j in 0..n_levels {
        for k in (j + 1)..n_levels {
            theta_mat[[j, k]] = angles[v];
            theta_mat[[k, j]] = angles[v];
            v += 1;
        }
    }
    theta_mat
}

/// Lower triangular factor with unit-norm rows obtained by the hyperspherical
/// parameterization of the angle matrix
fn hyperspherical_factor<F: Float>(theta_mat: &Array2<F>) -> Array2<F> {
    let n = theta_mat.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sines = (0..j).fold(F::one(), |acc, k| acc * theta_mat[[i, k]].sin());
            l[[i, j]] = if i == j {
                sines
            } else {
                theta_mat[[i, j]].cos() * sines
            };
        }
    }
    l
}

/// See [MixedCorrelation::categorical_block]
pub fn categorical_block<F: Float>(
    theta_cat: &ArrayBase<impl Data<Elem = F>, Ix1>,
    n_levels: usize,
    theta_bounds: (F, F),
    cat_kernel: CategoricalKernel,
) -> Result<Array2<F>> {
    let expected = cat_kernel.n_params(n_levels);
    if theta_cat.len() != expected {
        return Err(KernelError::DimensionMismatch(format!(
            "categorical theta length ({}) should be {expected} for {n_levels} levels",
            theta_cat.len()
        )));
    }
    let (lower, upper) = theta_bounds;
    if upper <= F::zero() {
        return Err(KernelError::InvalidValueError(format!(
            "theta upper bound should be positive, got {upper}"
        )));
    }
    let n_angles = n_levels * n_levels.saturating_sub(1) / 2;
    let scale = F::cast(0.5 * std::f64::consts::PI) / upper;
    let angles = theta_cat.slice(ndarray::s![..n_angles]).mapv(|v| v * scale);

    let l = hyperspherical_factor(&angle_matrix(&angles.view(), n_levels));
    let t = l.dot(&l.t());
    let e_upper = F::exp(-upper);
    let k = (F::one() + e_upper) / F::exp(-lower);
    let mut block = t.mapv(|v| (F::exp((v - F::one()) * upper) + e_upper) / k);

    if cat_kernel == CategoricalKernel::FullGaussian {
        let decays = theta_cat.slice(ndarray::s![n_angles..]);
        Zip::indexed(&mut block)
            .for_each(|(i, j), b| *b *= F::exp(-decays[i] - decays[j]));
    }
    block.diag_mut().fill(F::one());
    Ok(block)
}
