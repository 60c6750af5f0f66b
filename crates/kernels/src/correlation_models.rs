//! A module for correlation models used to model the error term of the GP model.
//!
//! The following correlation models are implemented:
//! * squared exponential,
//! * absolute exponential,
//! * matern 3/2,
//! * matern 5/2,
//! * active subspace exponential.
//!
//! Correlation models are evaluated on componentwise distances `d` (n_pairs, n_comp)
//! already preprocessed for the kernel (see [crate::componentwise_distance]):
//! squared differences for the squared exponential, raw differences for the
//! active subspace exponential and absolute differences for the others.
//!
//! Rows of `d` are processed by batches of `batch_size` rows to bound memory usage,
//! the batch size has no effect on the results.

use crate::errors::{KernelError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2, Zip};
use ndarray_einsum_beta::einsum;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of rows of distances processed at once
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Auxiliary inputs required to compute derivatives of correlations
/// with respect to input coordinates
#[derive(Clone, Debug, Default)]
pub struct DerivativeParams<F: Float> {
    /// Derivative of the theta-weighted componentwise distance with respect to x
    /// (see [crate::componentwise_distance_derivative]), used by exponential kernels
    dd: Option<Array2<F>>,
    /// Raw signed differences between points, used by Matern kernels
    dx: Option<Array2<F>>,
}

impl<F: Float> DerivativeParams<F> {
    /// Empty derivative parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the componentwise distance derivatives (n_pairs, n_comp)
    pub fn dd(mut self, dd: Array2<F>) -> Self {
        self.dd = Some(dd);
        self
    }

    /// Set the raw signed differences (n_pairs, n_comp)
    pub fn dx(mut self, dx: Array2<F>) -> Self {
        self.dx = Some(dx);
        self
    }

    fn get_dd(&self, shape: (usize, usize)) -> Result<&Array2<F>> {
        let dd = self
            .dd
            .as_ref()
            .ok_or(KernelError::MissingDerivativeParams("dd"))?;
        check_shape("dd", dd, shape)?;
        Ok(dd)
    }

    fn get_dx(&self, shape: (usize, usize)) -> Result<&Array2<F>> {
        let dx = self
            .dx
            .as_ref()
            .ok_or(KernelError::MissingDerivativeParams("dx"))?;
        check_shape("dx", dx, shape)?;
        Ok(dx)
    }
}

fn check_shape<F: Float>(name: &str, a: &Array2<F>, shape: (usize, usize)) -> Result<()> {
    if a.dim() != shape {
        return Err(KernelError::DimensionMismatch(format!(
            "`{name}` should have shape {shape:?}, got {:?}",
            a.dim()
        )));
    }
    Ok(())
}

fn check_theta<F: Float>(
    theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<()> {
    if theta.len() != d.ncols() {
        return Err(KernelError::DimensionMismatch(format!(
            "theta length ({}) should match distance components ({})",
            theta.len(),
            d.ncols()
        )));
    }
    Ok(())
}

fn check_index(ind: usize, len: usize) -> Result<()> {
    if ind >= len {
        return Err(KernelError::InvalidValueError(format!(
            "hyperparameter index {ind} out of range (theta length {len})"
        )));
    }
    Ok(())
}

/// Sign of `v` where 0 counts as positive
fn sign<F: Float>(v: F) -> F {
    if v < F::zero() {
        -F::one()
    } else {
        F::one()
    }
}

/// Applies `f` on row batches of `d` and gathers the results
fn by_batch<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    batch_size: usize,
    f: impl Fn(ArrayView2<F>) -> Array1<F>,
) -> Array1<F> {
    let batch_size = batch_size.max(1);
    let mut r = Array1::zeros(d.nrows());
    for (mut r_batch, d_batch) in r
        .axis_chunks_iter_mut(Axis(0), batch_size)
        .zip(d.axis_chunks_iter(Axis(0), batch_size))
    {
        r_batch.assign(&f(d_batch));
    }
    r
}

/// Same as [by_batch] over the rows of two distance arrays with the same number of rows
fn by_batch_pair<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    d_x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    batch_size: usize,
    f: impl Fn(ArrayView2<F>, ArrayView2<F>) -> Array1<F>,
) -> Array1<F> {
    let batch_size = batch_size.max(1);
    let mut r = Array1::zeros(d.nrows());
    for ((mut r_batch, d_batch), dx_batch) in r
        .axis_chunks_iter_mut(Axis(0), batch_size)
        .zip(d.axis_chunks_iter(Axis(0), batch_size))
        .zip(d_x.axis_chunks_iter(Axis(0), batch_size))
    {
        r_batch.assign(&f(d_batch, dx_batch));
    }
    r
}

/// A trait for using a correlation model in GP regression
pub trait CorrelationModel<F: Float>: Clone + Copy + Default + fmt::Display + Sync {
    /// Number of rows of distances processed at once
    fn batch_size(&self) -> usize;

    /// Compute correlation values r(x, x') given componentwise distances `d` (n_pairs, n_comp)
    /// between x and x', and `theta` hyperparameters.
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>>;

    /// Compute the derivative of r(x, x') with respect to `theta[grad_ind]`
    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>>;

    /// Compute the second derivative of r(x, x') with respect to `theta[grad_ind]`
    /// and `theta[hess_ind]`
    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>>;

    /// Compute both r(x, x') and its derivatives with respect to the input coordinates
    /// as a (n_pairs, n_comp) array.
    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)>;

    /// Compute the second derivatives of r(x, x') with respect to the input coordinates
    /// as a (n_pairs, n_comp, n_comp) array.
    fn x_hessian(
        &self,
        _theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        _d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        _params: &DerivativeParams<F>,
    ) -> Result<Array3<F>> {
        Err(KernelError::NotAvailable("Hessians", self.to_string()))
    }
}

macro_rules! declare_correlation {
    ($corr:ident, $name:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
        pub struct $corr {
            batch_size: usize,
        }

        impl Default for $corr {
            fn default() -> Self {
                Self {
                    batch_size: DEFAULT_BATCH_SIZE,
                }
            }
        }

        impl $corr {
            /// Set the number of rows of distances processed at once
            pub fn with_batch_size(mut self, batch_size: usize) -> Self {
                self.batch_size = batch_size.max(1);
                self
            }
        }

        impl fmt::Display for $corr {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, $name)
            }
        }
    };
}

declare_correlation!(
    SquaredExponentialCorr,
    "SquaredExponential",
    "Squared exponential correlation model"
);
declare_correlation!(
    AbsoluteExponentialCorr,
    "AbsoluteExponential",
    "Absolute exponential correlation model"
);
declare_correlation!(Matern32Corr, "Matern32", "Matern 3/2 correlation model");
declare_correlation!(Matern52Corr, "Matern52", "Matern 5/2 correlation model");
declare_correlation!(
    ActiveExponentialCorr,
    "ActiveExponential",
    "Active subspace exponential correlation model"
);

/// exp(- sum_j theta_j * d_j) shared by both exponential models,
/// squared exponential distances being already squared
fn exp_value<F: Float>(theta: &ArrayView1<F>, d: ArrayView2<F>) -> Array1<F> {
    d.dot(theta).mapv(|v| F::exp(-v))
}

fn exp_theta_derivative<F: Float>(
    theta: &ArrayView1<F>,
    d: ArrayView2<F>,
    grad_ind: usize,
) -> Array1<F> {
    let r = exp_value(theta, d);
    -(&d.column(grad_ind) * &r)
}

fn exp_theta_hessian<F: Float>(
    theta: &ArrayView1<F>,
    d: ArrayView2<F>,
    grad_ind: usize,
    hess_ind: usize,
) -> Array1<F> {
    let r = exp_value(theta, d);
    &d.column(grad_ind) * &d.column(hess_ind) * &r
}

fn exp_x_derivative<F: Float>(
    theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    params: &DerivativeParams<F>,
) -> Result<(Array1<F>, Array2<F>)> {
    check_theta(theta, d)?;
    let dd = params.get_dd(d.dim())?;
    let r = exp_value(&theta.view(), d.view());
    let dr = einsum("i,ij->ij", &[&r, dd])
        .map_err(|e| KernelError::DimensionMismatch(e.to_string()))?
        .into_dimensionality::<Ix2>()
        .map_err(|e| KernelError::DimensionMismatch(e.to_string()))?;
    Ok((r, -dr))
}

impl<F: Float> CorrelationModel<F> for SquaredExponentialCorr {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    ///   n_comp
    ///    prod   exp( - theta_j * d_j^2 )
    ///    j=1
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| exp_value(&theta, d)))
    }

    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            exp_theta_derivative(&theta, d, grad_ind)
        }))
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        check_index(hess_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            exp_theta_hessian(&theta, d, grad_ind, hess_ind)
        }))
    }

    /// `params` must provide `dd = 2 * theta * (x - x')`
    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        exp_x_derivative(theta, d, params)
    }

    fn x_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<Array3<F>> {
        check_theta(theta, d)?;
        let dd = params.get_dd(d.dim())?;
        let r = exp_value(&theta.view(), d.view());
        let n_comp = d.ncols();
        let mut d2r = Array3::zeros((d.nrows(), n_comp, n_comp));
        let two = F::cast(2.);
        Zip::from(d2r.outer_iter_mut())
            .and(dd.rows())
            .and(&r)
            .for_each(|mut d2r_k, dd_k, r_k| {
                for i in 0..n_comp {
                    for j in 0..n_comp {
                        d2r_k[[i, j]] = if i == j {
                            -(two * theta[i] - dd_k[i] * dd_k[i]) * *r_k
                        } else {
                            dd_k[i] * dd_k[j] * *r_k
                        };
                    }
                }
            });
        Ok(d2r)
    }
}

impl<F: Float> CorrelationModel<F> for AbsoluteExponentialCorr {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    ///   n_comp
    ///    prod   exp( - theta_j * |d_j| )
    ///    j=1
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| exp_value(&theta, d)))
    }

    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            exp_theta_derivative(&theta, d, grad_ind)
        }))
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        check_index(hess_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            exp_theta_hessian(&theta, d, grad_ind, hess_ind)
        }))
    }

    /// `params` must provide `dd = theta * sign(x - x')`
    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        exp_x_derivative(theta, d, params)
    }
}

/// Per-component factors of a Matern correlation: product of the polynomials
/// and sum of the theta-weighted distances
trait MaternFactors {
    /// sqrt(2 nu)
    fn c<F: Float>() -> F;

    /// Polynomial factor of one component given `l = theta_j * |d_j|`
    fn poly<F: Float>(l: F) -> F;

    fn r_batch<F: Float>(theta: &ArrayView1<F>, d: ArrayView2<F>) -> Array1<F> {
        let c = Self::c::<F>();
        let ll = &d * theta;
        let a = ll.map_axis(Axis(1), |row| row.fold(F::one(), |acc, l| acc * Self::poly(*l)));
        let b = ll.sum_axis(Axis(1)).mapv(|v| F::exp(-c * v));
        a * b
    }
}

impl MaternFactors for Matern32Corr {
    fn c<F: Float>() -> F {
        F::cast(3.).sqrt()
    }

    fn poly<F: Float>(l: F) -> F {
        F::one() + Self::c::<F>() * l
    }
}

impl MaternFactors for Matern52Corr {
    fn c<F: Float>() -> F {
        F::cast(5.).sqrt()
    }

    fn poly<F: Float>(l: F) -> F {
        F::one() + Self::c::<F>() * l + F::cast(5. / 3.) * l * l
    }
}

impl Matern32Corr {
    /// d(log r)/d(theta_g) = sqrt(3) d_g (1 / (1 + sqrt(3) theta_g d_g) - 1)
    fn dlog<F: Float>(theta_g: F, d_g: F) -> F {
        let sqrt3 = Self::c::<F>();
        sqrt3 * d_g * (F::one() / (F::one() + sqrt3 * theta_g * d_g) - F::one())
    }

    fn theta_derivative_batch<F: Float>(
        theta: &ArrayView1<F>,
        d: ArrayView2<F>,
        grad_ind: usize,
    ) -> Array1<F> {
        let r = Self::r_batch(theta, d);
        let theta_g = theta[grad_ind];
        Zip::from(&r)
            .and(d.column(grad_ind))
            .map_collect(|r_i, d_g| Self::dlog(theta_g, *d_g) * *r_i)
    }

    fn theta_hessian_batch<F: Float>(
        theta: &ArrayView1<F>,
        d: ArrayView2<F>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Array1<F> {
        let sqrt3 = Self::c::<F>();
        let r = Self::r_batch(theta, d);
        let (theta_g, theta_h) = (theta[grad_ind], theta[hess_ind]);
        Zip::from(&r)
            .and(d.column(grad_ind))
            .and(d.column(hess_ind))
            .map_collect(|r_i, d_g, d_h| {
                let mut h = Self::dlog(theta_g, *d_g) * Self::dlog(theta_h, *d_h) * *r_i;
                if grad_ind == hess_ind {
                    let den = F::one() + sqrt3 * theta_h * *d_h;
                    h -= F::cast(3.) * *d_h * *d_h / (den * den) * *r_i;
                }
                h
            })
    }
}

impl Matern52Corr {
    /// (f1 / f2 - f3) = d(log r)/d(theta_g)
    fn dlog<F: Float>(theta_g: F, d_g: F) -> F {
        let (f1, f2, f3) = Self::factors(theta_g, d_g);
        f1 / f2 - f3
    }

    fn factors<F: Float>(theta_g: F, d_g: F) -> (F, F, F) {
        let sqrt5 = Self::c::<F>();
        let f1 = sqrt5 * d_g + F::cast(10. / 3.) * theta_g * d_g * d_g;
        let f2 = Self::poly(theta_g * d_g);
        let f3 = sqrt5 * d_g;
        (f1, f2, f3)
    }

    fn theta_derivative_batch<F: Float>(
        theta: &ArrayView1<F>,
        d: ArrayView2<F>,
        grad_ind: usize,
    ) -> Array1<F> {
        let r = Self::r_batch(theta, d);
        let theta_g = theta[grad_ind];
        Zip::from(&r)
            .and(d.column(grad_ind))
            .map_collect(|r_i, d_g| Self::dlog(theta_g, *d_g) * *r_i)
    }

    fn theta_hessian_batch<F: Float>(
        theta: &ArrayView1<F>,
        d: ArrayView2<F>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Array1<F> {
        let r = Self::r_batch(theta, d);
        let (theta_g, theta_h) = (theta[grad_ind], theta[hess_ind]);
        Zip::from(&r)
            .and(d.column(grad_ind))
            .and(d.column(hess_ind))
            .map_collect(|r_i, d_g, d_h| {
                let mut h = Self::dlog(theta_g, *d_g) * Self::dlog(theta_h, *d_h) * *r_i;
                if grad_ind == hess_ind {
                    let (f1, f2, _) = Self::factors(theta_h, *d_h);
                    let f4 = F::cast(10. / 3.) * *d_h * *d_h * f2;
                    h += (f4 - f1 * f1) / (f2 * f2) * *r_i;
                }
                h
            })
    }
}

/// Derivatives of a Matern correlation with respect to x given raw differences `dx`,
/// `dpoly(theta_k, |dx_k|)` being the derivative of the polynomial factor
/// with respect to |dx_k|
fn matern_x_derivative<F: Float>(
    theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    dx: &Array2<F>,
    r: &Array1<F>,
    c: F,
    poly: impl Fn(F) -> F,
    dpoly: impl Fn(F, F) -> F,
) -> Array2<F> {
    let n_comp = dx.ncols();
    let mut dr = Array2::zeros(dx.dim());
    Zip::from(dr.rows_mut())
        .and(dx.rows())
        .and(r)
        .for_each(|mut dr_j, dx_j, r_j| {
            let abs_dx = dx_j.mapv(|v| v.abs());
            let a = F::exp(-c * abs_dx.dot(theta));
            let polys = Zip::from(&abs_dx)
                .and(theta)
                .map_collect(|d, t| poly(*t * *d));
            for k in 0..n_comp {
                let der = sign(dx_j[k]);
                let coef = polys
                    .iter()
                    .enumerate()
                    .filter(|(l, _)| *l != k)
                    .fold(F::one(), |acc, (_, p)| acc * *p);
                let db = der * dpoly(theta[k], abs_dx[k]) * coef;
                dr_j[k] = -c * theta[k] * der * *r_j + a * db;
            }
        });
    dr
}

impl<F: Float> CorrelationModel<F> for Matern32Corr {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    ///  n_comp
    ///   prod  (1 + sqrt(3) * theta_j * |d_j|) exp( - sqrt(3) * theta_j * |d_j| )
    ///   j=1
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| Self::r_batch(&theta, d)))
    }

    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            Self::theta_derivative_batch(&theta, d, grad_ind)
        }))
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        check_index(hess_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            Self::theta_hessian_batch(&theta, d, grad_ind, hess_ind)
        }))
    }

    /// `params` must provide `dx = x - x'`
    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        let r = self.value(theta, d)?;
        let dx = params.get_dx(d.dim())?;
        let c = Self::c::<F>();
        let dr = matern_x_derivative(theta, dx, &r, c, Self::poly, |t, _| c * t);
        Ok((r, dr))
    }

    /// `params` must provide `dx = x - x'`
    fn x_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<Array3<F>> {
        let (r, dr) = self.x_derivative(theta, d, params)?;
        let dx = params.get_dx(d.dim())?;
        let sqrt3 = Self::c::<F>();
        let n_comp = d.ncols();
        let mut d2r = Array3::zeros((d.nrows(), n_comp, n_comp));
        Zip::from(d2r.outer_iter_mut())
            .and(dx.rows())
            .and(dr.rows())
            .and(&r)
            .for_each(|mut d2r_j, dx_j, dr_j, r_j| {
                for i in 0..n_comp {
                    let den = F::one() + sqrt3 * dx_j[i].abs() * theta[i];
                    let g_i = sqrt3 * theta[i] * sign(dx_j[i]) * (F::one() / den - F::one());
                    for k in 0..n_comp {
                        d2r_j[[i, k]] = g_i * dr_j[k];
                        if i == k {
                            d2r_j[[i, k]] -= F::cast(3.) * theta[i] * theta[i] / (den * den) * *r_j;
                        }
                    }
                }
            });
        Ok(d2r)
    }
}

impl<F: Float> CorrelationModel<F> for Matern52Corr {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    ///  n_comp
    ///   prod  (1 + sqrt(5) * theta_j * |d_j| + (5./3.) * theta_j^2 * |d_j|^2) exp( - sqrt(5) * theta_j * |d_j| )
    ///   j=1
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| Self::r_batch(&theta, d)))
    }

    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            Self::theta_derivative_batch(&theta, d, grad_ind)
        }))
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        check_theta(theta, d)?;
        check_index(grad_ind, theta.len())?;
        check_index(hess_ind, theta.len())?;
        let theta = theta.view();
        Ok(by_batch(d, self.batch_size, |d| {
            Self::theta_hessian_batch(&theta, d, grad_ind, hess_ind)
        }))
    }

    /// `params` must provide `dx = x - x'`
    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        let r = self.value(theta, d)?;
        let dx = params.get_dx(d.dim())?;
        let c = Self::c::<F>();
        let div10_3 = F::cast(10. / 3.);
        let dr = matern_x_derivative(theta, dx, &r, c, Self::poly, |t, abs_d| {
            c * t + div10_3 * abs_d * t * t
        });
        Ok((r, dr))
    }
}

impl ActiveExponentialCorr {
    /// Projection matrix A (n_comp, n_small) where A[c, s] = theta[s * n_comp + c]
    fn projection<F: Float>(
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        n_comp: usize,
    ) -> Result<Array2<F>> {
        if n_comp == 0 || theta.len() % n_comp != 0 {
            return Err(KernelError::InvalidValueError(format!(
                "Length of theta ({}) must be a multiple of n_components ({})",
                theta.len(),
                n_comp
            )));
        }
        let n_small = theta.len() / n_comp;
        Ok(Array2::from_shape_fn((n_comp, n_small), |(c, s)| {
            theta[s * n_comp + c]
        }))
    }

    /// Derivative of the correlation with respect to `theta[grad_ind]` when
    /// distances are taken in an embedding space.
    ///
    /// The projection still applies to `d` (n_pairs, n_comp) while the
    /// derivative factors are taken from `d_x` (n_pairs, n_embed), hence
    /// `grad_ind = s * n_embed + c`. With `d_x = d` it is the plain theta derivative.
    pub fn embedded_theta_derivative<F: Float>(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        d_x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        let a = Self::projection(theta, d.ncols())?;
        let n_embed = Self::check_embedding(d, d_x, a.ncols())?;
        check_index(grad_ind, a.ncols() * n_embed)?;
        let (c, s) = (grad_ind % n_embed, grad_ind / n_embed);
        Ok(by_batch_pair(d, d_x, self.batch_size, |d, d_x| {
            let d_a = d.dot(&a);
            let r = Self::r_batch(&d_a);
            -(&d_x.column(c) * &d_a.column(s) * &r)
        }))
    }

    /// Second derivative of the correlation with respect to `theta[grad_ind]`
    /// and `theta[hess_ind]` when distances are taken in an embedding space,
    /// see [ActiveExponentialCorr::embedded_theta_derivative]
    pub fn embedded_theta_hessian<F: Float>(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        d_x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        let a = Self::projection(theta, d.ncols())?;
        let n_embed = Self::check_embedding(d, d_x, a.ncols())?;
        check_index(grad_ind, a.ncols() * n_embed)?;
        check_index(hess_ind, a.ncols() * n_embed)?;
        let (cg, sg) = (grad_ind % n_embed, grad_ind / n_embed);
        let (ch, sh) = (hess_ind % n_embed, hess_ind / n_embed);
        Ok(by_batch_pair(d, d_x, self.batch_size, |d, d_x| {
            let d_a = d.dot(&a);
            let r = Self::r_batch(&d_a);
            let mut fact = -(&d_a.column(sg) * &d_a.column(sh));
            if sg == sh {
                fact.mapv_inplace(|v| F::one() + v);
            }
            -(&d_x.column(cg) * &d_x.column(ch) * &fact * &r)
        }))
    }

    /// Returns the embedding dimension
    fn check_embedding<F: Float>(
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        d_x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_small: usize,
    ) -> Result<usize> {
        if d_x.nrows() != d.nrows() || d_x.ncols() == 0 {
            return Err(KernelError::DimensionMismatch(format!(
                "embedded distances {:?} should have {} rows",
                d_x.dim(),
                d.nrows()
            )));
        }
        if n_small == 0 {
            return Err(KernelError::InvalidValueError(
                "active exponential theta cannot be empty".to_string(),
            ));
        }
        Ok(d_x.ncols())
    }

    fn r_batch<F: Float>(d_a: &Array2<F>) -> Array1<F> {
        d_a.map_axis(Axis(1), |row| {
            F::exp(F::cast(-0.5) * row.fold(F::zero(), |acc, v| acc + *v * *v))
        })
    }
}

impl<F: Float> CorrelationModel<F> for ActiveExponentialCorr {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// exp( - 1/2 * || d . A ||^2 ) where A is the (n_comp, n_small)
    /// reshaped `theta`
    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        let a = Self::projection(theta, d.ncols())?;
        Ok(by_batch(d, self.batch_size, |d| Self::r_batch(&d.dot(&a))))
    }

    /// `grad_ind` refers to the flattened (projection column, distance component) pair
    /// `grad_ind = s * n_comp + c`
    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        self.embedded_theta_derivative(theta, d, d, grad_ind)
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        self.embedded_theta_hessian(theta, d, d, grad_ind, hess_ind)
    }

    fn x_derivative(
        &self,
        _theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        _d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        _params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        Err(KernelError::NotAvailable("Jacobians", self.to_string()))
    }
}

/// Enumeration of the available correlation models
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Correlation {
    /// See [AbsoluteExponentialCorr]
    AbsoluteExponential,
    /// See [SquaredExponentialCorr]
    #[default]
    SquaredExponential,
    /// See [Matern32Corr]
    Matern32,
    /// See [Matern52Corr]
    Matern52,
    /// See [ActiveExponentialCorr]
    ActiveExponential,
}

impl Correlation {
    /// All correlation models
    pub const ALL: [Correlation; 5] = [
        Correlation::AbsoluteExponential,
        Correlation::SquaredExponential,
        Correlation::Matern32,
        Correlation::Matern52,
        Correlation::ActiveExponential,
    ];

    /// Short name of the correlation model
    pub fn short_name(&self) -> &'static str {
        match self {
            Correlation::AbsoluteExponential => "abs_exp",
            Correlation::SquaredExponential => "squar_exp",
            Correlation::Matern32 => "matern32",
            Correlation::Matern52 => "matern52",
            Correlation::ActiveExponential => "act_exp",
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Correlation::AbsoluteExponential => write!(f, "{}", AbsoluteExponentialCorr::default()),
            Correlation::SquaredExponential => write!(f, "{}", SquaredExponentialCorr::default()),
            Correlation::Matern32 => write!(f, "{}", Matern32Corr::default()),
            Correlation::Matern52 => write!(f, "{}", Matern52Corr::default()),
            Correlation::ActiveExponential => write!(f, "{}", ActiveExponentialCorr::default()),
        }
    }
}

impl FromStr for Correlation {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        Correlation::ALL
            .iter()
            .find(|c| c.short_name() == s || c.to_string() == s)
            .copied()
            .ok_or_else(|| {
                KernelError::InvalidValueError(format!("Unknown correlation model '{s}'"))
            })
    }
}

macro_rules! dispatch {
    ($self:expr, $corr:ident => $call:expr) => {
        match $self {
            Correlation::AbsoluteExponential => {
                let $corr = AbsoluteExponentialCorr::default();
                $call
            }
            Correlation::SquaredExponential => {
                let $corr = SquaredExponentialCorr::default();
                $call
            }
            Correlation::Matern32 => {
                let $corr = Matern32Corr::default();
                $call
            }
            Correlation::Matern52 => {
                let $corr = Matern52Corr::default();
                $call
            }
            Correlation::ActiveExponential => {
                let $corr = ActiveExponentialCorr::default();
                $call
            }
        }
    };
}

impl<F: Float> CorrelationModel<F> for Correlation {
    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    fn value(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array1<F>> {
        dispatch!(self, corr => corr.value(theta, d))
    }

    fn theta_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
    ) -> Result<Array1<F>> {
        dispatch!(self, corr => corr.theta_derivative(theta, d, grad_ind))
    }

    fn theta_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        grad_ind: usize,
        hess_ind: usize,
    ) -> Result<Array1<F>> {
        dispatch!(self, corr => corr.theta_hessian(theta, d, grad_ind, hess_ind))
    }

    fn x_derivative(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        dispatch!(self, corr => corr.x_derivative(theta, d, params))
    }

    fn x_hessian(
        &self,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &DerivativeParams<F>,
    ) -> Result<Array3<F>> {
        dispatch!(self, corr => corr.x_hessian(theta, d, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::componentwise::{componentwise_distance, componentwise_distance_derivative};
    use crate::utils::{differences, DiffMatrix};
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::{arr1, array, s};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use paste::paste;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_squared_exponential() {
        let xt = array![[4.5], [1.2], [2.0], [3.0], [4.0]];
        let dm = DiffMatrix::new(&xt);
        let d = componentwise_distance(&dm.d, Correlation::SquaredExponential);
        let res = SquaredExponentialCorr::default()
            .value(&arr1(&[0.1]), &d)
            .unwrap();
        let expected = array![
            0.336552878364737,
            0.5352614285189903,
            0.7985162187593771,
            0.9753099120283326,
            0.9380049995307295,
            0.7232502423798424,
            0.4565760496233148,
            0.9048374180359595,
            0.6703200460356393,
            0.9048374180359595
        ];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_squared_exponential_2d() {
        let xt = array![[0., 1.], [2., 3.], [4., 5.]];
        let dm = DiffMatrix::new(&xt);
        let d = componentwise_distance(&dm.d, Correlation::SquaredExponential);
        let res = SquaredExponentialCorr::default()
            .value(&arr1(&[1., 2.]), &d)
            .unwrap();
        let expected = array![6.14421235e-06, 1.42516408e-21, 6.14421235e-06];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_squared_exponential_single_pair() {
        let corr = SquaredExponentialCorr::default();
        let d = array![[1., 0.]];
        let theta = array![1., 1.];
        let e = f64::exp(-1.);
        assert_abs_diff_eq!(corr.value(&theta, &d).unwrap(), array![e]);
        assert_abs_diff_eq!(corr.theta_derivative(&theta, &d, 0).unwrap(), array![-e]);
    }

    #[test]
    fn test_matern32_2d() {
        let xt = array![[0., 1.], [2., 3.], [4., 5.]];
        let dm = DiffMatrix::new(&xt);
        let d = componentwise_distance(&dm.d, Correlation::Matern32);
        let res = Matern32Corr::default().value(&arr1(&[1., 2.]), &d).unwrap();
        let expected = array![1.08539595e-03, 1.10776401e-07, 1.08539595e-03];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_matern52_2d() {
        let xt = array![[0., 1.], [2., 3.], [4., 5.]];
        let dm = DiffMatrix::new(&xt);
        let d = componentwise_distance(&dm.d, Correlation::Matern52);
        let res = Matern52Corr::default().value(&arr1(&[1., 2.]), &d).unwrap();
        let expected = array![6.62391590e-04, 1.02117882e-08, 6.62391590e-04];
        assert_abs_diff_eq!(res, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_active_exponential_projection() {
        // theta reshaped as A = [[1, 3], [2, 4]] (n_comp=2, n_small=2)
        let d = array![[1., 0.5]];
        let theta = array![1., 2., 3., 4.];
        let res = ActiveExponentialCorr::default().value(&theta, &d).unwrap();
        // d.A = [1 + 1, 3 + 2]
        assert_abs_diff_eq!(res, array![f64::exp(-0.5 * (4. + 25.))], epsilon = 1e-12);
    }

    #[test]
    fn test_active_exponential_bad_theta() {
        let d = array![[1., 0.5]];
        let theta = array![1., 2., 3.];
        let res = ActiveExponentialCorr::default().value(&theta, &d);
        assert!(matches!(res, Err(KernelError::InvalidValueError(_))));
    }

    #[test]
    fn test_active_exponential_no_jacobian() {
        let d = array![[1., 0.5]];
        let theta = array![1., 2.];
        let params = DerivativeParams::new().dx(d.to_owned()).dd(d.to_owned());
        let res = ActiveExponentialCorr::default().x_derivative(&theta, &d, &params);
        assert!(matches!(res, Err(KernelError::NotAvailable(_, _))));
    }

    #[test]
    fn test_active_exponential_embedded_derivatives() {
        let corr = ActiveExponentialCorr::default();
        let d = array![[1., 0.5], [0.2, -0.3]];
        let theta = array![1., 2., 3., 4.];
        for i in 0..theta.len() {
            assert_abs_diff_eq!(
                corr.embedded_theta_derivative(&theta, &d, &d, i).unwrap(),
                corr.theta_derivative(&theta, &d, i).unwrap()
            );
            for j in 0..theta.len() {
                assert_abs_diff_eq!(
                    corr.embedded_theta_hessian(&theta, &d, &d, i, j).unwrap(),
                    corr.theta_hessian(&theta, &d, i, j).unwrap()
                );
            }
        }

        // d.A = [[2, 5], [-0.4, -0.6]], derivative factors taken from d_x
        let d_x = array![[2., -1., 0.5], [1., 1., 1.]];
        let r = array![f64::exp(-0.5 * 29.), f64::exp(-0.5 * 0.52)];
        let grad = corr.embedded_theta_derivative(&theta, &d, &d_x, 4).unwrap();
        assert_abs_diff_eq!(grad, array![5. * r[0], 0.6 * r[1]], epsilon = 1e-12);
        let hess = corr.embedded_theta_hessian(&theta, &d, &d_x, 4, 3).unwrap();
        assert_abs_diff_eq!(hess, array![-48. * r[0], -0.64 * r[1]], epsilon = 1e-12);

        assert!(corr.embedded_theta_derivative(&theta, &d, &d_x, 6).is_err());
        let res = corr.embedded_theta_derivative(&theta, &d, &d_x.slice(s![..1, ..]), 0);
        assert!(matches!(res, Err(KernelError::DimensionMismatch(_))));
    }

    #[test]
    fn test_missing_derivative_params() {
        let d = array![[1., 0.5]];
        let theta = array![1., 2.];
        let res =
            SquaredExponentialCorr::default().x_derivative(&theta, &d, &DerivativeParams::new());
        assert!(matches!(res, Err(KernelError::MissingDerivativeParams("dd"))));
        let res = Matern52Corr::default().x_derivative(&theta, &d, &DerivativeParams::new());
        assert!(matches!(res, Err(KernelError::MissingDerivativeParams("dx"))));
        let params = DerivativeParams::new().dx(d.to_owned());
        let res = Matern52Corr::default().x_hessian(&theta, &d, &params);
        assert!(matches!(res, Err(KernelError::NotAvailable(_, _))));
    }

    #[test]
    fn test_theta_length_mismatch() {
        let d = array![[1., 0.5]];
        let res = Matern32Corr::default().value(&array![1.], &d);
        assert!(matches!(res, Err(KernelError::DimensionMismatch(_))));
        let res = Matern32Corr::default().theta_derivative(&array![1., 1.], &d, 2);
        assert!(matches!(res, Err(KernelError::InvalidValueError(_))));
    }

    #[test]
    fn test_correlation_names() {
        for corr in Correlation::ALL {
            assert_eq!(corr, corr.short_name().parse::<Correlation>().unwrap());
            assert_eq!(corr, corr.to_string().parse::<Correlation>().unwrap());
        }
        assert_eq!(
            "squar_exp".parse::<Correlation>().unwrap(),
            Correlation::SquaredExponential
        );
        assert!("gaussian".parse::<Correlation>().is_err());
    }

    fn random_setup(n_comp: usize, n_theta: usize, seed: u64) -> (Array1<f64>, Array2<f64>) {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let theta = Array1::random_using(n_theta, Uniform::new(0.1, 2.), &mut rng);
        let dx = Array2::random_using((25, n_comp), Uniform::new(-1., 1.), &mut rng);
        (theta, dx)
    }

    macro_rules! test_correlation {
        ($corr:ident, $n_theta_factor:expr) => {
            paste! {
                #[test]
                fn [<test_corr_ $corr:lower _unit_at_zero_and_bounded>]() {
                    let n_comp = 3;
                    let (theta, dx) = random_setup(n_comp, $n_theta_factor * n_comp, 12);
                    let corr = [< $corr Corr >]::default();
                    let d = componentwise_distance(&dx, Correlation::$corr);
                    let r = corr.value(&theta, &d).unwrap();
                    assert!(r.iter().all(|v| *v > 0. && *v <= 1.));
                    let r0 = corr.value(&theta, &Array2::zeros((4, n_comp))).unwrap();
                    assert_abs_diff_eq!(r0, Array1::ones(4), epsilon = 1e-12);
                }

                #[test]
                fn [<test_corr_ $corr:lower _batch_size_invariance>]() {
                    let n_comp = 2;
                    let (theta, dx) = random_setup(n_comp, $n_theta_factor * n_comp, 13);
                    let d = componentwise_distance(&dx, Correlation::$corr);
                    let corr = [< $corr Corr >]::default();
                    let small = corr.with_batch_size(4);
                    assert_abs_diff_eq!(
                        corr.value(&theta, &d).unwrap(),
                        small.value(&theta, &d).unwrap(),
                        epsilon = 1e-15
                    );
                    assert_abs_diff_eq!(
                        corr.theta_derivative(&theta, &d, 1).unwrap(),
                        small.theta_derivative(&theta, &d, 1).unwrap(),
                        epsilon = 1e-15
                    );
                    assert_abs_diff_eq!(
                        corr.theta_hessian(&theta, &d, 1, 0).unwrap(),
                        small.theta_hessian(&theta, &d, 1, 0).unwrap(),
                        epsilon = 1e-15
                    );
                }

                #[test]
                fn [<test_corr_ $corr:lower _theta_derivatives>]() {
                    let n_comp = 3;
                    let (theta, dx) = random_setup(n_comp, $n_theta_factor * n_comp, 42);
                    let d = componentwise_distance(&dx, Correlation::$corr);
                    let corr = [< $corr Corr >]::default();
                    for k in [0, 1, 5] {
                        let f = |t: &Vec<f64>| -> f64 {
                            corr.value(&arr1(t), &d.slice(ndarray::s![k..k + 1, ..])).unwrap()[0]
                        };
                        let fdiff = theta.to_vec().central_diff(&f);
                        for g in 0..theta.len() {
                            let grad = corr.theta_derivative(&theta, &d, g).unwrap();
                            assert_abs_diff_eq!(grad[k], fdiff[g], epsilon = 1e-6);
                        }
                    }
                }

                #[test]
                fn [<test_corr_ $corr:lower _theta_hessians>]() {
                    let n_comp = 2;
                    let (theta, dx) = random_setup(n_comp, $n_theta_factor * n_comp, 7);
                    let d = componentwise_distance(&dx, Correlation::$corr);
                    let corr = [< $corr Corr >]::default();
                    let e = 1e-6;
                    for g in 0..theta.len() {
                        for h in 0..theta.len() {
                            let mut tp = theta.to_owned();
                            tp[h] += e;
                            let mut tm = theta.to_owned();
                            tm[h] -= e;
                            let fdiff = (corr.theta_derivative(&tp, &d, g).unwrap()
                                - corr.theta_derivative(&tm, &d, g).unwrap())
                                / (2. * e);
                            let hess = corr.theta_hessian(&theta, &d, g, h).unwrap();
                            assert_abs_diff_eq!(hess, fdiff, epsilon = 1e-5);
                        }
                    }
                }
            }
        };
    }

    test_correlation!(SquaredExponential, 1);
    test_correlation!(AbsoluteExponential, 1);
    test_correlation!(Matern32, 1);
    test_correlation!(Matern52, 1);
    test_correlation!(ActiveExponential, 2);

    fn x_derivative_params(
        corr: Correlation,
        theta: &Array1<f64>,
        dx: &Array2<f64>,
    ) -> DerivativeParams<f64> {
        match corr {
            Correlation::Matern32 | Correlation::Matern52 => {
                DerivativeParams::new().dx(dx.to_owned())
            }
            _ => {
                let dd = componentwise_distance_derivative(dx, corr, theta).unwrap();
                DerivativeParams::new().dd(dd)
            }
        }
    }

    macro_rules! test_x_derivatives {
        ($corr:ident) => {
            paste! {
                #[test]
                fn [<test_corr_ $corr:lower _x_derivatives>]() {
                    let x = array![0.3, -0.2];
                    let xt = array![[-0.9, 0.6], [0.5, 0.1], [0.9, -0.7], [-0.2, -0.8]];
                    let theta = array![0.7, 1.3];
                    let corr = Correlation::$corr;
                    let x = x.insert_axis(Axis(0));

                    let dx = differences(&x, &xt).unwrap();
                    let d = componentwise_distance(&dx, corr);
                    let params = x_derivative_params(corr, &theta, &dx);
                    let (r, jac) = corr.x_derivative(&theta, &d, &params).unwrap();
                    assert_abs_diff_eq!(r, corr.value(&theta, &d).unwrap(), epsilon = 1e-12);

                    let e = 1e-6;
                    for k in 0..x.ncols() {
                        let mut xp = x.to_owned();
                        xp[[0, k]] += e;
                        let mut xm = x.to_owned();
                        xm[[0, k]] -= e;
                        let dp = componentwise_distance(&differences(&xp, &xt).unwrap(), corr);
                        let dm = componentwise_distance(&differences(&xm, &xt).unwrap(), corr);
                        let rp = corr.value(&theta, &dp).unwrap();
                        let rm = corr.value(&theta, &dm).unwrap();
                        let fdiff = (rp - rm) / (2. * e);
                        assert_abs_diff_eq!(fdiff, jac.column(k), epsilon = 1e-6);
                    }
                }
            }
        };
    }

    test_x_derivatives!(SquaredExponential);
    test_x_derivatives!(AbsoluteExponential);
    test_x_derivatives!(Matern32);
    test_x_derivatives!(Matern52);

    macro_rules! test_x_hessians {
        ($corr:ident) => {
            paste! {
                #[test]
                fn [<test_corr_ $corr:lower _x_hessians>]() {
                    let x = array![0.3, -0.2];
                    let xt = array![[-0.9, 0.6], [0.5, 0.1], [0.9, -0.7], [-0.2, -0.8]];
                    let theta = array![0.7, 1.3];
                    let corr = Correlation::$corr;
                    let x = x.insert_axis(Axis(0));

                    let dx = differences(&x, &xt).unwrap();
                    let d = componentwise_distance(&dx, corr);
                    let params = x_derivative_params(corr, &theta, &dx);
                    let hess = corr.x_hessian(&theta, &d, &params).unwrap();
                    assert_eq!(hess.dim(), (xt.nrows(), 2, 2));

                    let e = 1e-6;
                    for k in 0..x.ncols() {
                        let jac_at = |x: &Array2<f64>| {
                            let dx = differences(x, &xt).unwrap();
                            let d = componentwise_distance(&dx, corr);
                            let params = x_derivative_params(corr, &theta, &dx);
                            corr.x_derivative(&theta, &d, &params).unwrap().1
                        };
                        let mut xp = x.to_owned();
                        xp[[0, k]] += e;
                        let mut xm = x.to_owned();
                        xm[[0, k]] -= e;
                        let fdiff = (jac_at(&xp) - jac_at(&xm)) / (2. * e);
                        for i in 0..x.ncols() {
                            assert_abs_diff_eq!(
                                hess.slice(ndarray::s![.., i, k]),
                                fdiff.column(i),
                                epsilon = 1e-5
                            );
                        }
                    }
                }
            }
        };
    }

    test_x_hessians!(SquaredExponential);
    test_x_hessians!(Matern32);
}
