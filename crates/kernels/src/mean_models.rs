//! A module for the regression basis functions modelling the trend of a Kriging model,
//! the correlation kernels modelling the correlated error around it.
//!
//! The following models are implemented:
//! * constant, `f(x) = [1]`
//! * linear, `f(x) = [1, x_1, ..., x_n]`
//! * quadratic, `f(x) = [1, x_1, ..., x_n, x_1 * x_1, x_1 * x_2, ..., x_n * x_n]`

use crate::errors::{KernelError, Result};
use linfa::Float;
use ndarray::{concatenate, s, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use paste::paste;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trait for the regression basis of the Kriging trend
pub trait RegressionModel<F: Float>: Clone + Copy + Default + fmt::Display + Sync {
    /// Number of basis functions for inputs of dimension `nx`
    fn n_terms(&self, nx: usize) -> usize;

    /// Evaluate the basis functions at `x` points given as a (n, nx) matrix.
    /// Returns a (n, n_terms) matrix.
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F>;

    /// Derivatives of the basis functions at a single `x` point given as a (nx,) vector.
    /// Returns a (n_terms, nx) matrix.
    fn jacobian(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F>;
}

/// Constant trend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct ConstantMean();

impl<F: Float> RegressionModel<F> for ConstantMean {
    fn n_terms(&self, _nx: usize) -> usize {
        1
    }

    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        Array2::ones((x.nrows(), 1))
    }

    fn jacobian(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        Array2::zeros((1, x.len()))
    }
}

/// Affine trend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct LinearMean();

impl<F: Float> RegressionModel<F> for LinearMean {
    fn n_terms(&self, nx: usize) -> usize {
        nx + 1
    }

    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        concatenate![Axis(1), Array2::ones((x.nrows(), 1)), x.to_owned()]
    }

    /// First row is null, the others are the identity
    fn jacobian(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        let nx = x.len();
        let mut jac = Array2::zeros((nx + 1, nx));
        jac.slice_mut(s![1.., ..]).assign(&Array2::eye(nx));
        jac
    }
}

/// Second degree polynomial trend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct QuadraticMean();

impl<F: Float> RegressionModel<F> for QuadraticMean {
    fn n_terms(&self, nx: usize) -> usize {
        1 + nx + nx * (nx + 1) / 2
    }

    /// Products `x_k * x_l` with `l >= k` follow the linear terms, `k` varying slowest
    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let nx = x.ncols();
        let mut res = Array2::zeros((x.nrows(), RegressionModel::<F>::n_terms(self, nx)));
        res.column_mut(0).fill(F::one());
        res.slice_mut(s![.., 1..nx + 1]).assign(x);
        let mut col = nx + 1;
        for k in 0..nx {
            let width = nx - k;
            let prods = &x.slice(s![.., k..]) * &x.slice(s![.., k..k + 1]);
            res.slice_mut(s![.., col..col + width]).assign(&prods);
            col += width;
        }
        res
    }

    /// d(x_k * x_l)/dx_i = delta_ik * x_l + delta_il * x_k
    fn jacobian(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        let nx = x.len();
        let mut jac = Array2::zeros((RegressionModel::<F>::n_terms(self, nx), nx));
        jac.slice_mut(s![1..nx + 1, ..]).assign(&Array2::eye(nx));
        let mut row = nx + 1;
        for k in 0..nx {
            for l in k..nx {
                jac[[row, k]] += x[l];
                jac[[row, l]] += x[k];
                row += 1;
            }
        }
        jac
    }
}

macro_rules! declare_mean_util_impls {
    ($regr:ident) => {
        paste! {
            impl fmt::Display for [<$regr Mean>] {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}Mean", stringify!($regr))
                }
            }

            impl From<[<$regr Mean>]> for String {
                fn from(item: [<$regr Mean>]) -> Self {
                    item.to_string()
                }
            }

            impl TryFrom<String> for [<$regr Mean>] {
                type Error = KernelError;
                fn try_from(s: String) -> Result<Self> {
                    if s == stringify!([<$regr Mean>]) {
                        Ok(Self::default())
                    } else {
                        Err(KernelError::InvalidValueError(format!(
                            "Bad string value '{s}', should be '{}'",
                            stringify!([<$regr Mean>])
                        )))
                    }
                }
            }
        }
    };
}

declare_mean_util_impls!(Constant);
declare_mean_util_impls!(Linear);
declare_mean_util_impls!(Quadratic);

/// Enumeration of the available regression models
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Regression {
    /// See [ConstantMean]
    #[default]
    Constant,
    /// See [LinearMean]
    Linear,
    /// See [QuadraticMean]
    Quadratic,
}

impl Regression {
    /// All regression models
    pub const ALL: [Regression; 3] = [
        Regression::Constant,
        Regression::Linear,
        Regression::Quadratic,
    ];

    /// Short name of the regression model
    pub fn short_name(&self) -> &'static str {
        match self {
            Regression::Constant => "constant",
            Regression::Linear => "linear",
            Regression::Quadratic => "quadratic",
        }
    }
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Regression::Constant => write!(f, "{}", ConstantMean()),
            Regression::Linear => write!(f, "{}", LinearMean()),
            Regression::Quadratic => write!(f, "{}", QuadraticMean()),
        }
    }
}

impl FromStr for Regression {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        Regression::ALL
            .iter()
            .find(|r| r.short_name() == s || r.to_string() == s)
            .copied()
            .ok_or_else(|| {
                KernelError::InvalidValueError(format!("Unknown regression model '{s}'"))
            })
    }
}

impl<F: Float> RegressionModel<F> for Regression {
    fn n_terms(&self, nx: usize) -> usize {
        match self {
            Regression::Constant => RegressionModel::<F>::n_terms(&ConstantMean(), nx),
            Regression::Linear => RegressionModel::<F>::n_terms(&LinearMean(), nx),
            Regression::Quadratic => RegressionModel::<F>::n_terms(&QuadraticMean(), nx),
        }
    }

    fn value(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        match self {
            Regression::Constant => ConstantMean().value(x),
            Regression::Linear => LinearMean().value(x),
            Regression::Quadratic => QuadraticMean().value(x),
        }
    }

    fn jacobian(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        match self {
            Regression::Constant => ConstantMean().jacobian(x),
            Regression::Linear => LinearMean().jacobian(x),
            Regression::Quadratic => QuadraticMean().jacobian(x),
        }
    }
}
