//! Preprocessing of cross differences into the componentwise distances
//! consumed by the correlation models, either in the original input space
//! or in the space reduced by PLS coefficients.

use crate::correlation_models::{Correlation, DEFAULT_BATCH_SIZE};
use crate::errors::{KernelError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};

fn sign<F: Float>(v: F) -> F {
    if v < F::zero() {
        -F::one()
    } else {
        F::one()
    }
}

fn check_len(name: &str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(KernelError::DimensionMismatch(format!(
            "{name} length ({len}) should be {expected}"
        )));
    }
    Ok(())
}

/// Computes the componentwise distances (n_pairs, nx) of the cross differences `d` (n_pairs, nx)
/// as expected by the given correlation model: squared differences for the squared exponential,
/// raw differences for the active subspace exponential, absolute differences otherwise.
pub fn componentwise_distance<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    corr: Correlation,
) -> Array2<F> {
    let mut d_corr = Array2::zeros(d.dim());
    for (mut dc, db) in d_corr
        .axis_chunks_iter_mut(Axis(0), DEFAULT_BATCH_SIZE)
        .zip(d.axis_chunks_iter(Axis(0), DEFAULT_BATCH_SIZE))
    {
        match corr {
            Correlation::SquaredExponential => dc.assign(&db.mapv(|v| v * v)),
            Correlation::ActiveExponential => dc.assign(&db),
            _ => dc.assign(&db.mapv(|v| v.abs())),
        }
    }
    d_corr
}

/// Computes the derivative of `theta * componentwise_distance(d)` with respect to x
/// for each pair: `2 * theta * d` for the squared exponential, `theta * sign(d)`
/// for the absolute exponential and Matern kernels.
pub fn componentwise_distance_derivative<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    corr: Correlation,
    theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<Array2<F>> {
    check_len("theta", theta.len(), d.ncols())?;
    let two = F::cast(2.);
    match corr {
        Correlation::SquaredExponential => Ok(d * theta * two),
        Correlation::ActiveExponential => Err(KernelError::NotAvailable(
            "Distance derivatives",
            corr.to_string(),
        )),
        _ => Ok(d.mapv(sign) * theta),
    }
}

/// Computes the componentwise distances (n_pairs, n_comp) in the space reduced
/// by the PLS coefficients `coeff_pls` (nx, n_comp): `d^2 . coeff^2` for the squared
/// exponential, `|d| . |coeff|` otherwise.
pub fn componentwise_distance_pls<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    corr: Correlation,
    coeff_pls: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    check_len("coeff_pls rows", coeff_pls.nrows(), d.ncols())?;
    let coeff = match corr {
        Correlation::SquaredExponential => coeff_pls.mapv(|v| v * v),
        _ => coeff_pls.mapv(|v| v.abs()),
    };
    let mut d_corr = Array2::zeros((d.nrows(), coeff.ncols()));
    for (mut dc, db) in d_corr
        .axis_chunks_iter_mut(Axis(0), DEFAULT_BATCH_SIZE)
        .zip(d.axis_chunks_iter(Axis(0), DEFAULT_BATCH_SIZE))
    {
        let db = match corr {
            Correlation::SquaredExponential => db.mapv(|v| v * v),
            _ => db.mapv(|v| v.abs()),
        };
        dc.assign(&db.dot(&coeff));
    }
    Ok(d_corr)
}

/// Computes the derivative of `theta * componentwise_distance_pls(d)` with respect to x
/// projected back on the nx input components: `2 * (sum_l theta_l * c_jl^2) * d_ij`
/// for the squared exponential, `(sum_l theta_l * |c_jl|) * sign(d_ij)` otherwise.
pub fn componentwise_distance_pls_derivative<F: Float>(
    d: &ArrayBase<impl Data<Elem = F>, Ix2>,
    corr: Correlation,
    coeff_pls: &ArrayBase<impl Data<Elem = F>, Ix2>,
    theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<Array2<F>> {
    check_len("coeff_pls rows", coeff_pls.nrows(), d.ncols())?;
    check_len("theta", theta.len(), coeff_pls.ncols())?;
    let two = F::cast(2.);
    let coef: Array1<F> = match corr {
        Correlation::SquaredExponential => coeff_pls.mapv(|v| v * v).dot(theta) * two,
        _ => coeff_pls.mapv(|v| v.abs()).dot(theta),
    };
    let mut d_corr = Array2::zeros(d.dim());
    Zip::from(d_corr.rows_mut())
        .and(d.rows())
        .for_each(|mut dc, di| match corr {
            Correlation::SquaredExponential => dc.assign(&(&di * &coef)),
            _ => dc.assign(&(di.mapv(sign) * &coef)),
        });
    Ok(d_corr)
}
