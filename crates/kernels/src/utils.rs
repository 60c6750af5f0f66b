use crate::errors::{KernelError, Result};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2, s};

fn check_same_ncols<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<()> {
    if x.ncols() != y.ncols() {
        return Err(KernelError::DimensionMismatch(format!(
            "x and y should have the same number of columns, got {} and {}",
            x.ncols(),
            y.ncols()
        )));
    }
    Ok(())
}

/// Computes the nonzero componentwise cross differences between the rows of `x`
/// or between the rows of `x` and the rows of `y`.
///
/// Without `y`, the n_obs * (n_obs - 1) / 2 pairs (i, j) with i < j are
/// enumerated with i as outer loop and `d` rows are `x[i] - x[j]`.
/// With `y`, the nx * ny pairs are enumerated in row-major order and
/// `d` rows are `x[i] - y[j]`.
///
/// Returns the differences `d` and the indices `ij` of the pairs.
pub fn cross_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: Option<&ArrayBase<impl Data<Elem = F>, Ix2>>,
) -> Result<(Array2<F>, Array2<usize>)> {
    match y {
        None => Ok(self_cross_distances(x)),
        Some(y) => {
            check_same_ncols(x, y)?;
            let n_obs = x.nrows();
            let ny = y.nrows();
            let mut indices = Array2::<usize>::zeros((n_obs * ny, 2));
            for i in 0..n_obs {
                for j in 0..ny {
                    indices[[i * ny + j, 0]] = i;
                    indices[[i * ny + j, 1]] = j;
                }
            }
            Ok((differences(x, y)?, indices))
        }
    }
}

fn self_cross_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> (Array2<F>, Array2<usize>) {
    let n_obs = x.nrows();
    let nx = x.ncols();
    let n_non_zero_cross_dist = n_obs * n_obs.saturating_sub(1) / 2;
    let mut indices = Array2::<usize>::zeros((n_non_zero_cross_dist, 2));
    let mut d = Array2::zeros((n_non_zero_cross_dist, nx));
    let mut idx = 0;
    for k in 0..n_obs.saturating_sub(1) {
        let idx0 = idx;
        let offset = n_obs - k - 1;
        idx = idx0 + offset;

        for i in (k + 1)..n_obs {
            let r = idx0 + i - k - 1;
            indices[[r, 0]] = k;
            indices[[r, 1]] = i;
        }

        let diff = &x.slice(s![k, ..]) - &x.slice(s![k + 1..n_obs, ..]);
        d.slice_mut(s![idx0..idx, ..]).assign(&diff);
    }
    (d, indices)
}

/// A structure to retain componentwise differences used to compute correlation matrices
#[derive(Debug)]
pub struct DiffMatrix<F: Float> {
    /// Signed differences as (n_pairs, nx) array
    pub d: Array2<F>,
    /// Indices of the differences in the original data array(s)
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DiffMatrix<F> {
    /// Compute differences between distinct points given as an array (n_obs, nx)
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DiffMatrix<F> {
        let n_obs = x.nrows();
        let (d, d_indices) = self_cross_distances(x);
        DiffMatrix {
            d,
            d_indices,
            n_obs,
        }
    }

    /// Compute differences between points of `x` (n_obs, nx) and reference points `y` (ny, nx)
    pub fn cross(
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<DiffMatrix<F>> {
        let (d, d_indices) = cross_distances(x, Some(y))?;
        Ok(DiffMatrix {
            d,
            d_indices,
            n_obs: x.nrows(),
        })
    }

    /// Number of pairs
    pub fn n_pairs(&self) -> usize {
        self.d.nrows()
    }
}

/// Computes differences between each row of x and each row of y
/// resulting in a 2d array of shape (nrows(x) * nrows(y), ncols(x))
/// where row `i * nrows(y) + j` is `x[i] - y[j]`.
pub fn differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    check_same_ncols(x, y)?;

    let nx = x.nrows();
    let ny = y.nrows();
    let ncols = x.ncols();
    let mut result = Array2::zeros((nx * ny, ncols));

    for (i, x_row) in x.rows().into_iter().enumerate() {
        let diff = &x_row - y;
        result.slice_mut(s![i * ny..(i + 1) * ny, ..]).assign(&diff);
    }

    Ok(result)
}
