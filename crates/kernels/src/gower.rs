//! Mixed-type componentwise distances.
//!
//! Continuous (float, integer and ordered) components are scaled by the maximum
//! observed in the reference set and their absolute differences are normalized
//! by the range of the scaled values. Categorical components give a mismatch
//! indicator: 0 when levels are equal, 1 otherwise.
//!
//! Degenerate normalizers (zero maximum, zero range) give a zero distance.

use crate::errors::{KernelError, Result};
use crate::types::{categorical_levels, categorical_mask, XType};
use crate::utils::cross_distances;
use linfa::Float;
use ndarray::{Array1, Array2, Array3, ArrayBase, Data, Ix2, Zip};

/// Result of the Gower componentwise distances between the rows of one set of points
#[derive(Debug, Clone)]
pub struct GowerDistances<F: Float> {
    /// Componentwise distances (n_pairs, nx), categorical columns are 0/1 indicators
    pub d: Array2<F>,
    /// Indices (i, j) with i < j of the pairs of points
    pub ij: Array2<usize>,
    /// Non categorical components of the points (n_obs, nx_cont)
    pub x_cont: Array2<F>,
}

fn check_xtypes<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xtypes: &[XType],
) -> Result<()> {
    if x.ncols() != xtypes.len() {
        return Err(KernelError::DimensionMismatch(format!(
            "x has {} columns while {} variable types are given",
            x.ncols(),
            xtypes.len()
        )));
    }
    Ok(())
}

fn select_columns<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    mask: &[bool],
    keep: bool,
) -> Array2<F> {
    let indices: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(j, m)| if *m == keep { Some(j) } else { None })
        .collect();
    Array2::from_shape_fn((x.nrows(), indices.len()), |(i, k)| x[[i, indices[k]]])
}

/// Returns the non categorical components of `x` and the mask of its categorical components
pub fn continuous_part<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xtypes: &[XType],
) -> Result<(Array2<F>, Vec<bool>)> {
    check_xtypes(x, xtypes)?;
    let cat_features = categorical_mask(xtypes);
    Ok((select_columns(x, &cat_features, false), cat_features))
}

/// Per column (max, range) of the continuous reference values,
/// range being the extent of the max-scaled values `1 - min / max`
fn column_scaling<F: Float>(y_num: &Array2<F>) -> (Array1<F>, Array1<F>) {
    let mut num_max = Array1::zeros(y_num.ncols());
    let mut num_ranges = Array1::zeros(y_num.ncols());
    Zip::from(&mut num_max)
        .and(&mut num_ranges)
        .and(y_num.columns())
        .for_each(|max, range, col| {
            if col.is_empty() {
                return;
            }
            let cmax = col.fold(F::neg_infinity(), |acc, v| acc.max(*v));
            let cmin = col.fold(F::infinity(), |acc, v| acc.min(*v));
            *max = cmax;
            *range = if cmax != F::zero() {
                F::one() - cmin / cmax
            } else {
                F::zero()
            };
        });
    (num_max, num_ranges)
}

fn safe_div<F: Float>(num: F, den: F) -> F {
    if den != F::zero() {
        num / den
    } else {
        F::zero()
    }
}

fn scale_columns<F: Float>(x_num: &Array2<F>, num_max: &Array1<F>) -> Array2<F> {
    let mut scaled = x_num.to_owned();
    Zip::from(scaled.rows_mut()).for_each(|mut row| {
        Zip::from(&mut row)
            .and(num_max)
            .for_each(|v, m| *v = safe_div(*v, *m));
    });
    scaled
}

/// Computes the Gower componentwise distances between the rows of `x`.
///
/// The n_obs * (n_obs - 1) / 2 pairs are ordered as in [cross_distances].
pub fn gower_componentwise_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xtypes: &[XType],
) -> Result<GowerDistances<F>> {
    let (x_cont, cat_features) = continuous_part(x, xtypes)?;
    let x_cat = select_columns(x, &cat_features, true);

    let (num_max, num_ranges) = column_scaling(&x_cont);
    let x_num = scale_columns(&x_cont, &num_max);

    let (d_num, ij) = cross_distances(&x_num, None::<&Array2<F>>)?;
    let (d_cat, _) = cross_distances(&x_cat, None::<&Array2<F>>)?;

    let mut d = Array2::zeros((ij.nrows(), x.ncols()));
    let (mut inum, mut icat) = (0, 0);
    for (j, is_cat) in cat_features.iter().enumerate() {
        if *is_cat {
            Zip::from(d.column_mut(j))
                .and(d_cat.column(icat))
                .for_each(|dj, dc| {
                    *dj = if *dc == F::zero() { F::zero() } else { F::one() }
                });
            icat += 1;
        } else {
            let range = num_ranges[inum];
            Zip::from(d.column_mut(j))
                .and(d_num.column(inum))
                .for_each(|dj, dn| *dj = safe_div(dn.abs(), range));
            inum += 1;
        }
    }

    Ok(GowerDistances { d, ij, x_cont })
}

/// Computes the Gower componentwise distances between each row of `x` and each row of `y`,
/// resulting in a dense (nrows(x) * nrows(y), ncols(x)) array where row `i * nrows(y) + j`
/// is the distance between `x[i]` and `y[j]`.
///
/// Continuous components are normalized with respect to the reference set `y`.
pub fn gower_cross_componentwise_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xtypes: &[XType],
) -> Result<Array2<F>> {
    check_xtypes(y, xtypes)?;
    let (x_cont, cat_features) = continuous_part(x, xtypes)?;
    let y_cont = select_columns(y, &cat_features, false);

    let (num_max, num_ranges) = column_scaling(&y_cont);
    let mut x_norm = x.to_owned();
    let mut y_norm = y.to_owned();
    let x_num = scale_columns(&x_cont, &num_max);
    let y_num = scale_columns(&y_cont, &num_max);
    let mut inum = 0;
    for (j, is_cat) in cat_features.iter().enumerate() {
        if !*is_cat {
            x_norm.column_mut(j).assign(&x_num.column(inum));
            y_norm.column_mut(j).assign(&y_num.column(inum));
            inum += 1;
        }
    }

    let (mut d, _) = cross_distances(&x_norm, Some(&y_norm))?;
    let half = F::cast(0.5);
    let mut inum = 0;
    for (j, is_cat) in cat_features.iter().enumerate() {
        if *is_cat {
            d.column_mut(j)
                .mapv_inplace(|v| if v.abs() > half { F::one() } else { F::zero() });
        } else {
            let range = num_ranges[inum];
            d.column_mut(j).mapv_inplace(|v| safe_div(v.abs(), range));
            inum += 1;
        }
    }
    Ok(d)
}

fn as_level<F: Float>(v: F) -> Result<usize> {
    v.round().to_usize().ok_or_else(|| {
        KernelError::InvalidValueError(format!(
            "Categorical value {v} is not a valid level index"
        ))
    })
}

/// Returns the levels taken by the categorical components of the points of each pair `ij`
/// as a (n_cat, n_pairs, 2) array, and the number of levels of each categorical component.
///
/// Without `y`, both indices of a pair refer to rows of `x`, otherwise the second one
/// refers to a row of `y`.
pub fn cross_levels<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ij: &ArrayBase<impl Data<Elem = usize>, Ix2>,
    xtypes: &[XType],
    y: Option<&ArrayBase<impl Data<Elem = F>, Ix2>>,
) -> Result<(Array3<usize>, Vec<usize>)> {
    check_xtypes(x, xtypes)?;
    let n_levels = categorical_levels(xtypes);
    let cat_features = categorical_mask(xtypes);
    let x_cat = select_columns(x, &cat_features, true);
    let y_cat = match y {
        Some(y) => {
            check_xtypes(y, xtypes)?;
            select_columns(y, &cat_features, true)
        }
        None => x_cat.clone(),
    };

    let mut lij = Array3::<usize>::zeros((n_levels.len(), ij.nrows(), 2));
    for (l, pair) in ij.outer_iter().enumerate() {
        let (i, j) = (pair[0], pair[1]);
        for k in 0..n_levels.len() {
            lij[[k, l, 0]] = as_level(x_cat[[i, k]])?;
            lij[[k, l, 1]] = as_level(y_cat[[j, k]])?;
        }
    }
    Ok((lij, n_levels))
}
