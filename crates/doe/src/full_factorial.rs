use crate::CodedDesign;
use linfa::Float;
use ndarray::{Array1, Array2, s};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// The FullFactorial design consists of all possible combinations
/// of `n_levels` evenly spaced levels in `[-1., 1.]` for all components.
///
/// With 3 levels in dimension 2, it gives the 9-point stencil made of
/// the center, the 4 axis-aligned and the 4 diagonal neighbours.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct FullFactorial {
    nx: usize,
    n_levels: usize,
}

impl FullFactorial {
    /// Constructor given the dimension and the number of levels per component
    ///
    /// ```
    /// use kriging_doe::{CodedDesign, FullFactorial};
    ///
    /// let doe: ndarray::Array2<f64> = FullFactorial::new(2, 3).coded_points();
    /// assert_eq!(doe.nrows(), 9);
    /// ```
    ///
    /// *Panics* if `n_levels` is 0
    pub fn new(nx: usize, n_levels: usize) -> Self {
        if n_levels == 0 {
            panic!("FullFactorial requires at least one level");
        }
        FullFactorial { nx, n_levels }
    }

    /// Number of points of the design
    pub fn n_points(&self) -> usize {
        self.n_levels.pow(self.nx as u32)
    }
}

impl<F: Float> CodedDesign<F> for FullFactorial {
    fn nx(&self) -> usize {
        self.nx
    }

    fn coded_points(&self) -> Array2<F> {
        let n = self.n_levels;
        let levels: Array1<F> = if n > 1 {
            Array1::from_shape_fn(n, |i| {
                F::cast(2.) * F::cast(i) / F::cast(n - 1) - F::one()
            })
        } else {
            Array1::zeros(1)
        };

        let nrows = self.n_points();
        let mut doe = Array2::<F>::zeros((nrows, self.nx));

        // first component varies slowest
        let mut level_repeat = nrows;
        let mut range_repeat = 1;
        for j in 0..self.nx {
            level_repeat /= n;
            let mut chunk = Array1::zeros(level_repeat * n);
            for (i, level) in levels.iter().enumerate() {
                chunk
                    .slice_mut(s![i * level_repeat..(i + 1) * level_repeat])
                    .fill(*level);
            }
            for k in 0..range_repeat {
                doe.slice_mut(s![n * level_repeat * k..n * level_repeat * (k + 1), j])
                    .assign(&chunk);
            }
            range_repeat *= n;
        }
        doe
    }
}
