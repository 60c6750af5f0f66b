use crate::CodedDesign;
use linfa::Float;
use ndarray::{Array2, s};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Box-Behnken design in coded units.
///
/// For each pair of components `(i, j)` with `i < j`, the four combinations
/// `(±1, ±1)` are taken while the other components stay at the center (0.).
/// Center points are placed first.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct BoxBehnken {
    nx: usize,
    n_center: usize,
}

impl BoxBehnken {
    /// Default number of center points
    pub const DEFAULT_N_CENTER: usize = 1;

    /// Constructor given the dimension of the design
    ///
    /// ```
    /// use kriging_doe::{BoxBehnken, CodedDesign};
    ///
    /// let doe: ndarray::Array2<f64> = BoxBehnken::new(3).coded_points();
    /// assert_eq!(doe.nrows(), 13);
    /// ```
    ///
    /// *Panics* if `nx < 3`
    pub fn new(nx: usize) -> Self {
        if nx < 3 {
            panic!("Box-Behnken design requires at least 3 components, got {nx}");
        }
        BoxBehnken {
            nx,
            n_center: Self::DEFAULT_N_CENTER,
        }
    }

    /// Set the number of center points
    pub fn n_center(mut self, n_center: usize) -> Self {
        self.n_center = n_center;
        self
    }

    /// Number of points of the design
    pub fn n_points(&self) -> usize {
        4 * self.nx * (self.nx - 1) / 2 + self.n_center
    }
}

impl<F: Float> CodedDesign<F> for BoxBehnken {
    fn nx(&self) -> usize {
        self.nx
    }

    fn coded_points(&self) -> Array2<F> {
        let corners = [(-1., -1.), (1., -1.), (-1., 1.), (1., 1.)];
        let mut doe = Array2::<F>::zeros((self.n_points(), self.nx));

        let mut row = self.n_center;
        for i in 0..self.nx - 1 {
            for j in (i + 1)..self.nx {
                let mut block = doe.slice_mut(s![row..row + corners.len(), ..]);
                for (k, (ci, cj)) in corners.iter().enumerate() {
                    block[[k, i]] = F::cast(*ci);
                    block[[k, j]] = F::cast(*cj);
                }
                row += corners.len();
            }
        }
        doe
    }
}
