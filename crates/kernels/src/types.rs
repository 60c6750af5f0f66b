#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// An enumeration to define the type of an input variable component
/// with its domain definition
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum XType {
    /// Continuous variable in [lower bound, upper bound]
    Float(f64, f64),
    /// Integer variable in lower bound .. upper bound
    Int(i32, i32),
    /// An Ordered variable in { float_1, float_2, ..., float_n }
    Ord(Vec<f64>),
    /// A categorical variable with the given number of levels,
    /// values are level indices in { 0, 1, ..., n_levels - 1 }
    Enum(usize),
}

impl XType {
    /// Whether the component is categorical
    pub fn is_categorical(&self) -> bool {
        matches!(self, XType::Enum(_))
    }

    /// Number of levels of a categorical component, `None` otherwise
    pub fn n_levels(&self) -> Option<usize> {
        match self {
            XType::Enum(n) => Some(*n),
            _ => None,
        }
    }
}

/// Mask of categorical components of the given variable types
pub fn categorical_mask(xtypes: &[XType]) -> Vec<bool> {
    xtypes.iter().map(|xt| xt.is_categorical()).collect()
}

/// Numbers of levels of the categorical components in declaration order
pub fn categorical_levels(xtypes: &[XType]) -> Vec<usize> {
    xtypes.iter().filter_map(|xt| xt.n_levels()).collect()
}

/// Parametrization of the correlation matrix of a categorical component
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum CategoricalKernel {
    /// Correlation between levels only driven by hyperspherical angles,
    /// `L(L-1)/2` hyperparameters for `L` levels
    #[default]
    HomoscedasticGaussian,
    /// Hyperspherical angles plus a decay per level,
    /// `L(L+1)/2` hyperparameters for `L` levels
    FullGaussian,
}

impl CategoricalKernel {
    /// Number of hyperparameters of a categorical component with `n_levels` levels
    pub fn n_params(&self, n_levels: usize) -> usize {
        match self {
            CategoricalKernel::HomoscedasticGaussian => n_levels * (n_levels.max(1) - 1) / 2,
            CategoricalKernel::FullGaussian => n_levels * (n_levels + 1) / 2,
        }
    }
}

/// Returns the number of hyperparameters needed by the correlation
/// of inputs typed by `xtypes` given the categorical kernel.
pub fn compute_n_param(xtypes: &[XType], cat_kernel: CategoricalKernel) -> usize {
    xtypes
        .iter()
        .map(|xt| match xt {
            XType::Enum(n) => cat_kernel.n_params(*n),
            _ => 1,
        })
        .sum()
}
