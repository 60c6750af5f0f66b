//! This library implements the correlation machinery of [Kriging](https://en.wikipedia.org/wiki/Kriging) models
//! as found in [SMT Kriging, KPLS and GEKPLS surrogate models](https://smt.readthedocs.io/en/latest/_src_docs/surrogate_models.html):
//! it computes the quantities a Kriging model needs to build its correlation matrices without
//! fitting the model itself.
//!
//! * distances between points: cross differences ([cross_distances], [DiffMatrix]) and
//!   Gower distances of mixed continuous/categorical inputs ([gower_componentwise_distances]),
//! * componentwise distances preprocessed for a given kernel, possibly compressed by PLS
//!   coefficients ([componentwise_distance], [componentwise_distance_pls]),
//! * correlation kernels with their derivatives with respect to hyperparameters and
//!   inputs ([correlation_models]),
//! * correlation of mixed inputs where categorical components are correlated through
//!   hyperspherical parameterization ([MixedCorrelation]),
//! * gradient-enhanced PLS coefficients used to reduce the input dimension ([GePls]),
//! * regression basis functions of the Kriging trend ([mean_models]).
//!
//! # Example
//!
//! ```
//! use kriging_kernels::correlation_models::{Correlation, CorrelationModel};
//! use kriging_kernels::{componentwise_distance, DiffMatrix};
//! use ndarray::array;
//!
//! let xt = array![[0., 1.], [2., 3.], [4., 5.]];
//! let dm = DiffMatrix::new(&xt);
//! let d = componentwise_distance(&dm.d, Correlation::SquaredExponential);
//! let r = Correlation::SquaredExponential
//!     .value(&array![1., 2.], &d)
//!     .expect("correlation computation");
//! assert_eq!(r.len(), 3);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod componentwise;
pub mod correlation_models;
mod errors;
mod ge_pls;
mod gower;
pub mod mean_models;
mod mixint;
mod parameters;
mod types;
mod utils;

pub use componentwise::*;
pub use errors::*;
pub use ge_pls::*;
pub use gower::*;
pub use mixint::*;
pub use parameters::*;
pub use types::*;
pub use utils::*;
