use crate::errors::{KernelError, Result};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated gradient-enhanced PLS parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct GePlsValidParams<F: Float> {
    /// Number of PLS components
    pub(crate) n_comp: usize,
    /// Relative step of the local stencils, scaled by each variable range
    pub(crate) delta_x: F,
    /// Number of extra points generated per training point
    pub(crate) extra_points: usize,
    /// Whether PLS fitting is skipped, giving null coefficients
    pub(crate) zero_y: bool,
}

impl<F: Float> GePlsValidParams<F> {
    /// Default relative step of the local stencils
    pub const DEFAULT_DELTA_X: f64 = 1e-4;

    /// Get number of PLS components
    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    /// Get relative step of the local stencils
    pub fn delta_x(&self) -> F {
        self.delta_x
    }

    /// Get number of extra points per training point
    pub fn extra_points(&self) -> usize {
        self.extra_points
    }

    /// Get whether PLS fitting is skipped
    pub fn zero_y(&self) -> bool {
        self.zero_y
    }
}

#[derive(Clone, Debug)]
/// The set of parameters that can be specified for the computation of
/// [gradient-enhanced PLS coefficients](crate::GePls).
pub struct GePlsParams<F: Float>(GePlsValidParams<F>);

impl<F: Float> GePlsParams<F> {
    /// A constructor for parameters given the number of PLS components
    pub fn new(n_comp: usize) -> GePlsParams<F> {
        Self(GePlsValidParams {
            n_comp,
            delta_x: F::cast(GePlsValidParams::<F>::DEFAULT_DELTA_X),
            extra_points: 0,
            zero_y: false,
        })
    }

    /// Set the relative step of the local stencils.
    /// Should be strictly positive
    pub fn delta_x(mut self, delta_x: F) -> Self {
        self.0.delta_x = delta_x;
        self
    }

    /// Set the number of extra points generated per training point.
    /// Should be less than the input dimension
    pub fn extra_points(mut self, extra_points: usize) -> Self {
        self.0.extra_points = extra_points;
        self
    }

    /// Skip PLS fitting, giving null coefficients
    pub fn zero_y(mut self, zero_y: bool) -> Self {
        self.0.zero_y = zero_y;
        self
    }
}

impl<F: Float> ParamGuard for GePlsParams<F> {
    type Checked = GePlsValidParams<F>;
    type Error = KernelError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.n_comp == 0 {
            return Err(KernelError::InvalidValueError(
                "`n_comp` cannot be 0!".to_string(),
            ));
        }
        if self.0.delta_x <= F::zero() {
            return Err(KernelError::InvalidValueError(format!(
                "`delta_x` should be strictly positive, got {}",
                self.0.delta_x
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
