use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix1};

/// Design of experiments expressed in coded units
///
/// A coded design is a set of points belonging to `[-1., 1.]^nx` where the
/// origin is the center of the design. Designs are turned into local stencils
/// around a given point by scaling each component with a half width.
pub trait CodedDesign<F: Float> {
    /// Dimension of the design points
    fn nx(&self) -> usize;

    /// Generates the (n_points, nx)-shaped array of the design points in coded units
    ///
    /// # Returns
    ///
    /// * A (n_points, nx) matrix where each point belongs to `[-1., 1.]^nx`
    fn coded_points(&self) -> Array2<F>;

    /// Generates the stencil `center + coded_points * half_widths`
    ///
    /// # Parameters
    ///
    /// * `center`: the (nx,) point the design is centered on
    /// * `half_widths`: the (nx,) displacement applied for a coded value of 1.
    ///
    /// # Returns
    ///
    /// * A (n_points, nx) matrix
    ///
    /// *Panics* if `center` or `half_widths` length is not `nx`
    fn stencil(
        &self,
        center: &ArrayBase<impl Data<Elem = F>, Ix1>,
        half_widths: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        assert_eq!(center.len(), self.nx(), "center dimension mismatch");
        assert_eq!(half_widths.len(), self.nx(), "half widths dimension mismatch");
        self.coded_points() * half_widths + center
    }
}
