/*!
This library implements the coded Designs of Experiments (DoE) used to build
local stencils around a training point:
* [Full Factorial design](FullFactorial) with any number of levels,
* [Box-Behnken design](BoxBehnken).

A coded design is a set of points in `[-1., 1.]^nx`. A stencil is obtained by
scaling the coded points with per-component half widths and translating them
to the stencil center.

Example:
```
use kriging_doe::{BoxBehnken, CodedDesign, FullFactorial};
use ndarray::array;

// 9-point stencil around (1., 2.) with steps 0.1 and 0.2
let stencil = FullFactorial::new(2, 3).stencil(&array![1., 2.], &array![0.1, 0.2]);
assert_eq!(stencil.nrows(), 9);
// Box-Behnken stencil in dimension 4 (one center point)
let stencil = BoxBehnken::new(4).stencil(&array![0., 0., 0., 0.], &array![1., 1., 1., 1.]);
assert_eq!(stencil.nrows(), 25);
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod box_behnken;
mod full_factorial;
mod traits;

pub use box_behnken::*;
pub use full_factorial::*;
pub use traits::*;
