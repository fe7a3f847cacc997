use thiserror::Error;

use crate::units::UnitError;

#[derive(Debug, Error)]
pub enum CubeError {
    #[error("coordinate {name} not found")]
    CoordinateNotFound { name: String },

    #[error("coordinate {name} does not match the cube shape")]
    ShapeMismatch { name: String },

    #[error("coordinate {name} does not span exactly one dimension")]
    NotOneDimensional { name: String },

    #[error("axis {axis} out of range for a {ndim}-dimensional cube")]
    AxisOutOfRange { axis: usize, ndim: usize },

    #[error("data and mask shapes differ")]
    MaskShapeMismatch,

    #[error(transparent)]
    Units(#[from] UnitError),
}
