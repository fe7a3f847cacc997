use thiserror::Error;

use cmor_model::CubeError;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("no usable fx mask cube found")]
    MissingFxCube,

    #[error("fx mask and data have different grid dimensions")]
    IncompatibleGrid,

    #[error("fraction of missing values {0} should be between 0 and 1")]
    InvalidFraction(f64),

    #[error("time window larger than the total time span")]
    WindowTooLong,

    #[error("cube has no time coordinate")]
    MissingTimeCoordinate,

    #[error("unable to handle {0} dimensional data")]
    UnsupportedDimensionality(usize),

    #[error(transparent)]
    Cube(#[from] CubeError),
}
