//! Data model for gridded climate fields: cubes, coordinates, unit algebra
//! and CF calendar arithmetic.

pub mod calendar;
pub mod coordinate;
pub mod cube;
pub mod error;
pub mod helpers;
pub mod units;

pub use calendar::{Calendar, CalendarDate, CalendarError};
pub use coordinate::Coordinate;
pub use cube::{Cube, DEFAULT_FILL_VALUE, MaskedArray};
pub use error::CubeError;
pub use helpers::{add_scalar_height_coord, round_coordinates};
pub use units::{Conversion, Unit, UnitError};
