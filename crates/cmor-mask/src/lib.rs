//! Masking operations for validated climate cubes: land/sea/ice masking
//! from fx cubes, value-threshold masking and multi-dataset missing-values
//! masking.

pub mod error;
pub mod fillvalues;
pub mod fx;
pub mod threshold;

pub use error::MaskError;
pub use fillvalues::mask_fillvalues;
pub use fx::{FxMaskSource, MaskTarget, fx_mask, mask_landsea, mask_landseaice};
pub use threshold::{
    mask_above_threshold, mask_below_threshold, mask_inside_range, mask_outside_range,
};
