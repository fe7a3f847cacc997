//! Land/sea/ice masking from fx cubes.
//!
//! The fx variables carry grid-cell percentages: `sftlf` (land area
//! fraction), `sftof` (sea area fraction) and `sftgif` (ice sheet fraction).
//! Masks use the 50 % conventions of the CMIP preprocessing chain.

use ndarray::{ArrayD, Zip};
use tracing::debug;

use cmor_model::Cube;

use crate::error::MaskError;

/// Which fx variable a mask is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxMaskSource {
    /// Land area fraction.
    Sftlf,
    /// Sea area fraction.
    Sftof,
    /// Ice sheet fraction.
    Sftgif,
}

impl FxMaskSource {
    pub fn from_var_name(name: &str) -> Option<Self> {
        match name {
            "sftlf" => Some(Self::Sftlf),
            "sftof" => Some(Self::Sftof),
            "sftgif" => Some(Self::Sftgif),
            _ => None,
        }
    }
}

/// What gets masked out of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskTarget {
    Land,
    Sea,
    Ice,
    LandSea,
}

/// Mask out land or sea using the first usable fx cube; `sftlf` is
/// preferred over `sftof`.
pub fn mask_landsea(
    cube: &mut Cube,
    fx_cubes: &[Cube],
    mask_out: MaskTarget,
) -> Result<(), MaskError> {
    for source in [FxMaskSource::Sftlf, FxMaskSource::Sftof] {
        let Some(fx) = fx_cubes
            .iter()
            .find(|fx| FxMaskSource::from_var_name(&fx.var_name) == Some(source))
        else {
            continue;
        };
        if !grids_match(cube, fx) {
            debug!("data cube and {} mask differ in grid dims", fx.var_name);
            continue;
        }
        let mask = fx_mask(fx.data().data(), source, mask_out);
        cube.data_mut()
            .or_mask(&mask)
            .map_err(|_| MaskError::IncompatibleGrid)?;
        debug!("applying land-sea mask: {:?}", source);
        return Ok(());
    }
    Err(MaskError::MissingFxCube)
}

/// Mask out combined land+sea or ice using an `sftgif` fx cube.
pub fn mask_landseaice(
    cube: &mut Cube,
    fx_cubes: &[Cube],
    mask_out: MaskTarget,
) -> Result<(), MaskError> {
    let fx = fx_cubes
        .iter()
        .find(|fx| FxMaskSource::from_var_name(&fx.var_name) == Some(FxMaskSource::Sftgif))
        .ok_or(MaskError::MissingFxCube)?;
    if !grids_match(cube, fx) {
        return Err(MaskError::IncompatibleGrid);
    }
    let mask = fx_mask(fx.data().data(), FxMaskSource::Sftgif, mask_out);
    cube.data_mut()
        .or_mask(&mask)
        .map_err(|_| MaskError::IncompatibleGrid)?;
    debug!("applying landsea-ice mask: sftgif");
    Ok(())
}

/// Build a percentage-thresholded mask from fx data.
pub fn fx_mask(fx_data: &ArrayD<f64>, source: FxMaskSource, mask_out: MaskTarget) -> ArrayD<bool> {
    let mut mask = ArrayD::from_elem(fx_data.raw_dim(), false);
    Zip::from(&mut mask).and(fx_data).for_each(|masked, &value| {
        *masked = match (source, mask_out) {
            (FxMaskSource::Sftlf, MaskTarget::Land) => value > 50.0,
            (FxMaskSource::Sftlf, MaskTarget::Sea) => value <= 50.0,
            (FxMaskSource::Sftof, MaskTarget::Land) => value < 50.0,
            (FxMaskSource::Sftof, MaskTarget::Sea) => value >= 50.0,
            (FxMaskSource::Sftgif, MaskTarget::Ice) => value > 50.0,
            (FxMaskSource::Sftgif, MaskTarget::LandSea) => value <= 50.0,
            _ => false,
        };
    });
    mask
}

/// The fx grid must agree with the data grid in lat/lon rank and length.
fn grids_match(cube: &Cube, fx: &Cube) -> bool {
    let grid = |c: &Cube, name: &str| {
        c.coord_by_standard_name(name)
            .map(|coord| (coord.ndim(), coord.len()))
    };
    grid(cube, "longitude").is_some()
        && grid(cube, "longitude") == grid(fx, "longitude")
        && grid(cube, "latitude") == grid(fx, "latitude")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmor_model::{Coordinate, MaskedArray, Unit};
    use ndarray::IxDyn;

    fn grid(var_name: &str, values: Vec<f64>) -> Cube {
        let data = MaskedArray::from_shape_vec(&[2, 2], values).unwrap();
        let mut cube = Cube::new(var_name, data, Unit::parse("%").unwrap());
        let lat = Coordinate::new("lat", vec![-45.0, 45.0], Unit::parse("degrees_north").unwrap())
            .with_standard_name("latitude");
        let lon = Coordinate::new("lon", vec![90.0, 270.0], Unit::parse("degrees_east").unwrap())
            .with_standard_name("longitude");
        cube.add_dim_coord(lat, 0).unwrap();
        cube.add_dim_coord(lon, 1).unwrap();
        cube
    }

    #[test]
    fn sftlf_fifty_percent_convention() {
        let fx = ArrayD::from_shape_vec(IxDyn(&[2]), vec![80.0, 20.0]).unwrap();
        let land = fx_mask(&fx, FxMaskSource::Sftlf, MaskTarget::Land);
        assert_eq!(land.as_slice().unwrap(), &[true, false]);
        let sea = fx_mask(&fx, FxMaskSource::Sftlf, MaskTarget::Sea);
        assert_eq!(sea.as_slice().unwrap(), &[false, true]);
    }

    #[test]
    fn sftof_is_inverted() {
        let fx = ArrayD::from_shape_vec(IxDyn(&[2]), vec![80.0, 20.0]).unwrap();
        let land = fx_mask(&fx, FxMaskSource::Sftof, MaskTarget::Land);
        assert_eq!(land.as_slice().unwrap(), &[false, true]);
    }

    #[test]
    fn landsea_masks_land_points() {
        let mut cube = grid("tas", vec![1.0, 2.0, 3.0, 4.0]);
        let fx = grid("sftlf", vec![100.0, 0.0, 0.0, 100.0]);
        mask_landsea(&mut cube, &[fx], MaskTarget::Land).unwrap();
        assert!(cube.data().mask()[[0, 0]]);
        assert!(!cube.data().mask()[[0, 1]]);
        assert!(cube.data().mask()[[1, 1]]);
    }

    #[test]
    fn missing_fx_cube_is_an_error() {
        let mut cube = grid("tas", vec![1.0, 2.0, 3.0, 4.0]);
        let err = mask_landsea(&mut cube, &[], MaskTarget::Land).unwrap_err();
        assert!(matches!(err, MaskError::MissingFxCube));
    }

    #[test]
    fn mismatched_grid_is_an_error_for_ice() {
        let mut cube = grid("tas", vec![1.0, 2.0, 3.0, 4.0]);
        let data = MaskedArray::from_shape_vec(&[1, 1], vec![100.0]).unwrap();
        let mut fx = Cube::new("sftgif", data, Unit::parse("%").unwrap());
        let lat = Coordinate::new("lat", vec![0.0], Unit::parse("degrees_north").unwrap())
            .with_standard_name("latitude");
        let lon = Coordinate::new("lon", vec![0.0], Unit::parse("degrees_east").unwrap())
            .with_standard_name("longitude");
        fx.add_dim_coord(lat, 0).unwrap();
        fx.add_dim_coord(lon, 1).unwrap();
        let err = mask_landseaice(&mut cube, &[fx], MaskTarget::Ice).unwrap_err();
        assert!(matches!(err, MaskError::IncompatibleGrid));
    }
}
