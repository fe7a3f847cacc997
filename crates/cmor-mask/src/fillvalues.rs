//! Multi-dataset missing-values masking.
//!
//! A grid point is considered under-sampled when too few of its time windows
//! are fully populated with valid values. The per-cube masks are combined
//! (skipping all-masked levels, which indicate data that was never there)
//! and the combined mask is applied back to every cube.

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use tracing::debug;

use cmor_model::Cube;

use crate::error::MaskError;

/// Compute and apply a combined fill-values mask across `cubes`.
///
/// `threshold_fraction` is the minimum fraction of fully-valid windows a
/// grid point must have; `min_value` is the validity floor for a data
/// point; `time_window` is the window length in time steps.
pub fn mask_fillvalues(
    cubes: &mut [Cube],
    threshold_fraction: f64,
    min_value: f64,
    time_window: usize,
) -> Result<(), MaskError> {
    if !(0.0..=1.0).contains(&threshold_fraction) {
        return Err(MaskError::InvalidFraction(threshold_fraction));
    }

    debug!("creating fillvalues mask");
    let mut combined: Option<ArrayD<bool>> = None;
    for cube in cubes.iter() {
        let mask = fillvalues_mask(cube, threshold_fraction, min_value, time_window)?;
        match &mut combined {
            None => {
                let mut base = ArrayD::from_elem(IxDyn(mask.shape()), false);
                merge(&mut base, &mask)?;
                combined = Some(base);
            }
            Some(total) => {
                if total.shape() != mask.shape() {
                    return Err(MaskError::IncompatibleGrid);
                }
                merge(total, &mask)?;
            }
        }
    }

    if let Some(combined) = combined
        && combined.iter().any(|&masked| masked)
    {
        debug!("applying fillvalues mask");
        for cube in cubes.iter_mut() {
            cube.data_mut().or_mask(&combined)?;
        }
    }
    Ok(())
}

/// OR a per-cube mask into the combined one, keeping all-masked levels out
/// of the combination.
fn merge(combined: &mut ArrayD<bool>, mask: &ArrayD<bool>) -> Result<(), MaskError> {
    match mask.ndim() {
        2 => {
            if !mask.iter().all(|&masked| masked) {
                Zip::from(combined).and(mask).for_each(|c, &m| *c = *c || m);
            }
            Ok(())
        }
        3 => {
            for (mut combined_level, mask_level) in
                combined.outer_iter_mut().zip(mask.outer_iter())
            {
                if !mask_level.iter().all(|&masked| masked) {
                    Zip::from(&mut combined_level)
                        .and(&mask_level)
                        .for_each(|c, &m| *c = *c || m);
                }
            }
            Ok(())
        }
        other => Err(MaskError::UnsupportedDimensionality(other)),
    }
}

/// The per-cube missing-values mask: count non-overlapping time windows
/// whose values are all valid and above `min_value`, and mask grid points
/// whose count falls below the fractional threshold.
fn fillvalues_mask(
    cube: &Cube,
    threshold_fraction: f64,
    min_value: f64,
    time_window: usize,
) -> Result<ArrayD<bool>, MaskError> {
    let axis = cube
        .coord_dims("time")
        .and_then(|dims| dims.first().copied())
        .ok_or(MaskError::MissingTimeCoordinate)?;
    let n_time = cube.shape()[axis];
    if time_window == 0 || time_window > n_time {
        return Err(MaskError::WindowTooLong);
    }
    let max_windows = n_time / time_window;
    let counts_threshold = (max_windows as f64 * threshold_fraction) as usize;

    let data = cube.data().data();
    let mask = cube.data().mask();
    let mut out_shape: Vec<usize> = cube.shape().to_vec();
    out_shape.remove(axis);
    let mut counts = ArrayD::from_elem(IxDyn(&out_shape), 0usize);

    for ((lane, mask_lane), count) in data
        .lanes(Axis(axis))
        .into_iter()
        .zip(mask.lanes(Axis(axis)))
        .zip(counts.iter_mut())
    {
        let mut windows = 0usize;
        for start in (0..=n_time - time_window).step_by(time_window) {
            let full = (start..start + time_window)
                .all(|i| lane[i] > min_value && !mask_lane[i]);
            if full {
                windows += 1;
            }
        }
        *count = windows;
    }

    Ok(counts.mapv(|count| count < counts_threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmor_model::{Coordinate, MaskedArray, Unit};

    /// time x lat x lon cube (lon of length 1) with time on axis 0, so the
    /// collapsed mask is 2-D.
    fn series_cube(values: Vec<f64>, lat_len: usize) -> Cube {
        let n_time = values.len() / lat_len;
        let data = MaskedArray::from_shape_vec(&[n_time, lat_len, 1], values).unwrap();
        let mut cube = Cube::new("pr", data, Unit::parse("kg m-2 s-1").unwrap());
        let time = Coordinate::new(
            "time",
            (0..n_time).map(|i| i as f64).collect(),
            Unit::parse("days since 1950-01-01").unwrap(),
        )
        .with_standard_name("time");
        cube.add_dim_coord(time, 0).unwrap();
        let lat = Coordinate::new(
            "lat",
            (0..lat_len).map(|i| i as f64).collect(),
            Unit::parse("degrees_north").unwrap(),
        )
        .with_standard_name("latitude");
        cube.add_dim_coord(lat, 1).unwrap();
        let lon = Coordinate::new("lon", vec![0.0], Unit::parse("degrees_east").unwrap())
            .with_standard_name("longitude");
        cube.add_dim_coord(lon, 2).unwrap();
        cube
    }

    #[test]
    fn under_sampled_points_are_masked() {
        // Two grid points over 4 time steps: the first is fully valid, the
        // second sits below the validity floor everywhere.
        let values = vec![
            1.0, -1e11, //
            1.0, -1e11, //
            1.0, -1e11, //
            1.0, -1e11,
        ];
        let mut cubes = [series_cube(values, 2)];
        mask_fillvalues(&mut cubes, 0.95, -1e10, 1).unwrap();
        assert!(!cubes[0].data().mask()[[0, 0, 0]]);
        assert!(cubes[0].data().mask()[[0, 1, 0]]);
    }

    #[test]
    fn fully_valid_data_is_untouched() {
        let mut cubes = [series_cube(vec![1.0; 8], 2)];
        mask_fillvalues(&mut cubes, 0.5, -1e10, 2).unwrap();
        assert!(cubes[0].data().mask().iter().all(|&m| !m));
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let mut cubes = [series_cube(vec![1.0; 8], 2)];
        let err = mask_fillvalues(&mut cubes, 1.5, -1e10, 1).unwrap_err();
        assert!(matches!(err, MaskError::InvalidFraction(_)));
    }

    #[test]
    fn window_longer_than_series_is_rejected() {
        let mut cubes = [series_cube(vec![1.0; 8], 2)];
        let err = mask_fillvalues(&mut cubes, 0.5, -1e10, 10).unwrap_err();
        assert!(matches!(err, MaskError::WindowTooLong));
    }

    #[test]
    fn mask_combines_across_cubes() {
        let good = vec![1.0; 8];
        let bad = vec![
            1.0, -1e11, //
            1.0, -1e11, //
            1.0, -1e11, //
            1.0, -1e11,
        ];
        let mut cubes = [series_cube(good, 2), series_cube(bad, 2)];
        mask_fillvalues(&mut cubes, 0.95, -1e10, 1).unwrap();
        // The under-sampled point of the second cube masks both cubes.
        assert!(cubes[0].data().mask()[[0, 1, 0]]);
        assert!(cubes[1].data().mask()[[0, 1, 0]]);
    }
}
