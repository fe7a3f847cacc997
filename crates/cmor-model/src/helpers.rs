//! Small cube-editing helpers shared by dataset-specific fixes.

use tracing::debug;

use crate::coordinate::Coordinate;
use crate::cube::Cube;
use crate::error::CubeError;
use crate::units::Unit;

/// Attach a scalar `height` coordinate (meters, positive up). Near-surface
/// variables are reported at 2 m unless the dataset says otherwise.
pub fn add_scalar_height_coord(cube: &mut Cube, height: f64) -> Result<(), CubeError> {
    debug!("adding height coordinate ({height}m)");
    let coord = Coordinate::new("height", vec![height], Unit::parse("m")?)
        .with_standard_name("height")
        .with_long_name("height")
        .with_attribute("positive", "up");
    cube.add_aux_coord(coord, &[])
}

/// Round the points and bounds of every dimension coordinate of the given
/// cubes, clearing float noise introduced by format conversions upstream.
pub fn round_coordinates(cubes: &mut [Cube], decimals: i32) {
    let scale = 10f64.powi(decimals);
    for cube in cubes {
        let names: Vec<String> = cube
            .dim_coords()
            .map(|(coord, _)| coord.var_name.clone())
            .collect();
        for name in names {
            let Some(coord) = cube.dim_coord_mut(&name) else {
                continue;
            };
            let points = coord
                .points()
                .iter()
                .map(|p| (p * scale).round() / scale)
                .collect();
            coord.set_points(points);
            let rounded = coord.bounds().map(|bounds| {
                bounds
                    .iter()
                    .map(|b| (b * scale).round() / scale)
                    .collect::<Vec<f64>>()
            });
            if rounded.is_some() {
                coord.set_bounds(rounded);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::MaskedArray;

    fn small_cube() -> Cube {
        let data = MaskedArray::from_shape_vec(&[2], vec![1.0, 2.0]).unwrap();
        let mut cube = Cube::new("tas", data, Unit::parse("K").unwrap());
        let lat = Coordinate::new(
            "lat",
            vec![10.000004, 20.000004],
            Unit::parse("degrees_north").unwrap(),
        );
        cube.add_dim_coord(lat, 0).unwrap();
        cube
    }

    #[test]
    fn height_coordinate_defaults() {
        let mut cube = small_cube();
        add_scalar_height_coord(&mut cube, 2.0).unwrap();
        let height = cube.coord("height").unwrap();
        assert_eq!(height.points(), &[2.0]);
        assert_eq!(height.attributes.get("positive").unwrap(), "up");
    }

    #[test]
    fn rounding_clears_noise() {
        let mut cubes = [small_cube()];
        round_coordinates(&mut cubes, 5);
        assert_eq!(cubes[0].dim_coord("lat").unwrap().points(), &[10.0, 20.0]);
    }
}
