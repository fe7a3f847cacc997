//! Value-threshold masking.

use cmor_model::Cube;

/// Mask values strictly above `threshold`; equal values stay unmasked.
pub fn mask_above_threshold(cube: &mut Cube, threshold: f64) {
    cube.data_mut().mask_where(|value| value > threshold);
}

/// Mask values strictly below `threshold`; equal values stay unmasked.
pub fn mask_below_threshold(cube: &mut Cube, threshold: f64) {
    cube.data_mut().mask_where(|value| value < threshold);
}

/// Mask values inside `[minimum, maximum]`, bounds included.
pub fn mask_inside_range(cube: &mut Cube, minimum: f64, maximum: f64) {
    cube.data_mut()
        .mask_where(|value| value >= minimum && value <= maximum);
}

/// Mask values outside `[minimum, maximum]`, bounds kept.
pub fn mask_outside_range(cube: &mut Cube, minimum: f64, maximum: f64) {
    cube.data_mut()
        .mask_where(|value| value < minimum || value > maximum);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmor_model::{MaskedArray, Unit};

    fn cube() -> Cube {
        let data = MaskedArray::from_shape_vec(&[5], vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        Cube::new("pr", data, Unit::parse("kg m-2 s-1").unwrap())
    }

    fn mask_vec(cube: &Cube) -> Vec<bool> {
        cube.data().mask().iter().copied().collect()
    }

    #[test]
    fn above_keeps_equal_values() {
        let mut cube = cube();
        mask_above_threshold(&mut cube, 3.0);
        assert_eq!(mask_vec(&cube), vec![false, false, false, true, true]);
    }

    #[test]
    fn below_keeps_equal_values() {
        let mut cube = cube();
        mask_below_threshold(&mut cube, 3.0);
        assert_eq!(mask_vec(&cube), vec![true, true, false, false, false]);
    }

    #[test]
    fn inside_range_includes_bounds() {
        let mut cube = cube();
        mask_inside_range(&mut cube, 2.0, 4.0);
        assert_eq!(mask_vec(&cube), vec![false, true, true, true, false]);
    }

    #[test]
    fn outside_range_keeps_bounds() {
        let mut cube = cube();
        mask_outside_range(&mut cube, 2.0, 4.0);
        assert_eq!(mask_vec(&cube), vec![true, false, false, false, true]);
    }
}
