//! Coordinate axes: named, unit-bearing point sequences with optional bounds.

use ndarray::{ArrayD, Axis, IxDyn};

use crate::error::CubeError;
use crate::units::{Unit, UnitError};

/// A coordinate of a cube. Dimension coordinates are rank 1; auxiliary
/// coordinates may span several cube dimensions, in which case `shape`
/// describes the point layout in row-major order.
#[derive(Debug, Clone)]
pub struct Coordinate {
    pub var_name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    pub units: Unit,
    pub attributes: std::collections::BTreeMap<String, String>,
    points: Vec<f64>,
    shape: Vec<usize>,
    bounds: Option<Vec<f64>>,
}

impl Coordinate {
    pub fn new(var_name: &str, points: Vec<f64>, units: Unit) -> Self {
        let shape = vec![points.len()];
        Self {
            var_name: var_name.to_string(),
            standard_name: None,
            long_name: None,
            units,
            attributes: std::collections::BTreeMap::new(),
            points,
            shape,
            bounds: None,
        }
    }

    pub fn with_standard_name(mut self, name: &str) -> Self {
        self.standard_name = Some(name.to_string());
        self
    }

    pub fn with_long_name(mut self, name: &str) -> Self {
        self.long_name = Some(name.to_string());
        self
    }

    /// Contiguous cell bounds, two per point.
    pub fn with_bounds(mut self, bounds: Vec<f64>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Reshape the points for a coordinate spanning several dimensions.
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), self.points.len());
        self.shape = shape;
        self
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn set_points(&mut self, points: Vec<f64>) {
        if self.shape.len() == 1 {
            self.shape = vec![points.len()];
        }
        self.points = points;
    }

    pub fn bounds(&self) -> Option<&[f64]> {
        self.bounds.as_deref()
    }

    pub fn set_bounds(&mut self, bounds: Option<Vec<f64>>) {
        self.bounds = bounds;
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Strictly monotonic in either direction. Multidimensional coordinates
    /// have no ordering and never count as monotonic.
    pub fn is_monotonic(&self) -> bool {
        if self.ndim() > 1 {
            return false;
        }
        if self.points.len() < 2 {
            return true;
        }
        let increasing = self.points.windows(2).all(|pair| pair[0] < pair[1]);
        let decreasing = self.points.windows(2).all(|pair| pair[0] > pair[1]);
        increasing || decreasing
    }

    /// Convert points and bounds to `target` and adopt it as the unit.
    pub fn convert_units(&mut self, target: &Unit) -> Result<(), UnitError> {
        let conversion = self.units.conversion_to(target)?;
        for point in &mut self.points {
            *point = conversion.apply(*point);
        }
        if let Some(bounds) = &mut self.bounds {
            for bound in bounds.iter_mut() {
                *bound = conversion.apply(*bound);
            }
        }
        self.units = target.clone();
        Ok(())
    }

    /// Reverse the point order along one of the coordinate's own axes.
    pub(crate) fn reverse_axis(&mut self, local_axis: usize) -> Result<(), CubeError> {
        let mut points = ArrayD::from_shape_vec(IxDyn(&self.shape), self.points.clone())
            .map_err(|_| CubeError::ShapeMismatch {
                name: self.var_name.clone(),
            })?;
        points.invert_axis(Axis(local_axis));
        self.points = points.iter().copied().collect();
        if self.ndim() == 1
            && let Some(bounds) = &mut self.bounds
        {
            let mut reversed = Vec::with_capacity(bounds.len());
            for pair in bounds.chunks(2).rev() {
                reversed.extend_from_slice(pair);
            }
            *bounds = reversed;
        }
        Ok(())
    }

    /// Re-order the points along one of the coordinate's own axes.
    pub(crate) fn select_axis(
        &mut self,
        local_axis: usize,
        order: &[usize],
    ) -> Result<(), CubeError> {
        let points = ArrayD::from_shape_vec(IxDyn(&self.shape), self.points.clone())
            .map_err(|_| CubeError::ShapeMismatch {
                name: self.var_name.clone(),
            })?;
        let selected = points.select(Axis(local_axis), order);
        self.points = selected.iter().copied().collect();
        if self.ndim() == 1
            && let Some(bounds) = self.bounds.take()
        {
            let mut reordered = Vec::with_capacity(bounds.len());
            for &i in order {
                reordered.push(bounds[2 * i]);
                reordered.push(bounds[2 * i + 1]);
            }
            self.bounds = Some(reordered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(points: Vec<f64>) -> Coordinate {
        Coordinate::new("x", points, Unit::dimensionless())
    }

    #[test]
    fn monotonicity() {
        assert!(plain(vec![1.0, 2.0, 3.0]).is_monotonic());
        assert!(plain(vec![3.0, 2.0, 1.0]).is_monotonic());
        assert!(!plain(vec![1.0, 3.0, 2.0]).is_monotonic());
        assert!(!plain(vec![1.0, 1.0, 2.0]).is_monotonic());
        assert!(plain(vec![5.0]).is_monotonic());
        assert!(!plain(vec![1.0, 2.0, 3.0, 4.0]).with_shape(vec![2, 2]).is_monotonic());
    }

    #[test]
    fn reverse_flips_points_and_bounds() {
        let mut coord = plain(vec![1.0, 2.0, 3.0]).with_bounds(vec![0.5, 1.5, 1.5, 2.5, 2.5, 3.5]);
        coord.reverse_axis(0).unwrap();
        assert_eq!(coord.points(), &[3.0, 2.0, 1.0]);
        assert_eq!(coord.bounds().unwrap(), &[2.5, 3.5, 1.5, 2.5, 0.5, 1.5]);
    }

    #[test]
    fn unit_conversion_rewrites_points() {
        let mut coord = Coordinate::new("plev", vec![1000.0, 850.0], Unit::parse("hPa").unwrap());
        coord.convert_units(&Unit::parse("Pa").unwrap()).unwrap();
        assert_eq!(coord.points(), &[100_000.0, 85_000.0]);
        assert_eq!(coord.units.to_string(), "Pa");
    }
}
