//! The cube: a labeled N-dimensional masked array with named, unit-bearing
//! coordinate axes and free-form attributes.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, Axis, IxDyn, Zip};

use crate::coordinate::Coordinate;
use crate::error::CubeError;
use crate::units::{Unit, UnitError};

/// Default fill value for masked points, matching the CMIP convention.
pub const DEFAULT_FILL_VALUE: f64 = 1e20;

/// An N-dimensional array with an element-wise validity mask.
#[derive(Debug, Clone)]
pub struct MaskedArray {
    data: ArrayD<f64>,
    mask: ArrayD<bool>,
    pub fill_value: f64,
}

impl MaskedArray {
    pub fn new(data: ArrayD<f64>) -> Self {
        let mask = ArrayD::from_elem(data.raw_dim(), false);
        Self {
            data,
            mask,
            fill_value: DEFAULT_FILL_VALUE,
        }
    }

    pub fn with_mask(data: ArrayD<f64>, mask: ArrayD<bool>) -> Result<Self, CubeError> {
        if data.shape() != mask.shape() {
            return Err(CubeError::MaskShapeMismatch);
        }
        Ok(Self {
            data,
            mask,
            fill_value: DEFAULT_FILL_VALUE,
        })
    }

    pub fn from_shape_vec(shape: &[usize], values: Vec<f64>) -> Result<Self, CubeError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| CubeError::MaskShapeMismatch)?;
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Mask every element whose value satisfies the predicate.
    pub fn mask_where(&mut self, predicate: impl Fn(f64) -> bool) {
        Zip::from(&mut self.mask)
            .and(&self.data)
            .for_each(|masked, &value| {
                if predicate(value) {
                    *masked = true;
                }
            });
    }

    /// OR another mask into this one, broadcasting over leading dimensions
    /// the way trailing-aligned array broadcasting works.
    pub fn or_mask(&mut self, other: &ArrayD<bool>) -> Result<(), CubeError> {
        let broadcast = other
            .broadcast(self.data.raw_dim())
            .ok_or(CubeError::MaskShapeMismatch)?;
        Zip::from(&mut self.mask)
            .and(&broadcast)
            .for_each(|masked, &bit| *masked = *masked || bit);
        Ok(())
    }

    pub fn map_values(&mut self, f: impl Fn(f64) -> f64) {
        self.data.mapv_inplace(f);
    }

    pub(crate) fn invert_axis(&mut self, axis: usize) {
        self.data.invert_axis(Axis(axis));
        self.mask.invert_axis(Axis(axis));
    }

    pub(crate) fn select(&mut self, axis: usize, order: &[usize]) {
        self.data = self.data.select(Axis(axis), order);
        self.mask = self.mask.select(Axis(axis), order);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordKind {
    Dimension,
    Auxiliary,
}

#[derive(Debug, Clone)]
struct CoordEntry {
    coord: Coordinate,
    dims: Vec<usize>,
    kind: CoordKind,
}

/// A labeled multidimensional array: name, units, attributes, data and a
/// set of dimension and auxiliary coordinates mapped onto the data axes.
#[derive(Debug, Clone)]
pub struct Cube {
    pub var_name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    pub units: Unit,
    pub attributes: BTreeMap<String, String>,
    data: MaskedArray,
    coords: Vec<CoordEntry>,
}

impl Cube {
    pub fn new(var_name: &str, data: MaskedArray, units: Unit) -> Self {
        Self {
            var_name: var_name.to_string(),
            standard_name: None,
            long_name: None,
            units,
            attributes: BTreeMap::new(),
            data,
            coords: Vec::new(),
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

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &MaskedArray {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut MaskedArray {
        &mut self.data
    }

    /// Attach a rank-1 dimension coordinate to one data axis.
    pub fn add_dim_coord(&mut self, coord: Coordinate, dim: usize) -> Result<(), CubeError> {
        if dim >= self.ndim() {
            return Err(CubeError::AxisOutOfRange {
                axis: dim,
                ndim: self.ndim(),
            });
        }
        if coord.ndim() != 1 || coord.len() != self.shape()[dim] {
            return Err(CubeError::ShapeMismatch {
                name: coord.var_name.clone(),
            });
        }
        self.coords.push(CoordEntry {
            coord,
            dims: vec![dim],
            kind: CoordKind::Dimension,
        });
        Ok(())
    }

    /// Attach an auxiliary coordinate spanning the given data axes. An empty
    /// axis list attaches a scalar coordinate.
    pub fn add_aux_coord(&mut self, coord: Coordinate, dims: &[usize]) -> Result<(), CubeError> {
        for &dim in dims {
            if dim >= self.ndim() {
                return Err(CubeError::AxisOutOfRange {
                    axis: dim,
                    ndim: self.ndim(),
                });
            }
        }
        let expected: usize = dims.iter().map(|&d| self.shape()[d]).product();
        let expected = if dims.is_empty() { 1 } else { expected };
        if coord.len() != expected {
            return Err(CubeError::ShapeMismatch {
                name: coord.var_name.clone(),
            });
        }
        self.coords.push(CoordEntry {
            coord,
            dims: dims.to_vec(),
            kind: CoordKind::Auxiliary,
        });
        Ok(())
    }

    pub fn dim_coord(&self, var_name: &str) -> Option<&Coordinate> {
        self.coords
            .iter()
            .find(|entry| entry.kind == CoordKind::Dimension && entry.coord.var_name == var_name)
            .map(|entry| &entry.coord)
    }

    pub fn dim_coord_mut(&mut self, var_name: &str) -> Option<&mut Coordinate> {
        self.coords
            .iter_mut()
            .find(|entry| entry.kind == CoordKind::Dimension && entry.coord.var_name == var_name)
            .map(|entry| &mut entry.coord)
    }

    /// Any coordinate (dimension first, then auxiliary) with this var name.
    pub fn coord(&self, var_name: &str) -> Option<&Coordinate> {
        self.dim_coord(var_name).or_else(|| {
            self.coords
                .iter()
                .find(|entry| entry.coord.var_name == var_name)
                .map(|entry| &entry.coord)
        })
    }

    /// Mutable lookup across all coordinates, dimension coordinates first.
    pub fn coord_mut(&mut self, var_name: &str) -> Option<&mut Coordinate> {
        let index = self
            .coords
            .iter()
            .position(|entry| {
                entry.kind == CoordKind::Dimension && entry.coord.var_name == var_name
            })
            .or_else(|| {
                self.coords
                    .iter()
                    .position(|entry| entry.coord.var_name == var_name)
            })?;
        Some(&mut self.coords[index].coord)
    }

    pub fn coord_by_standard_name(&self, standard_name: &str) -> Option<&Coordinate> {
        self.coords
            .iter()
            .find(|entry| entry.coord.standard_name.as_deref() == Some(standard_name))
            .map(|entry| &entry.coord)
    }

    /// The data axes spanned by the named coordinate.
    pub fn coord_dims(&self, var_name: &str) -> Option<&[usize]> {
        self.coords
            .iter()
            .find(|entry| entry.coord.var_name == var_name)
            .map(|entry| entry.dims.as_slice())
    }

    pub fn coord_dims_by_standard_name(&self, standard_name: &str) -> Option<&[usize]> {
        self.coords
            .iter()
            .find(|entry| entry.coord.standard_name.as_deref() == Some(standard_name))
            .map(|entry| entry.dims.as_slice())
    }

    pub fn dim_coords(&self) -> impl Iterator<Item = (&Coordinate, usize)> {
        self.coords
            .iter()
            .filter(|entry| entry.kind == CoordKind::Dimension)
            .map(|entry| (&entry.coord, entry.dims[0]))
    }

    pub fn aux_coords(&self) -> impl Iterator<Item = &Coordinate> {
        self.coords
            .iter()
            .filter(|entry| entry.kind == CoordKind::Auxiliary)
            .map(|entry| &entry.coord)
    }

    pub fn has_coord(&self, var_name: &str) -> bool {
        self.coords
            .iter()
            .any(|entry| entry.coord.var_name == var_name)
    }

    /// Convert the data to `target` and adopt it as the cube unit.
    pub fn convert_units(&mut self, target: &Unit) -> Result<(), UnitError> {
        let conversion = self.units.conversion_to(target)?;
        self.data.map_values(|value| conversion.apply(value));
        self.units = target.clone();
        Ok(())
    }

    /// Reverse the cube along one axis: the data, the mask and every
    /// coordinate spanning that axis.
    pub fn reverse(&mut self, axis: usize) -> Result<(), CubeError> {
        if axis >= self.ndim() {
            return Err(CubeError::AxisOutOfRange {
                axis,
                ndim: self.ndim(),
            });
        }
        self.data.invert_axis(axis);
        for entry in &mut self.coords {
            if let Some(local) = entry.dims.iter().position(|&d| d == axis) {
                entry.coord.reverse_axis(local)?;
            }
        }
        Ok(())
    }

    /// Re-wrap a longitude-like coordinate into [0, 360) and re-order the
    /// cube along its axis so the coordinate stays monotonically increasing.
    pub fn intersect_longitude(&mut self, var_name: &str) -> Result<(), CubeError> {
        let entry = self
            .coords
            .iter()
            .find(|entry| entry.coord.var_name == var_name)
            .ok_or_else(|| CubeError::CoordinateNotFound {
                name: var_name.to_string(),
            })?;
        if entry.dims.len() != 1 || entry.coord.ndim() != 1 {
            return Err(CubeError::NotOneDimensional {
                name: var_name.to_string(),
            });
        }
        let axis = entry.dims[0];

        let original = entry.coord.points().to_vec();
        let wrapped: Vec<f64> = original.iter().map(|p| p.rem_euclid(360.0)).collect();
        let mut order: Vec<usize> = (0..wrapped.len()).collect();
        order.sort_by(|&a, &b| {
            wrapped[a]
                .partial_cmp(&wrapped[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for entry in &mut self.coords {
            let Some(local) = entry.dims.iter().position(|&d| d == axis) else {
                continue;
            };
            if entry.coord.var_name == var_name {
                let points: Vec<f64> = order.iter().map(|&i| wrapped[i]).collect();
                let bounds = entry.coord.bounds().map(|bounds| {
                    let mut rewrapped = Vec::with_capacity(bounds.len());
                    for &i in &order {
                        let delta = wrapped[i] - original[i];
                        rewrapped.push(bounds[2 * i] + delta);
                        rewrapped.push(bounds[2 * i + 1] + delta);
                    }
                    rewrapped
                });
                entry.coord.set_points(points);
                entry.coord.set_bounds(bounds);
            } else {
                entry.coord.select_axis(local, &order)?;
            }
        }
        self.data.select(axis, &order);
        Ok(())
    }

    fn axis_label(&self, axis: usize) -> &str {
        self.coords
            .iter()
            .find(|entry| entry.kind == CoordKind::Dimension && entry.dims == [axis])
            .map_or("--", |entry| entry.coord.var_name.as_str())
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = (0..self.ndim())
            .map(|axis| format!("{}: {}", self.axis_label(axis), self.shape()[axis]))
            .collect();
        writeln!(f, "{} / ({})  ({})", self.var_name, self.units, dims.join("; "))?;
        let dim_names: Vec<&str> = self
            .coords
            .iter()
            .filter(|entry| entry.kind == CoordKind::Dimension)
            .map(|entry| entry.coord.var_name.as_str())
            .collect();
        if !dim_names.is_empty() {
            writeln!(f, "    Dimension coordinates:")?;
            for name in dim_names {
                writeln!(f, "        {name}")?;
            }
        }
        let aux_names: Vec<&str> = self
            .coords
            .iter()
            .filter(|entry| entry.kind == CoordKind::Auxiliary)
            .map(|entry| entry.coord.var_name.as_str())
            .collect();
        if !aux_names.is_empty() {
            writeln!(f, "    Auxiliary coordinates:")?;
            for name in aux_names {
                writeln!(f, "        {name}")?;
            }
        }
        if !self.attributes.is_empty() {
            writeln!(f, "    Attributes:")?;
            for (key, value) in &self.attributes {
                writeln!(f, "        {key}: {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    fn grid_cube() -> Cube {
        // 2 x 3 grid, values row-major 0..6
        let data = MaskedArray::from_shape_vec(&[2, 3], (0..6).map(f64::from).collect()).unwrap();
        let mut cube = Cube::new("tas", data, Unit::parse("K").unwrap());
        let lat = Coordinate::new(
            "lat",
            vec![-45.0, 45.0],
            Unit::parse("degrees_north").unwrap(),
        )
        .with_standard_name("latitude");
        let lon = Coordinate::new(
            "lon",
            vec![-10.0, 10.0, 30.0],
            Unit::parse("degrees_east").unwrap(),
        )
        .with_standard_name("longitude");
        cube.add_dim_coord(lat, 0).unwrap();
        cube.add_dim_coord(lon, 1).unwrap();
        cube
    }

    #[test]
    fn reverse_flips_data_and_coordinate() {
        let mut cube = grid_cube();
        cube.reverse(0).unwrap();
        assert_eq!(cube.dim_coord("lat").unwrap().points(), &[45.0, -45.0]);
        assert_eq!(cube.data().data()[[0, 0]], 3.0);
        assert_eq!(cube.data().data()[[1, 0]], 0.0);
    }

    #[test]
    fn longitude_intersection_wraps_and_reorders() {
        let mut cube = grid_cube();
        cube.intersect_longitude("lon").unwrap();
        let lon = cube.dim_coord("lon").unwrap();
        assert_eq!(lon.points(), &[10.0, 30.0, 350.0]);
        // Column previously at -10 now sits at the end.
        assert_eq!(cube.data().data()[[0, 2]], 0.0);
        assert_eq!(cube.data().data()[[0, 0]], 1.0);
        assert!(lon.is_monotonic());
    }

    #[test]
    fn unit_conversion_scales_data() {
        let mut cube = grid_cube();
        cube.convert_units(&Unit::parse("degC").unwrap()).unwrap();
        assert!((cube.data().data()[[0, 0]] - (0.0 - 273.15)).abs() < 1e-9);
        assert_eq!(cube.units.to_string(), "degC");
    }

    #[test]
    fn masked_broadcast_or() {
        let mut data =
            MaskedArray::from_shape_vec(&[2, 2, 2], (0..8).map(f64::from).collect()).unwrap();
        let surface = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![true, false, false, true])
            .unwrap();
        data.or_mask(&surface).unwrap();
        assert!(data.mask()[[0, 0, 0]]);
        assert!(data.mask()[[1, 0, 0]]);
        assert!(!data.mask()[[0, 0, 1]]);
    }

    #[test]
    fn scalar_aux_coord() {
        let mut cube = grid_cube();
        let height = Coordinate::new("height", vec![2.0], Unit::parse("m").unwrap());
        cube.add_aux_coord(height, &[]).unwrap();
        assert!(cube.has_coord("height"));
        assert_eq!(cube.coord_dims("height").unwrap(), &[] as &[usize]);
    }
}
