//! Immutable variable and coordinate specifications.
//!
//! A [`VariableSpec`] is what the checker validates a cube against: the
//! expected standard name, canonical units, positivity, temporal frequency
//! and one [`CoordinateSpec`] per expected coordinate axis.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Expected monotonic direction of a coordinate's point ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredDirection {
    Increasing,
    Decreasing,
}

impl StoredDirection {
    /// Parse the table spelling; anything else means "unset".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "increasing" => Some(Self::Increasing),
            "decreasing" => Some(Self::Decreasing),
            _ => None,
        }
    }
}

impl fmt::Display for StoredDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increasing => f.write_str("increasing"),
            Self::Decreasing => f.write_str("decreasing"),
        }
    }
}

/// Specification of one coordinate axis of a variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateSpec {
    /// Axis identifier in the table (e.g. `longitude`, `plev19`).
    pub name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    /// Variable name the coordinate must carry in the output file.
    pub out_name: String,
    pub units: Option<String>,
    pub stored_direction: Option<StoredDirection>,
    /// Vertical coordinate whose identity is model-dependent; nothing to
    /// check against.
    pub generic_level: bool,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    /// Exact coordinate values the table asks for.
    pub requested: Vec<f64>,
    /// Non-empty only for scalar/fixed coordinates, which do not count
    /// towards the variable's rank.
    pub value: Option<String>,
}

impl CoordinateSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            standard_name: None,
            long_name: None,
            out_name: name.to_string(),
            units: None,
            stored_direction: None,
            generic_level: false,
            valid_min: None,
            valid_max: None,
            requested: Vec::new(),
            value: None,
        }
    }

    pub fn generic_level(name: &str) -> Self {
        let mut spec = Self::new(name);
        spec.generic_level = true;
        spec
    }

    pub fn with_standard_name(mut self, name: &str) -> Self {
        self.standard_name = Some(name.to_string());
        self
    }

    pub fn with_out_name(mut self, name: &str) -> Self {
        self.out_name = name.to_string();
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_stored_direction(mut self, direction: StoredDirection) -> Self {
        self.stored_direction = Some(direction);
        self
    }

    pub fn with_valid_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.valid_min = min;
        self.valid_max = max;
        self
    }

    pub fn with_requested(mut self, values: Vec<f64>) -> Self {
        self.requested = values;
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Fixed scalar coordinates are excluded from rank counting.
    pub fn is_scalar(&self) -> bool {
        self.value.as_deref().is_some_and(|value| !value.is_empty())
    }
}

/// Specification of one variable, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub short_name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    /// Canonical units string. The literal `psu` is a recognized legacy
    /// alias meaning dimensionless.
    pub units: Option<String>,
    pub positive: Option<String>,
    pub frequency: Option<String>,
    pub coordinates: BTreeMap<String, CoordinateSpec>,
}

impl VariableSpec {
    pub fn new(short_name: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            standard_name: None,
            long_name: None,
            units: None,
            positive: None,
            frequency: None,
            coordinates: BTreeMap::new(),
        }
    }

    pub fn with_standard_name(mut self, name: &str) -> Self {
        self.standard_name = Some(name.to_string());
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_positive(mut self, positive: &str) -> Self {
        self.positive = Some(positive.to_string());
        self
    }

    pub fn with_frequency(mut self, frequency: &str) -> Self {
        self.frequency = Some(frequency.to_string());
        self
    }

    pub fn with_coordinate(mut self, coordinate: CoordinateSpec) -> Self {
        self.coordinates.insert(coordinate.name.clone(), coordinate);
        self
    }
}
