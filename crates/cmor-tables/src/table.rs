//! CMOR tables and their JSON loader.
//!
//! A table (one per project, e.g. `CMIP6`) groups variable specifications by
//! mip. The published table files are JSON documents with a `Header`
//! carrying the mip name, a `variable_entry` object and an `axis_entry`
//! object; a variable's `dimensions` field names the axes it spans.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::TableError;
use crate::spec::{CoordinateSpec, StoredDirection, VariableSpec};

/// Vertical axes with model-dependent identity; they appear in `dimensions`
/// without a usable axis entry.
const GENERIC_LEVEL_AXES: &[&str] = &["alevel", "alevhalf", "olevel", "olevhalf", "smlevel"];

#[derive(Debug, Clone, Default)]
pub struct CmorTable {
    pub name: String,
    mips: BTreeMap<String, BTreeMap<String, VariableSpec>>,
}

impl CmorTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mips: BTreeMap::new(),
        }
    }

    pub fn add_variable(&mut self, mip: &str, spec: VariableSpec) {
        self.mips
            .entry(mip.to_string())
            .or_default()
            .insert(spec.short_name.clone(), spec);
    }

    pub fn get_variable(&self, mip: &str, short_name: &str) -> Option<&VariableSpec> {
        self.mips.get(mip)?.get(short_name)
    }

    pub fn mips(&self) -> impl Iterator<Item = &str> {
        self.mips.keys().map(String::as_str)
    }

    /// Load one mip's variable entries from a CMOR JSON table document.
    pub fn load_mip_json(&mut self, json: &str) -> Result<(), TableError> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mip = raw
            .header
            .table_id
            .trim()
            .strip_prefix("Table ")
            .unwrap_or(raw.header.table_id.trim())
            .to_string();
        if mip.is_empty() {
            return Err(TableError::MissingTableId);
        }

        for (short_name, variable) in raw.variable_entry {
            let mut spec = VariableSpec::new(&short_name);
            spec.standard_name = non_empty(variable.standard_name);
            spec.long_name = non_empty(variable.long_name);
            spec.units = non_empty(variable.units);
            spec.positive = non_empty(variable.positive);
            spec.frequency = non_empty(variable.frequency)
                .or_else(|| non_empty(raw.header.frequency.clone()));
            for axis in variable.dimensions.split_whitespace() {
                let coordinate = match raw.axis_entry.get(axis) {
                    Some(entry) => entry.to_spec(axis),
                    None if GENERIC_LEVEL_AXES.contains(&axis) => {
                        CoordinateSpec::generic_level(axis)
                    }
                    None => CoordinateSpec::new(axis),
                };
                spec.coordinates.insert(axis.to_string(), coordinate);
            }
            self.add_variable(&mip, spec);
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        trimmed.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(rename = "Header", default)]
    header: RawHeader,
    #[serde(default)]
    variable_entry: BTreeMap<String, RawVariable>,
    #[serde(default)]
    axis_entry: BTreeMap<String, RawAxis>,
}

#[derive(Debug, Deserialize, Default)]
struct RawHeader {
    #[serde(default)]
    table_id: String,
    #[serde(default)]
    frequency: String,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(default)]
    standard_name: String,
    #[serde(default)]
    long_name: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    positive: String,
    #[serde(default)]
    frequency: String,
    #[serde(default)]
    dimensions: String,
}

// The published tables carry every number as a string.
#[derive(Debug, Deserialize)]
struct RawAxis {
    #[serde(default)]
    standard_name: String,
    #[serde(default)]
    long_name: String,
    #[serde(default)]
    out_name: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    stored_direction: String,
    #[serde(default)]
    valid_min: String,
    #[serde(default)]
    valid_max: String,
    #[serde(default)]
    requested: Vec<String>,
    #[serde(default)]
    value: String,
    #[serde(default)]
    generic_level: bool,
}

impl RawAxis {
    fn to_spec(&self, name: &str) -> CoordinateSpec {
        let mut spec = CoordinateSpec::new(name);
        spec.standard_name = non_empty(self.standard_name.clone());
        spec.long_name = non_empty(self.long_name.clone());
        if let Some(out_name) = non_empty(self.out_name.clone()) {
            spec.out_name = out_name;
        }
        spec.units = non_empty(self.units.clone());
        spec.stored_direction = StoredDirection::parse(&self.stored_direction);
        spec.generic_level = self.generic_level;
        spec.valid_min = parse_number(&self.valid_min);
        spec.valid_max = parse_number(&self.valid_max);
        spec.requested = self
            .requested
            .iter()
            .filter_map(|value| parse_number(value))
            .collect();
        spec.value = non_empty(self.value.clone());
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMON_JSON: &str = r#"{
        "Header": { "table_id": "Table Amon", "frequency": "mon" },
        "variable_entry": {
            "tas": {
                "standard_name": "air_temperature",
                "long_name": "Near-Surface Air Temperature",
                "units": "K",
                "dimensions": "longitude latitude time height2m"
            }
        },
        "axis_entry": {
            "longitude": {
                "standard_name": "longitude",
                "out_name": "lon",
                "units": "degrees_east",
                "stored_direction": "increasing",
                "valid_min": "0.0",
                "valid_max": "360.0"
            },
            "latitude": {
                "standard_name": "latitude",
                "out_name": "lat",
                "units": "degrees_north",
                "stored_direction": "increasing",
                "valid_min": "-90.0",
                "valid_max": "90.0"
            },
            "time": {
                "standard_name": "time",
                "out_name": "time",
                "units": "days since ?",
                "stored_direction": "increasing"
            },
            "height2m": {
                "standard_name": "height",
                "out_name": "height",
                "units": "m",
                "value": "2.0"
            }
        }
    }"#;

    #[test]
    fn loads_variable_with_axes() {
        let mut table = CmorTable::new("CMIP6");
        table.load_mip_json(AMON_JSON).unwrap();
        let tas = table.get_variable("Amon", "tas").unwrap();
        assert_eq!(tas.standard_name.as_deref(), Some("air_temperature"));
        assert_eq!(tas.frequency.as_deref(), Some("mon"));
        assert_eq!(tas.coordinates.len(), 4);

        let lon = &tas.coordinates["longitude"];
        assert_eq!(lon.out_name, "lon");
        assert_eq!(lon.stored_direction, Some(StoredDirection::Increasing));
        assert_eq!(lon.valid_max, Some(360.0));

        let height = &tas.coordinates["height2m"];
        assert!(height.is_scalar());
    }

    #[test]
    fn generic_levels_from_dimension_names() {
        let json = r#"{
            "Header": { "table_id": "Table Omon" },
            "variable_entry": {
                "thetao": {
                    "standard_name": "sea_water_potential_temperature",
                    "units": "K",
                    "frequency": "mon",
                    "dimensions": "longitude latitude olevel time"
                }
            },
            "axis_entry": {}
        }"#;
        let mut table = CmorTable::new("CMIP6");
        table.load_mip_json(json).unwrap();
        let thetao = table.get_variable("Omon", "thetao").unwrap();
        assert!(thetao.coordinates["olevel"].generic_level);
    }

    #[test]
    fn missing_table_id_is_rejected() {
        let err = CmorTable::new("CMIP6")
            .load_mip_json(r#"{"variable_entry": {}}"#)
            .unwrap_err();
        assert!(matches!(err, TableError::MissingTableId));
    }
}
