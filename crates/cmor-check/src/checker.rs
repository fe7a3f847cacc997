//! The compliance checker: validates one cube against one variable
//! specification, optionally repairing the enumerated fixable deviations.
//!
//! A checker is single-use: construct it per cube, run [`check_metadata`]
//! (cheap, no data access), then [`check_data`] (touches the array), then
//! take the cube back. Errors either abort on first occurrence
//! (`fail_on_error`) or accumulate and raise once per phase; warnings are
//! collected and logged, never fatal.
//!
//! [`check_metadata`]: CmorChecker::check_metadata
//! [`check_data`]: CmorChecker::check_data

use std::collections::BTreeSet;

use tracing::warn;

use cmor_model::{Calendar, CalendarDate, Coordinate, Cube, Unit};
use cmor_tables::{CoordinateSpec, StoredDirection, VariableSpec};

use crate::error::CheckError;
use crate::frequency::Frequency;

/// Numeric tolerance for time-interval comparison, in days.
const TIME_TOLERANCE: f64 = 0.001;

/// Derived auxiliary coordinates attached to the time axis after a
/// successful metadata check.
const DERIVED_TIME_COORDS: [&str; 4] = ["day_of_month", "day_of_year", "month_number", "year"];

/// Which phase a coordinate check runs in. The monotonicity/direction check
/// is shared: it runs inline during the metadata phase when fixes are off,
/// and is deferred to the data phase when fixes are on so the repair happens
/// in the same pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Metadata,
    Data,
}

pub struct CmorChecker<'a> {
    cube: Cube,
    var_spec: &'a VariableSpec,
    frequency_token: String,
    frequency: Option<Frequency>,
    fail_on_error: bool,
    automatic_fixes: bool,
    requested_value_tolerance: f64,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> CmorChecker<'a> {
    /// Checker over `cube` with the specification's own frequency,
    /// collect-all error reporting and no automatic fixes.
    pub fn new(cube: Cube, var_spec: &'a VariableSpec) -> Self {
        let frequency_token = var_spec.frequency.clone().unwrap_or_default();
        let frequency = Frequency::parse(&frequency_token);
        Self {
            cube,
            var_spec,
            frequency_token,
            frequency,
            fail_on_error: false,
            automatic_fixes: false,
            requested_value_tolerance: 0.0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Override the expected frequency token.
    pub fn with_frequency(mut self, token: &str) -> Self {
        self.frequency_token = token.to_string();
        self.frequency = Frequency::parse(token);
        self
    }

    /// Abort on the first error instead of collecting all of them.
    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    /// Repair the enumerated fixable deviations instead of erroring.
    pub fn with_automatic_fixes(mut self, automatic_fixes: bool) -> Self {
        self.automatic_fixes = automatic_fixes;
        self
    }

    /// Widen the requested-values membership test. The default of 0.0 keeps
    /// the exact floating-point match the tables assume.
    pub fn with_requested_value_tolerance(mut self, tolerance: f64) -> Self {
        self.requested_value_tolerance = tolerance;
        self
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn into_cube(self) -> Cube {
        self.cube
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Run every check that does not require the data in memory, report the
    /// outcome, and on success attach the derived time coordinates.
    pub fn check_metadata(&mut self) -> Result<&Cube, CheckError> {
        self.check_var_metadata()?;
        self.check_fill_value();
        self.check_dim_names()?;
        self.check_coords(Phase::Metadata)?;
        self.check_time_coord()?;
        self.check_rank()?;

        self.report_accumulated_warnings();
        self.report_accumulated_errors()?;

        self.add_derived_time_coords();
        Ok(&self.cube)
    }

    /// Run the checks that touch the array values. Assumes the metadata has
    /// already been validated.
    pub fn check_data(&mut self) -> Result<&Cube, CheckError> {
        if let Some(units) = self.var_spec.units.as_deref().filter(|u| !u.is_empty()) {
            let effective = effective_units(units);
            if self.cube.units.to_string() != effective {
                match Unit::parse(effective) {
                    Ok(target) => {
                        if let Err(error) = self.cube.convert_units(&target) {
                            self.report_error(error.to_string())?;
                        }
                    }
                    Err(error) => self.report_error(error.to_string())?,
                }
            }
        }

        self.check_coords(Phase::Data)?;

        self.report_accumulated_warnings();
        self.report_accumulated_errors()?;
        Ok(&self.cube)
    }

    /// Record an error. In fail-fast mode the first error aborts the phase;
    /// otherwise it accumulates for the batch report at phase end.
    pub fn report_error(&mut self, message: impl Into<String>) -> Result<(), CheckError> {
        let message = message.into();
        if self.fail_on_error {
            return Err(CheckError::Compliance {
                var_name: self.cube.var_name.clone(),
                messages: message,
                cube: self.cube.to_string(),
            });
        }
        self.errors.push(message);
        Ok(())
    }

    /// Record a warning. Warnings never fail a check: in fail-fast mode they
    /// are logged immediately, otherwise they accumulate for the batch
    /// report.
    pub fn report_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.fail_on_error {
            warn!("{message}");
        } else {
            self.warnings.push(message);
        }
    }

    fn check_var_metadata(&mut self) -> Result<(), CheckError> {
        if let Some(expected) = self.var_spec.standard_name.clone().filter(|s| !s.is_empty())
            && self.cube.standard_name.as_deref() != Some(expected.as_str())
        {
            let var_name = self.cube.var_name.clone();
            let actual = self
                .cube
                .standard_name
                .clone()
                .unwrap_or_else(|| "None".to_string());
            self.report_error(attr_msg(&var_name, "standard_name", &expected, &actual))?;
        }

        if self.automatic_fixes
            && self
                .cube
                .attributes
                .get("invalid_units")
                .is_some_and(|value| value.eq_ignore_ascii_case("psu"))
        {
            self.cube.units = Unit::dimensionless();
            self.cube.attributes.remove("invalid_units");
        }

        if let Some(units) = self.var_spec.units.clone().filter(|u| !u.is_empty()) {
            let convertible = Unit::parse(effective_units(&units))
                .is_ok_and(|target| self.cube.units.is_convertible(&target));
            if !convertible {
                let message = format!(
                    "Variable {} units {} can not be converted to {}",
                    self.cube.var_name, self.cube.units, units
                );
                self.report_error(message)?;
            }
        }

        // Tracked scalar attributes; currently just `positive`.
        if let Some(positive) = self.var_spec.positive.clone().filter(|p| !p.is_empty()) {
            let var_name = self.cube.var_name.clone();
            match self.cube.attributes.get("positive").cloned() {
                None => self.report_warning(format!("{var_name}: attribute positive not present")),
                Some(actual) if actual != positive => {
                    self.report_error(attr_msg(&var_name, "positive", &positive, &actual))?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Not implemented. Masked storage drops the fill value whenever no
    /// element carries it, so there is nothing reliable to compare against
    /// the table; the check stays in the phase sequence as a placeholder.
    fn check_fill_value(&self) {}

    fn check_dim_names(&mut self) -> Result<(), CheckError> {
        let spec = self.var_spec;
        for coordinate in spec.coordinates.values() {
            if coordinate.generic_level {
                continue;
            }
            let message = if let Some(cube_coord) = self.cube.coord(&coordinate.out_name) {
                if cube_coord.standard_name != coordinate.standard_name {
                    Some(attr_msg(
                        &coordinate.out_name,
                        "standard_name",
                        coordinate.standard_name.as_deref().unwrap_or("None"),
                        cube_coord.standard_name.as_deref().unwrap_or("None"),
                    ))
                } else {
                    None
                }
            } else if let Some(found) = coordinate
                .standard_name
                .as_deref()
                .and_then(|name| self.cube.coord_by_standard_name(name))
            {
                Some(format!(
                    "Coordinate {} has var name {} instead of {}",
                    coordinate.name, found.var_name, coordinate.out_name
                ))
            } else {
                Some(does_not_msg(&coordinate.name, "exist"))
            };
            if let Some(message) = message {
                self.report_error(message)?;
            }
        }
        Ok(())
    }

    fn check_coords(&mut self, phase: Phase) -> Result<(), CheckError> {
        let spec = self.var_spec;
        for coordinate in spec.coordinates.values() {
            if coordinate.generic_level {
                continue;
            }
            // Absence was already reported by the dimension-name check.
            if self.cube.coord(&coordinate.out_name).is_none() {
                continue;
            }
            match phase {
                Phase::Metadata => self.check_coord(coordinate)?,
                Phase::Data => self.check_coord_monotonicity_and_direction(coordinate)?,
            }
        }
        Ok(())
    }

    fn check_coord(&mut self, spec: &CoordinateSpec) -> Result<(), CheckError> {
        let var_name = spec.out_name.as_str();
        // The time coordinate has its own check.
        if var_name == "time" {
            return Ok(());
        }
        if let Some(units) = spec.units.as_deref().filter(|u| !u.is_empty())
            && let Some(current) = self.cube.coord(var_name).map(|c| c.units.clone())
            && current.to_string() != units
        {
            let mut fixed = false;
            if self.automatic_fixes {
                // Convert in the coordinate's own calendar when it has one.
                let target = match current.calendar() {
                    Some(calendar) => Unit::parse_with_calendar(units, calendar),
                    None => Unit::parse(units),
                };
                if let Ok(target) = target
                    && let Some(coord) = self.cube.coord_mut(var_name)
                    && coord.convert_units(&target).is_ok()
                {
                    fixed = true;
                }
            }
            if !fixed {
                self.report_error(attr_msg(var_name, "units", units, &current.to_string()))?;
            }
        }
        self.check_coord_values(spec)?;
        if !self.automatic_fixes {
            self.check_coord_monotonicity_and_direction(spec)?;
        }
        Ok(())
    }

    fn check_coord_values(&mut self, spec: &CoordinateSpec) -> Result<(), CheckError> {
        let var_name = spec.out_name.as_str();
        self.check_requested_values(spec);

        let Some(points) = self.cube.coord(var_name).map(|c| c.points().to_vec()) else {
            return Ok(());
        };
        let below_min = spec
            .valid_min
            .filter(|min| points.iter().any(|p| p < min));
        let above_max = spec
            .valid_max
            .filter(|max| points.iter().any(|p| p > max));
        if below_min.is_none() && above_max.is_none() {
            return Ok(());
        }

        let fixable = spec.standard_name.as_deref() == Some("longitude") && self.automatic_fixes;
        if fixable && self.cube.intersect_longitude(var_name).is_ok() {
            return Ok(());
        }
        // Out of range, or the re-wrap itself failed: either way the
        // violated bounds are reported.
        if let Some(valid_min) = below_min {
            self.report_error(vals_msg(var_name, "<", "valid_min", valid_min))?;
        }
        if let Some(valid_max) = above_max {
            self.report_error(vals_msg(var_name, ">", "valid_max", valid_max))?;
        }
        Ok(())
    }

    fn check_requested_values(&mut self, spec: &CoordinateSpec) {
        if spec.requested.is_empty() {
            return;
        }
        let var_name = spec.out_name.as_str();
        let Some((points, units)) = self
            .cube
            .coord(var_name)
            .map(|c| (c.points().to_vec(), c.units.to_string()))
        else {
            return;
        };
        let tolerance = self.requested_value_tolerance;
        for requested in &spec.requested {
            let present = if tolerance > 0.0 {
                points.iter().any(|p| (p - requested).abs() <= tolerance)
            } else {
                // Exact floating-point membership, as the tables assume.
                points.contains(requested)
            };
            if !present {
                self.report_warning(contain_msg(var_name, *requested, &units));
            }
        }
    }

    fn check_coord_monotonicity_and_direction(
        &mut self,
        spec: &CoordinateSpec,
    ) -> Result<(), CheckError> {
        let var_name = spec.out_name.clone();
        let Some(coord) = self.cube.coord(&var_name) else {
            return Ok(());
        };
        let monotonic = coord.is_monotonic();
        let ndim = coord.ndim();
        let first_two = (coord.len() > 1).then(|| (coord.points()[0], coord.points()[1]));

        if !monotonic {
            self.report_error(is_not_msg(&var_name, "monotonic"))?;
        }
        let Some((first, second)) = first_two else {
            return Ok(());
        };
        let Some(direction) = spec.stored_direction else {
            return Ok(());
        };
        let (reversed, label) = match direction {
            StoredDirection::Increasing => (first > second, "increasing"),
            StoredDirection::Decreasing => (first < second, "decreasing"),
        };
        if reversed {
            if !self.automatic_fixes || ndim > 1 {
                self.report_error(is_not_msg(&var_name, label))?;
            } else {
                self.reverse_coord(&var_name, label)?;
            }
        }
        Ok(())
    }

    /// Reverse the cube along the coordinate's dimension. Only supported for
    /// a coordinate spanning exactly one dimension; anything else falls
    /// through to the directionality error it would have fixed.
    fn reverse_coord(&mut self, var_name: &str, label: &str) -> Result<(), CheckError> {
        let dims = self
            .cube
            .coord_dims(var_name)
            .map(<[usize]>::to_vec)
            .unwrap_or_default();
        if dims.len() == 1 && self.cube.reverse(dims[0]).is_ok() {
            return Ok(());
        }
        self.report_error(is_not_msg(var_name, label))
    }

    fn check_time_coord(&mut self) -> Result<(), CheckError> {
        // Absence is reported by the dimension-name check, not here.
        let Some(coord) = self.cube.dim_coord("time") else {
            return Ok(());
        };
        let var_name = coord.var_name.clone();
        let units = coord.units.clone();
        if !units.is_time_reference() {
            return self.report_error(does_not_msg(&var_name, "have time reference units"));
        }

        // Normalize to the reference epoch in the coordinate's own calendar.
        // Alias calendar spellings already collapsed when the unit parsed.
        let calendar = units.calendar().unwrap_or(Calendar::Gregorian);
        let epoch = CalendarDate::new(1950, 1, 1);
        let target = Unit::time_reference_days(epoch, calendar);
        if let Some(Err(_)) = self
            .cube
            .dim_coord_mut("time")
            .map(|coord| coord.convert_units(&target))
        {
            return self.report_error(does_not_msg(&var_name, "have time reference units"));
        }

        let Some(points) = self.cube.dim_coord("time").map(|c| c.points().to_vec()) else {
            return Ok(());
        };
        let token = self.frequency_token.clone();
        match self.frequency {
            Some(Frequency::Monthly) => {
                for pair in points.windows(2) {
                    let dates = (
                        calendar.date_at(&epoch, pair[0]),
                        calendar.date_at(&epoch, pair[1]),
                    );
                    let (Ok(first), Ok(second)) = dates else {
                        self.report_error(does_not_msg(&var_name, "have representable dates"))?;
                        break;
                    };
                    let mut month = first.month + 1;
                    let mut year = first.year;
                    if month == 13 {
                        month = 1;
                        year += 1;
                    }
                    if second.month != month || second.year != year {
                        self.report_error(frequency_msg(&var_name, &token))?;
                        break;
                    }
                }
            }
            Some(Frequency::Yearly) => {
                for pair in points.windows(2) {
                    let dates = (
                        calendar.date_at(&epoch, pair[0]),
                        calendar.date_at(&epoch, pair[1]),
                    );
                    let (Ok(first), Ok(second)) = dates else {
                        self.report_error(does_not_msg(&var_name, "have representable dates"))?;
                        break;
                    };
                    if second.year != first.year + 1 {
                        self.report_error(frequency_msg(&var_name, &token))?;
                        break;
                    }
                }
            }
            Some(frequency) => {
                let Some((lower, upper)) = frequency.interval_days(TIME_TOLERANCE) else {
                    return Ok(());
                };
                for pair in points.windows(2) {
                    let interval = pair[1] - pair[0];
                    if interval < lower || interval > upper {
                        self.report_error(frequency_msg(&var_name, &token))?;
                        break;
                    }
                }
            }
            None => {
                self.report_error(format!(
                    "{var_name}: Frequency {token} not supported by checker"
                ))?;
            }
        }
        Ok(())
    }

    /// Count one dimension per non-generic, non-scalar specification
    /// coordinate (union of spanned cube axes, looked up by standard name),
    /// plus one per generic-level coordinate.
    fn check_rank(&mut self) -> Result<(), CheckError> {
        let spec = self.var_spec;
        let mut rank = 0usize;
        let mut dims: BTreeSet<usize> = BTreeSet::new();
        for coordinate in spec.coordinates.values() {
            if coordinate.generic_level {
                rank += 1;
            } else if !coordinate.is_scalar()
                && let Some(name) = coordinate.standard_name.as_deref()
                && let Some(spanned) = self.cube.coord_dims_by_standard_name(name)
            {
                // A coordinate that is not found was reported elsewhere.
                dims.extend(spanned.iter().copied());
            }
        }
        rank += dims.len();
        if self.cube.ndim() != rank {
            let var_name = self.cube.var_name.clone();
            self.report_error(does_not_msg(&var_name, "match coordinate rank"))?;
        }
        Ok(())
    }

    fn report_accumulated_warnings(&mut self) {
        if self.has_warnings() {
            warn!(
                "There were warnings in variable {}:\n {}",
                self.cube.var_name,
                self.warnings.join("\n ")
            );
        }
    }

    fn report_accumulated_errors(&mut self) -> Result<(), CheckError> {
        if self.has_errors() {
            return Err(CheckError::Compliance {
                var_name: self.cube.var_name.clone(),
                messages: self.errors.join("\n "),
                cube: self.cube.to_string(),
            });
        }
        Ok(())
    }

    fn add_derived_time_coords(&mut self) {
        let Some(coord) = self.cube.dim_coord("time") else {
            return;
        };
        let (Some(calendar), Some(epoch)) = (coord.units.calendar(), coord.units.epoch()) else {
            return;
        };
        let points = coord.points().to_vec();
        let Some(dims) = self.cube.coord_dims("time").map(<[usize]>::to_vec) else {
            return;
        };

        let mut day_of_month = Vec::with_capacity(points.len());
        let mut day_of_year = Vec::with_capacity(points.len());
        let mut month_number = Vec::with_capacity(points.len());
        let mut year = Vec::with_capacity(points.len());
        for point in &points {
            let Ok(date) = calendar.date_at(&epoch, *point) else {
                return;
            };
            day_of_month.push(f64::from(date.day));
            day_of_year.push(f64::from(calendar.day_of_year(&date)));
            month_number.push(f64::from(date.month));
            year.push(date.year as f64);
        }

        let values = [day_of_month, day_of_year, month_number, year];
        for (name, values) in DERIVED_TIME_COORDS.iter().zip(values) {
            if self.cube.has_coord(name) {
                continue;
            }
            let coord = Coordinate::new(name, values, Unit::dimensionless()).with_long_name(name);
            if let Err(error) = self.cube.add_aux_coord(coord, &dims) {
                warn!("could not attach {name} coordinate: {error}");
            }
        }
    }
}

/// The units to validate and convert against; `psu` is a legacy alias for
/// dimensionless.
fn effective_units(units: &str) -> &str {
    if units.eq_ignore_ascii_case("psu") {
        "1"
    } else {
        units
    }
}

fn attr_msg(name: &str, attribute: &str, expected: &str, actual: &str) -> String {
    format!("{name}: {attribute} should be {expected}, not {actual}")
}

fn does_not_msg(name: &str, what: &str) -> String {
    format!("{name}: does not {what}")
}

fn is_not_msg(name: &str, what: &str) -> String {
    format!("{name}: is not {what}")
}

fn vals_msg(name: &str, relation: &str, bound: &str, value: f64) -> String {
    format!("{name}: has values {relation} {bound} = {value}")
}

fn contain_msg(name: &str, value: f64, units: &str) -> String {
    format!("{name}: does not contain {value} {units}")
}

fn frequency_msg(name: &str, frequency: &str) -> String {
    format!("{name}: Frequency {frequency} does not match input data")
}
