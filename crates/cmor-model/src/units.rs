//! CF-style unit strings with enough algebra for compliance checking.
//!
//! A unit is either a plain quantity (a scale factor, an optional offset and
//! a base-dimension signature parsed from strings like `kg m-2 s-1`, `hPa`
//! or `degC`) or a time reference (`days since 1950-01-01 00:00:00` in some
//! [`Calendar`]). Convertibility means equal dimension signatures for
//! quantities, and a shared calendar for time references; conversion is a
//! scale plus offset in both cases.
//!
//! Units that the parser does not recognize can still ride along on a cube
//! as [`Unit::unknown`]; they are convertible to nothing, which is exactly
//! what validation needs in order to flag them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::calendar::{Calendar, CalendarDate, CalendarError};

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("unrecognized unit token '{token}' in '{unit}'")]
    UnknownToken { token: String, unit: String },

    #[error("invalid unit string '{unit}': {message}")]
    Invalid { unit: String, message: String },

    #[error("units {from} can not be converted to {to}")]
    NotConvertible { from: String, to: String },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Exponents of the base dimensions a unit is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Dimensions {
    mass: i8,
    length: i8,
    time: i8,
    temperature: i8,
    amount: i8,
    angle: i8,
}

impl Dimensions {
    const NONE: Self = Self {
        mass: 0,
        length: 0,
        time: 0,
        temperature: 0,
        amount: 0,
        angle: 0,
    };

    fn scaled(self, exponent: i8) -> Self {
        Self {
            mass: self.mass * exponent,
            length: self.length * exponent,
            time: self.time * exponent,
            temperature: self.temperature * exponent,
            amount: self.amount * exponent,
            angle: self.angle * exponent,
        }
    }

    fn plus(self, other: Self) -> Self {
        Self {
            mass: self.mass + other.mass,
            length: self.length + other.length,
            time: self.time + other.time,
            temperature: self.temperature + other.temperature,
            amount: self.amount + other.amount,
            angle: self.angle + other.angle,
        }
    }

    fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

const MASS: Dimensions = Dimensions { mass: 1, ..Dimensions::NONE };
const LENGTH: Dimensions = Dimensions { length: 1, ..Dimensions::NONE };
const TIME: Dimensions = Dimensions { time: 1, ..Dimensions::NONE };
const TEMPERATURE: Dimensions = Dimensions { temperature: 1, ..Dimensions::NONE };
const AMOUNT: Dimensions = Dimensions { amount: 1, ..Dimensions::NONE };
const ANGLE: Dimensions = Dimensions { angle: 1, ..Dimensions::NONE };
const PRESSURE: Dimensions = Dimensions {
    mass: 1,
    length: -1,
    time: -2,
    ..Dimensions::NONE
};
const FORCE: Dimensions = Dimensions {
    mass: 1,
    length: 1,
    time: -2,
    ..Dimensions::NONE
};
const ENERGY: Dimensions = Dimensions {
    mass: 1,
    length: 2,
    time: -2,
    ..Dimensions::NONE
};
const POWER: Dimensions = Dimensions {
    mass: 1,
    length: 2,
    time: -3,
    ..Dimensions::NONE
};

/// (scale to base, offset to base, dimensions) for a single unit token.
fn base_unit(name: &str) -> Option<(f64, f64, Dimensions)> {
    let unit = match name {
        "m" | "meter" | "meters" | "metre" | "metres" => (1.0, 0.0, LENGTH),
        "km" => (1e3, 0.0, LENGTH),
        "cm" => (1e-2, 0.0, LENGTH),
        "mm" => (1e-3, 0.0, LENGTH),
        "um" | "µm" => (1e-6, 0.0, LENGTH),
        "kg" => (1.0, 0.0, MASS),
        "g" => (1e-3, 0.0, MASS),
        "s" | "sec" | "second" | "seconds" => (1.0, 0.0, TIME),
        "min" | "minute" | "minutes" => (60.0, 0.0, TIME),
        "h" | "hr" | "hour" | "hours" => (3600.0, 0.0, TIME),
        "day" | "days" => (86_400.0, 0.0, TIME),
        "K" | "kelvin" => (1.0, 0.0, TEMPERATURE),
        "degC" | "deg_C" | "celsius" | "Celsius" => (1.0, 273.15, TEMPERATURE),
        "Pa" => (1.0, 0.0, PRESSURE),
        "hPa" | "mbar" | "millibar" => (100.0, 0.0, PRESSURE),
        "bar" => (1e5, 0.0, PRESSURE),
        "N" => (1.0, 0.0, FORCE),
        "J" => (1.0, 0.0, ENERGY),
        "W" => (1.0, 0.0, POWER),
        "mol" | "mole" | "moles" => (1.0, 0.0, AMOUNT),
        "%" | "percent" => (1e-2, 0.0, Dimensions::NONE),
        "rad" | "radian" | "radians" => (1.0, 0.0, ANGLE),
        "degrees" | "degree" | "degrees_north" | "degree_north" | "degrees_east"
        | "degree_east" | "degrees_N" | "degrees_E" => {
            (std::f64::consts::PI / 180.0, 0.0, ANGLE)
        }
        _ => return None,
    };
    Some(unit)
}

static TIME_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)\s+since\s+(.+)$")
        .expect("time reference regex compiles")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_%°µ]+|[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)(?:\^?(-?[0-9]+))?$")
        .expect("unit token regex compiles")
});

#[derive(Debug, Clone, PartialEq)]
enum UnitKind {
    Quantity {
        factor: f64,
        offset: f64,
        dims: Dimensions,
    },
    TimeReference {
        step_seconds: f64,
        epoch: CalendarDate,
        calendar: Calendar,
    },
    Unknown,
}

/// A parsed unit. Equality compares meaning, not spelling: `K` equals
/// `kelvin`, and two time references agree when step, epoch and calendar do.
#[derive(Debug, Clone)]
pub struct Unit {
    origin: String,
    kind: UnitKind,
}

/// A linear map between two convertible units.
#[derive(Debug, Clone, Copy)]
pub struct Conversion {
    scale: f64,
    offset: f64,
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

impl Unit {
    /// Parse a unit string; time references default to the Gregorian calendar.
    pub fn parse(spec: &str) -> Result<Self, UnitError> {
        Self::parse_with_calendar(spec, Calendar::Gregorian)
    }

    /// Parse a unit string, attaching `calendar` if it is a time reference.
    pub fn parse_with_calendar(spec: &str, calendar: Calendar) -> Result<Self, UnitError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(UnitError::Invalid {
                unit: spec.to_string(),
                message: "empty unit string".to_string(),
            });
        }

        if let Some(caps) = TIME_REFERENCE_RE.captures(trimmed) {
            let step_seconds = step_seconds(&caps[1]);
            let epoch =
                CalendarDate::parse(caps[2].trim()).map_err(|_| UnitError::Invalid {
                    unit: spec.to_string(),
                    message: format!("invalid reference date '{}'", caps[2].trim()),
                })?;
            return Ok(Self {
                origin: trimmed.to_string(),
                kind: UnitKind::TimeReference {
                    step_seconds,
                    epoch,
                    calendar,
                },
            });
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let single = tokens.len() == 1;
        let mut factor = 1.0f64;
        let mut offset = 0.0f64;
        let mut dims = Dimensions::NONE;
        for token in tokens {
            let caps = TOKEN_RE.captures(token).ok_or_else(|| UnitError::UnknownToken {
                token: token.to_string(),
                unit: spec.to_string(),
            })?;
            let name = caps.get(1).map_or("", |m| m.as_str());
            let exponent: i32 = caps
                .get(2)
                .map(|m| m.as_str().parse().unwrap_or(1))
                .unwrap_or(1);
            if let Ok(number) = name.parse::<f64>() {
                factor *= number.powi(exponent);
                continue;
            }
            let (scale, base_offset, base_dims) =
                base_unit(name).ok_or_else(|| UnitError::UnknownToken {
                    token: token.to_string(),
                    unit: spec.to_string(),
                })?;
            factor *= scale.powi(exponent);
            dims = dims.plus(base_dims.scaled(exponent as i8));
            // Offsets (degC) only survive as a standalone unit; in compound
            // units the token contributes its scale alone.
            if base_offset != 0.0 && single && exponent == 1 {
                offset = base_offset;
            }
        }
        Ok(Self {
            origin: trimmed.to_string(),
            kind: UnitKind::Quantity {
                factor,
                offset,
                dims,
            },
        })
    }

    /// The canonical dimensionless unit, spelled `1`.
    pub fn dimensionless() -> Self {
        Self {
            origin: "1".to_string(),
            kind: UnitKind::Quantity {
                factor: 1.0,
                offset: 0.0,
                dims: Dimensions::NONE,
            },
        }
    }

    /// A unit the parser rejected; carried verbatim, convertible to nothing.
    pub fn unknown(raw: impl Into<String>) -> Self {
        Self {
            origin: raw.into(),
            kind: UnitKind::Unknown,
        }
    }

    /// A `days since <epoch>` time reference built programmatically.
    pub fn time_reference_days(epoch: CalendarDate, calendar: Calendar) -> Self {
        Self {
            origin: format!("days since {epoch}"),
            kind: UnitKind::TimeReference {
                step_seconds: 86_400.0,
                epoch,
                calendar,
            },
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, UnitKind::Unknown)
    }

    pub fn is_dimensionless(&self) -> bool {
        matches!(self.kind, UnitKind::Quantity { dims, .. } if dims.is_none())
    }

    pub fn is_time_reference(&self) -> bool {
        matches!(self.kind, UnitKind::TimeReference { .. })
    }

    pub fn calendar(&self) -> Option<Calendar> {
        match self.kind {
            UnitKind::TimeReference { calendar, .. } => Some(calendar),
            _ => None,
        }
    }

    pub fn epoch(&self) -> Option<CalendarDate> {
        match self.kind {
            UnitKind::TimeReference { epoch, .. } => Some(epoch),
            _ => None,
        }
    }

    /// Rebind a time reference to another calendar; plain units pass through.
    pub fn with_calendar(&self, calendar: Calendar) -> Self {
        match self.kind {
            UnitKind::TimeReference {
                step_seconds,
                epoch,
                ..
            } => Self {
                origin: self.origin.clone(),
                kind: UnitKind::TimeReference {
                    step_seconds,
                    epoch,
                    calendar,
                },
            },
            _ => self.clone(),
        }
    }

    pub fn is_convertible(&self, target: &Unit) -> bool {
        self.conversion_to(target).is_ok()
    }

    /// The linear map taking values in `self` to values in `target`.
    pub fn conversion_to(&self, target: &Unit) -> Result<Conversion, UnitError> {
        match (&self.kind, &target.kind) {
            (
                UnitKind::Quantity {
                    factor: from_factor,
                    offset: from_offset,
                    dims: from_dims,
                },
                UnitKind::Quantity {
                    factor: to_factor,
                    offset: to_offset,
                    dims: to_dims,
                },
            ) if from_dims == to_dims => Ok(Conversion {
                scale: from_factor / to_factor,
                offset: (from_offset - to_offset) / to_factor,
            }),
            (
                UnitKind::TimeReference {
                    step_seconds: from_step,
                    epoch: from_epoch,
                    calendar: from_calendar,
                },
                UnitKind::TimeReference {
                    step_seconds: to_step,
                    epoch: to_epoch,
                    calendar: to_calendar,
                },
            ) if from_calendar == to_calendar => {
                let shift = from_calendar.days_between(to_epoch, from_epoch)? * 86_400.0;
                Ok(Conversion {
                    scale: from_step / to_step,
                    offset: shift / to_step,
                })
            }
            _ => Err(UnitError::NotConvertible {
                from: self.to_string(),
                to: target.to_string(),
            }),
        }
    }

    pub fn convert_value(&self, value: f64, target: &Unit) -> Result<f64, UnitError> {
        Ok(self.conversion_to(target)?.apply(value))
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}

fn step_seconds(word: &str) -> f64 {
    match word.to_ascii_lowercase().as_str() {
        "second" | "seconds" | "sec" | "secs" => 1.0,
        "minute" | "minutes" | "min" | "mins" => 60.0,
        "hour" | "hours" | "hr" | "hrs" => 3600.0,
        _ => 86_400.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_to_kelvin_adds_offset() {
        let celsius = Unit::parse("degC").unwrap();
        let kelvin = Unit::parse("K").unwrap();
        assert!(celsius.is_convertible(&kelvin));
        let converted = celsius.convert_value(20.0, &kelvin).unwrap();
        assert!((converted - 293.15).abs() < 1e-9);
    }

    #[test]
    fn hecto_pascal_scales() {
        let hpa = Unit::parse("hPa").unwrap();
        let pa = Unit::parse("Pa").unwrap();
        assert!((hpa.convert_value(850.0, &pa).unwrap() - 85_000.0).abs() < 1e-9);
    }

    #[test]
    fn compound_units_have_dimensions() {
        let flux = Unit::parse("kg m-2 s-1").unwrap();
        let temperature = Unit::parse("K").unwrap();
        assert!(!flux.is_convertible(&temperature));
        let same = Unit::parse("g cm-2 s-1").unwrap();
        assert!(same.is_convertible(&flux));
    }

    #[test]
    fn spelled_out_names_compare_equal() {
        assert_eq!(Unit::parse("K").unwrap(), Unit::parse("kelvin").unwrap());
        assert_eq!(Unit::parse("1").unwrap(), Unit::parse("1.0").unwrap());
    }

    #[test]
    fn percent_converts_to_dimensionless() {
        let percent = Unit::parse("%").unwrap();
        let one = Unit::dimensionless();
        assert!((percent.convert_value(50.0, &one).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn psu_is_not_a_unit() {
        assert!(Unit::parse("psu").is_err());
        let unknown = Unit::unknown("psu");
        assert!(!unknown.is_convertible(&Unit::dimensionless()));
    }

    #[test]
    fn time_reference_detection() {
        let unit = Unit::parse("days since 1850-01-01 00:00:00").unwrap();
        assert!(unit.is_time_reference());
        assert_eq!(unit.calendar(), Some(Calendar::Gregorian));
        assert!(!Unit::parse("days").unwrap().is_time_reference());
    }

    #[test]
    fn epoch_shift_between_time_references() {
        let from = Unit::parse_with_calendar("days since 1850-01-01", Calendar::Day365).unwrap();
        let epoch = CalendarDate::new(1950, 1, 1);
        let to = Unit::time_reference_days(epoch, Calendar::Day365);
        // 100 years of 365 days separate the epochs.
        let converted = from.convert_value(36_500.0, &to).unwrap();
        assert!((converted - 0.0).abs() < 1e-9);
    }

    #[test]
    fn hours_since_scales_to_days_since() {
        let hours = Unit::parse_with_calendar("hours since 1950-01-01", Calendar::Day360).unwrap();
        let days =
            Unit::time_reference_days(CalendarDate::new(1950, 1, 1), Calendar::Day360);
        assert!((hours.convert_value(48.0, &days).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn calendars_must_match_for_time_conversion() {
        let gregorian = Unit::parse("days since 1950-01-01").unwrap();
        let noleap =
            Unit::parse_with_calendar("days since 1950-01-01", Calendar::Day365).unwrap();
        assert!(!gregorian.is_convertible(&noleap));
    }

    #[test]
    fn degrees_are_not_plain_numbers() {
        let degrees = Unit::parse("degrees_east").unwrap();
        assert!(!degrees.is_convertible(&Unit::dimensionless()));
        assert!(degrees.is_convertible(&Unit::parse("degrees").unwrap()));
    }
}
