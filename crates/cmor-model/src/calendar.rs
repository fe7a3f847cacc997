//! CF calendar arithmetic.
//!
//! Climate model output uses idealized calendars alongside the real one:
//! every month 30 days (`360_day`), no leap years (`365_day`), every year a
//! leap year (`366_day`), and the Julian calendar. Time coordinates are
//! exchanged as offsets from a reference epoch, so the calendar decides both
//! how an offset maps back to a date and how long a "month" or "year" step is.
//!
//! Alias spellings collapse at parse time (`standard` -> `gregorian`,
//! `noleap` -> `365_day`, `all_leap` -> `366_day`), so two units that named
//! the same calendar differently compare equal downstream.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("unknown calendar '{name}'")]
    Unknown { name: String },

    #[error("invalid date '{value}'")]
    InvalidDate { value: String },

    #[error("date out of range for calendar {calendar}")]
    OutOfRange { calendar: Calendar },
}

/// Non-cumulative month lengths of a regular 365-day year.
const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Calendar {
    Gregorian,
    ProlepticGregorian,
    Julian,
    Day360,
    Day365,
    Day366,
}

impl Calendar {
    /// Parse a CF calendar name, collapsing alias spellings.
    pub fn parse(name: &str) -> Result<Self, CalendarError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gregorian" | "standard" => Ok(Self::Gregorian),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "julian" => Ok(Self::Julian),
            "360_day" => Ok(Self::Day360),
            "365_day" | "noleap" | "no_leap" => Ok(Self::Day365),
            "366_day" | "all_leap" | "allleap" => Ok(Self::Day366),
            other => Err(CalendarError::Unknown {
                name: other.to_string(),
            }),
        }
    }

    /// Canonical CF name of this calendar.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gregorian => "gregorian",
            Self::ProlepticGregorian => "proleptic_gregorian",
            Self::Julian => "julian",
            Self::Day360 => "360_day",
            Self::Day365 => "365_day",
            Self::Day366 => "366_day",
        }
    }

    pub fn is_leap_year(&self, year: i64) -> bool {
        match self {
            Self::Day360 | Self::Day365 => false,
            Self::Day366 => true,
            Self::Julian => year.rem_euclid(4) == 0,
            Self::Gregorian | Self::ProlepticGregorian => {
                year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0)
            }
        }
    }

    pub fn days_in_month(&self, year: i64, month: u32) -> u32 {
        debug_assert!((1..=12).contains(&month));
        match self {
            Self::Day360 => 30,
            _ => {
                if month == 2 && self.is_leap_year(year) {
                    29
                } else {
                    MONTH_LENGTHS[(month - 1) as usize]
                }
            }
        }
    }

    pub fn days_in_year(&self, year: i64) -> u32 {
        match self {
            Self::Day360 => 360,
            _ if self.is_leap_year(year) => 366,
            _ => 365,
        }
    }

    /// One-based ordinal day of the year.
    pub fn day_of_year(&self, date: &CalendarDate) -> u32 {
        let mut ordinal = date.day;
        for month in 1..date.month {
            ordinal += self.days_in_month(date.year, month);
        }
        ordinal
    }

    /// Fractional days from `from` to `to` (negative when `to` is earlier).
    pub fn days_between(
        &self,
        from: &CalendarDate,
        to: &CalendarDate,
    ) -> Result<f64, CalendarError> {
        let days = self.day_number(to)? - self.day_number(from)?;
        let seconds = to.seconds_of_day() - from.seconds_of_day();
        Ok(days as f64 + seconds as f64 / 86_400.0)
    }

    /// The date `days` fractional days after `epoch`, resolved to whole
    /// seconds to absorb floating-point noise.
    pub fn date_at(&self, epoch: &CalendarDate, days: f64) -> Result<CalendarDate, CalendarError> {
        let total = (epoch.seconds_of_day() as f64 + days * 86_400.0).round() as i64;
        let day_offset = total.div_euclid(86_400);
        let seconds = total.rem_euclid(86_400);
        let day_number = self.day_number(epoch)? + day_offset;
        let (year, month, day) = self.date_from_day_number(day_number)?;
        Ok(CalendarDate {
            year,
            month,
            day,
            hour: (seconds / 3600) as u32,
            minute: ((seconds % 3600) / 60) as u32,
            second: (seconds % 60) as u32,
        })
    }

    /// Absolute day number of a date's midnight, counted from year 0 of this
    /// calendar. Only differences of day numbers are meaningful.
    fn day_number(&self, date: &CalendarDate) -> Result<i64, CalendarError> {
        let year = date.year;
        let month = date.month;
        let day = i64::from(date.day) - 1;
        match self {
            Self::Gregorian | Self::ProlepticGregorian => {
                let year = i32::try_from(year).map_err(|_| CalendarError::OutOfRange {
                    calendar: *self,
                })?;
                let date = NaiveDate::from_ymd_opt(year, month, date.day).ok_or(
                    CalendarError::InvalidDate {
                        value: date.to_string(),
                    },
                )?;
                Ok(i64::from(date.num_days_from_ce()))
            }
            Self::Day360 => Ok(year * 360 + i64::from(month - 1) * 30 + day),
            Self::Day365 => Ok(year * 365 + self.days_before_month(year, month) + day),
            Self::Day366 => Ok(year * 366 + self.days_before_month(year, month) + day),
            Self::Julian => {
                // Julian leap years in [0, year), counted with floor division
                // so negative years work out.
                let leaps = (year + 3).div_euclid(4);
                Ok(year * 365 + leaps + self.days_before_month(year, month) + day)
            }
        }
    }

    fn days_before_month(&self, year: i64, month: u32) -> i64 {
        let mut days = 0i64;
        for m in 1..month {
            days += i64::from(self.days_in_month(year, m));
        }
        days
    }

    fn date_from_day_number(&self, day_number: i64) -> Result<(i64, u32, u32), CalendarError> {
        match self {
            Self::Gregorian | Self::ProlepticGregorian => {
                let days = i32::try_from(day_number).map_err(|_| CalendarError::OutOfRange {
                    calendar: *self,
                })?;
                let date = NaiveDate::from_num_days_from_ce_opt(days).ok_or(
                    CalendarError::OutOfRange { calendar: *self },
                )?;
                Ok((i64::from(date.year()), date.month(), date.day()))
            }
            Self::Day360 => {
                let year = day_number.div_euclid(360);
                let rem = day_number.rem_euclid(360);
                Ok((year, (rem / 30) as u32 + 1, (rem % 30) as u32 + 1))
            }
            Self::Day365 => self.walk_months(day_number.div_euclid(365), day_number),
            Self::Day366 => self.walk_months(day_number.div_euclid(366), day_number),
            Self::Julian => {
                let mut year = (day_number as f64 / 365.25).floor() as i64;
                while self.day_number(&CalendarDate::new(year + 1, 1, 1))? <= day_number {
                    year += 1;
                }
                while self.day_number(&CalendarDate::new(year, 1, 1))? > day_number {
                    year -= 1;
                }
                self.walk_months(year, day_number)
            }
        }
    }

    fn walk_months(&self, year: i64, day_number: i64) -> Result<(i64, u32, u32), CalendarError> {
        let mut rem = day_number - self.day_number(&CalendarDate::new(year, 1, 1))?;
        let mut month = 1u32;
        loop {
            let len = i64::from(self.days_in_month(year, month));
            if rem < len {
                return Ok((year, month, rem as u32 + 1));
            }
            rem -= len;
            month += 1;
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-?\d{1,5})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}):(\d{1,2})(?::(\d{1,2})(?:\.\d+)?)?)?$",
    )
    .expect("date regex compiles")
});

/// A calendar date with time of day, valid in any [`Calendar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarDate {
    pub fn new(year: i64, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    pub fn with_time(mut self, hour: u32, minute: u32, second: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    /// Parse `YYYY-MM-DD` with an optional `HH:MM[:SS]` part separated by a
    /// space or `T`. Fractional seconds are accepted and truncated.
    pub fn parse(value: &str) -> Result<Self, CalendarError> {
        let invalid = || CalendarError::InvalidDate {
            value: value.to_string(),
        };
        let caps = DATE_RE.captures(value.trim()).ok_or_else(invalid)?;
        let field = |idx: usize| -> i64 {
            caps.get(idx)
                .map(|m| m.as_str().parse().unwrap_or(0))
                .unwrap_or(0)
        };
        let month = field(2) as u32;
        let day = field(3) as u32;
        let (hour, minute, second) = (field(4) as u32, field(5) as u32, field(6) as u32);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(invalid());
        }
        Ok(Self {
            year: field(1),
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    fn seconds_of_day(&self) -> i64 {
        i64::from(self.hour) * 3600 + i64::from(self.minute) * 60 + i64::from(self.second)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_collapses_aliases() {
        assert_eq!(Calendar::parse("standard").unwrap(), Calendar::Gregorian);
        assert_eq!(Calendar::parse("noleap").unwrap(), Calendar::Day365);
        assert_eq!(Calendar::parse("all_leap").unwrap(), Calendar::Day366);
        assert_eq!(Calendar::parse("360_day").unwrap(), Calendar::Day360);
        assert!(Calendar::parse("lunar").is_err());
    }

    #[test]
    fn month_lengths_by_calendar() {
        assert_eq!(Calendar::Day360.days_in_month(2000, 2), 30);
        assert_eq!(Calendar::Day365.days_in_month(2000, 2), 28);
        assert_eq!(Calendar::Day366.days_in_month(1999, 2), 29);
        assert_eq!(Calendar::Gregorian.days_in_month(2000, 2), 29);
        assert_eq!(Calendar::Gregorian.days_in_month(1900, 2), 28);
        assert_eq!(Calendar::Julian.days_in_month(1900, 2), 29);
    }

    #[test]
    fn days_between_and_back() {
        let epoch = CalendarDate::new(1950, 1, 1);
        for calendar in [
            Calendar::Gregorian,
            Calendar::Julian,
            Calendar::Day360,
            Calendar::Day365,
            Calendar::Day366,
        ] {
            let date = CalendarDate::new(1973, 6, 15).with_time(12, 0, 0);
            let days = calendar.days_between(&epoch, &date).unwrap();
            assert_eq!(calendar.date_at(&epoch, days).unwrap(), date);
        }
    }

    #[test]
    fn three_sixty_day_years_are_uniform() {
        let epoch = CalendarDate::new(2000, 1, 1);
        let date = Calendar::Day360.date_at(&epoch, 360.0).unwrap();
        assert_eq!(date, CalendarDate::new(2001, 1, 1));
        let date = Calendar::Day360.date_at(&epoch, 30.0).unwrap();
        assert_eq!(date, CalendarDate::new(2000, 2, 1));
    }

    #[test]
    fn gregorian_matches_chrono() {
        let epoch = CalendarDate::new(1950, 1, 1);
        let date = Calendar::Gregorian.date_at(&epoch, 59.0).unwrap();
        assert_eq!(date, CalendarDate::new(1950, 3, 1));
    }

    #[test]
    fn parse_reference_dates() {
        let date = CalendarDate::parse("1950-01-01 00:00:00").unwrap();
        assert_eq!(date, CalendarDate::new(1950, 1, 1));
        let date = CalendarDate::parse("1850-1-1").unwrap();
        assert_eq!(date, CalendarDate::new(1850, 1, 1));
        let date = CalendarDate::parse("2000-06-01T12:30").unwrap();
        assert_eq!(date, CalendarDate::new(2000, 6, 1).with_time(12, 30, 0));
        assert!(CalendarDate::parse("not a date").is_err());
        assert!(CalendarDate::parse("2000-13-01").is_err());
    }

    #[test]
    fn day_of_year_respects_leap_rule() {
        let date = CalendarDate::new(2000, 3, 1);
        assert_eq!(Calendar::Day365.day_of_year(&date), 60);
        assert_eq!(Calendar::Day366.day_of_year(&date), 61);
        assert_eq!(Calendar::Day360.day_of_year(&date), 61);
    }
}
