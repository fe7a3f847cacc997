//! Temporal frequency classes.
//!
//! Frequency tokens are resolved once at checker construction instead of
//! being re-parsed per coordinate pair. Tokens that do not resolve are kept
//! verbatim and reported as unsupported by the time check.

/// A recognized frequency class with its numeric parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frequency {
    /// `mon`: consecutive points step one calendar month.
    Monthly,
    /// `yr`: consecutive points step one calendar year.
    Yearly,
    /// `dec`: gaps of 3600 to 3660 days.
    Decadal,
    /// `day`: gaps of one day.
    Daily,
    /// `<N>hr`: gaps of N hours.
    Hourly(f64),
    /// `subhr`: gaps below one hour; only the upper bound is strict.
    SubHourly,
}

impl Frequency {
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        match trimmed {
            "mon" => Some(Self::Monthly),
            "yr" => Some(Self::Yearly),
            "dec" => Some(Self::Decadal),
            "day" => Some(Self::Daily),
            _ => {
                let prefix = trimmed.strip_suffix("hr")?.trim();
                if prefix == "sub" {
                    return Some(Self::SubHourly);
                }
                prefix
                    .parse::<f64>()
                    .ok()
                    .filter(|hours| *hours > 0.0)
                    .map(Self::Hourly)
            }
        }
    }

    /// Accepted gap between consecutive points in days, tolerance included.
    /// The calendar-stepped classes (`mon`, `yr`) have no fixed interval.
    pub fn interval_days(self, tolerance: f64) -> Option<(f64, f64)> {
        match self {
            Self::Monthly | Self::Yearly => None,
            Self::Decadal => Some((3600.0 - tolerance, 3660.0 + tolerance)),
            Self::Daily => Some((1.0 - tolerance, 1.0 + tolerance)),
            Self::Hourly(hours) => {
                let days = hours / 24.0;
                Some((days - tolerance, days + tolerance))
            }
            Self::SubHourly => Some((-tolerance, 1.0 / 24.0 + tolerance)),
        }
    }
}
