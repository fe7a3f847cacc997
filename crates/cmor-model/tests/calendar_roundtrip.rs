//! Property tests for calendar arithmetic.

use cmor_model::{Calendar, CalendarDate};
use proptest::prelude::*;

fn calendars() -> impl Strategy<Value = Calendar> {
    prop_oneof![
        Just(Calendar::Gregorian),
        Just(Calendar::ProlepticGregorian),
        Just(Calendar::Julian),
        Just(Calendar::Day360),
        Just(Calendar::Day365),
        Just(Calendar::Day366),
    ]
}

proptest! {
    /// Offsetting the epoch by a whole number of days and decomposing the
    /// result is the identity on day numbers, in every calendar.
    #[test]
    fn whole_day_offsets_roundtrip(calendar in calendars(), days in -200_000i64..200_000i64) {
        let epoch = CalendarDate::new(1950, 1, 1);
        let date = calendar.date_at(&epoch, days as f64).unwrap();
        let back = calendar.days_between(&epoch, &date).unwrap();
        prop_assert_eq!(back as i64, days);
        prop_assert!((back - days as f64).abs() < 1e-9);
    }

    /// A one-year step lands on the same month and day.
    #[test]
    fn year_step_preserves_month_and_day(calendar in calendars(), year in 1850i64..2100i64) {
        let date = CalendarDate::new(year, 3, 15);
        let next = CalendarDate::new(year + 1, 3, 15);
        let days = calendar.days_between(&date, &next).unwrap();
        let stepped = calendar.date_at(&date, days).unwrap();
        prop_assert_eq!(stepped, next);
    }
}
