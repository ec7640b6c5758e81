use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc};

/// All period arithmetic is anchored to UTC+7 (WIB) so that day, week,
/// month, and year boundaries are stable regardless of where the service
/// runs.
pub const REPORT_OFFSET_SECS: i32 = 7 * 3600;

pub fn report_offset() -> FixedOffset {
    FixedOffset::east_opt(REPORT_OFFSET_SECS).expect("UTC+7 is a valid offset")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodUnit {
    /// Unrecognized or empty input falls back to monthly.
    pub fn parse(value: &str) -> PeriodUnit {
        match value.trim().to_lowercase().as_str() {
            "daily" => PeriodUnit::Daily,
            "weekly" => PeriodUnit::Weekly,
            "yearly" => PeriodUnit::Yearly,
            _ => PeriodUnit::Monthly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Daily => "daily",
            PeriodUnit::Weekly => "weekly",
            PeriodUnit::Monthly => "monthly",
            PeriodUnit::Yearly => "yearly",
        }
    }
}

/// Truncate an instant to the start of its period in WIB. Weeks are
/// Monday-anchored.
pub fn period_start(instant: DateTime<Utc>, unit: PeriodUnit) -> DateTime<Utc> {
    let local = instant.with_timezone(&report_offset());
    let date = local.date_naive();
    let start = match unit {
        PeriodUnit::Daily => date,
        PeriodUnit::Weekly => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        PeriodUnit::Monthly => date.with_day(1).expect("day 1 exists in every month"),
        PeriodUnit::Yearly => {
            NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("Jan 1 exists in every year")
        }
    };
    local_midnight(start)
}

/// Advance by whole calendar units. Month and year steps follow calendar
/// arithmetic, clamping to the last day of shorter months.
pub fn add_periods(instant: DateTime<Utc>, unit: PeriodUnit, count: i32) -> DateTime<Utc> {
    let local = instant.with_timezone(&report_offset());
    let date = local.date_naive();
    let shifted = match unit {
        PeriodUnit::Daily => date + Duration::days(count as i64),
        PeriodUnit::Weekly => date + Duration::days(7 * count as i64),
        PeriodUnit::Monthly => shift_months(date, count),
        PeriodUnit::Yearly => shift_months(date, 12 * count),
    };
    in_report_offset(shifted, local.time())
}

pub fn format_label(instant: DateTime<Utc>, unit: PeriodUnit) -> String {
    let local = instant.with_timezone(&report_offset());
    match unit {
        PeriodUnit::Daily => local.format("%d %b %Y").to_string(),
        PeriodUnit::Weekly => format!("Week of {}", local.format("%d %b %Y")),
        PeriodUnit::Monthly => local.format("%b %Y").to_string(),
        PeriodUnit::Yearly => local.format("%Y").to_string(),
    }
}

/// The half-open window `[start, end)` covering exactly `periods` units,
/// ending with the period containing `now`.
pub fn period_range(
    unit: PeriodUnit,
    periods: usize,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let periods = periods.max(1);
    let anchor = period_start(now, unit);
    let end = add_periods(anchor, unit, 1);
    let start = add_periods(anchor, unit, -((periods - 1) as i32));
    (start, end)
}

fn shift_months(date: NaiveDate, count: i32) -> NaiveDate {
    if count >= 0 {
        date + Months::new(count as u32)
    } else {
        date - Months::new(count.unsigned_abs())
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    in_report_offset(date, NaiveTime::MIN)
}

fn in_report_offset(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    report_offset()
        .from_local_datetime(&date.and_time(time))
        .single()
        .expect("fixed offsets map local times uniquely")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_UNITS: [PeriodUnit; 4] = [
        PeriodUnit::Daily,
        PeriodUnit::Weekly,
        PeriodUnit::Monthly,
        PeriodUnit::Yearly,
    ];

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parse_recognizes_units_and_defaults_to_monthly() {
        assert_eq!(PeriodUnit::parse(" Daily "), PeriodUnit::Daily);
        assert_eq!(PeriodUnit::parse("WEEKLY"), PeriodUnit::Weekly);
        assert_eq!(PeriodUnit::parse("yearly"), PeriodUnit::Yearly);
        for raw in ["monthly", "", "quarterly", "invalid"] {
            assert_eq!(PeriodUnit::parse(raw), PeriodUnit::Monthly, "input {raw:?}");
        }
    }

    #[test]
    fn daily_start_truncates_in_wib_not_utc() {
        // 18:30 UTC is already the next day in WIB.
        let instant = utc(2026, 8, 2, 18, 30, 0);
        assert_eq!(
            period_start(instant, PeriodUnit::Daily),
            utc(2026, 8, 2, 17, 0, 0)
        );
    }

    #[test]
    fn weekly_start_is_the_most_recent_monday() {
        // 2026-08-03 is a Monday; 2026-08-07 a Friday.
        let friday = utc(2026, 8, 7, 5, 0, 0);
        let monday_midnight_wib = utc(2026, 8, 2, 17, 0, 0);
        assert_eq!(period_start(friday, PeriodUnit::Weekly), monday_midnight_wib);

        let monday = utc(2026, 8, 3, 5, 0, 0);
        assert_eq!(period_start(monday, PeriodUnit::Weekly), monday_midnight_wib);
    }

    #[test]
    fn monthly_and_yearly_starts() {
        let instant = utc(2026, 8, 7, 5, 0, 0);
        assert_eq!(
            period_start(instant, PeriodUnit::Monthly),
            utc(2026, 7, 31, 17, 0, 0)
        );
        assert_eq!(
            period_start(instant, PeriodUnit::Yearly),
            utc(2025, 12, 31, 17, 0, 0)
        );
    }

    #[test]
    fn period_start_is_idempotent() {
        let instant = utc(2026, 8, 7, 5, 0, 0);
        for unit in ALL_UNITS {
            let once = period_start(instant, unit);
            assert_eq!(period_start(once, unit), once, "unit {unit:?}");
        }
    }

    #[test]
    fn add_periods_advances_whole_units() {
        let start = period_start(utc(2026, 8, 7, 5, 0, 0), PeriodUnit::Monthly);
        assert_eq!(
            add_periods(start, PeriodUnit::Monthly, 1),
            utc(2026, 8, 31, 17, 0, 0)
        );
        assert_eq!(
            add_periods(start, PeriodUnit::Monthly, -2),
            utc(2026, 5, 31, 17, 0, 0)
        );
        assert_eq!(
            add_periods(start, PeriodUnit::Yearly, 1),
            utc(2027, 7, 31, 17, 0, 0)
        );
    }

    #[test]
    fn month_end_overflow_clamps() {
        // Mar 31 + 1 month lands on Apr 30.
        let instant = in_report_offset(
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            NaiveTime::MIN,
        );
        let next = add_periods(instant, PeriodUnit::Monthly, 1);
        let local = next.with_timezone(&report_offset());
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 4, 30).unwrap());
    }

    #[test]
    fn range_spans_exactly_n_contiguous_periods() {
        let now = utc(2026, 8, 7, 5, 0, 0);
        for unit in ALL_UNITS {
            let periods = 5;
            let (start, end) = period_range(unit, periods, now);
            assert_eq!(start, add_periods(period_start(now, unit), unit, -4));
            assert_eq!(end, add_periods(period_start(now, unit), unit, 1));

            // Walking bucket by bucket covers [start, end) with no gaps.
            let mut cursor = start;
            for _ in 0..periods {
                cursor = add_periods(cursor, unit, 1);
            }
            assert_eq!(cursor, end, "unit {unit:?}");
        }
    }

    #[test]
    fn labels_per_unit() {
        let instant = utc(2026, 8, 7, 5, 0, 0);
        assert_eq!(format_label(instant, PeriodUnit::Daily), "07 Aug 2026");
        assert_eq!(
            format_label(period_start(instant, PeriodUnit::Weekly), PeriodUnit::Weekly),
            "Week of 03 Aug 2026"
        );
        assert_eq!(format_label(instant, PeriodUnit::Monthly), "Aug 2026");
        assert_eq!(format_label(instant, PeriodUnit::Yearly), "2026");
    }
}
