use crate::series::IntervalSeries;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub(crate) fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, month, day).unwrap()
}

pub(crate) fn at(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(month, day).and_hms_opt(hour, minute, 0).unwrap()
}

/// 15-minute readings for every day in `[first, last]`, each hour summing to
/// `hourly_kwh(day, hour)`.
pub(crate) fn quarter_hour_history<F>(first: NaiveDate, last: NaiveDate, hourly_kwh: F) -> IntervalSeries
where
    F: Fn(NaiveDate, u32) -> f64,
{
    let mut readings = Vec::new();
    let mut day = first;
    while day <= last {
        let midnight = day.and_time(NaiveTime::MIN);
        for hour in 0..24u32 {
            let per_interval = hourly_kwh(day, hour) / 4.0;
            for quarter in 0..4i64 {
                readings.push((
                    midnight + Duration::hours(i64::from(hour)) + Duration::minutes(quarter * 15),
                    per_interval,
                ));
            }
        }
        day = day.succ_opt().unwrap();
    }
    IntervalSeries::new(15, readings).unwrap()
}
