use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datetime::date_in_timezone;

/// Calendar date to number of events on that date.
pub type DateCountMap = BTreeMap<NaiveDate, u64>;

/// One timestamped event, counted once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: i64,
}

impl ActivityRecord {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    pub fn date(&self, tz: &Tz) -> Option<NaiveDate> {
        date_in_timezone(self.timestamp, tz)
    }
}

pub fn count_by_date<I>(dates: I) -> DateCountMap
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut counts = DateCountMap::new();
    for date in dates {
        *counts.entry(date).or_insert(0) += 1;
    }
    counts
}

#[tracing::instrument(skip(records, tz), fields(records = records.len()))]
pub fn count_records(records: &[ActivityRecord], tz: &Tz) -> DateCountMap {
    let counts = count_by_date(records.iter().filter_map(|record| record.date(tz)));
    debug!(days = counts.len(), "aggregated activity records");
    counts
}

pub fn restrict_to_year(counts: &DateCountMap, year: i32) -> DateCountMap {
    counts
        .iter()
        .filter(|(date, _)| date.year() == year)
        .map(|(date, count)| (*date, *count))
        .collect()
}

pub fn total(counts: &DateCountMap) -> u64 {
    counts.values().sum()
}

/// First and last day of the calendar month before `today`'s month.
pub fn previous_month_range(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first_of_this_month = today.with_day(1)?;
    let last_of_previous = first_of_this_month.pred_opt()?;
    let first_of_previous = last_of_previous.with_day(1)?;
    Some((first_of_previous, last_of_previous))
}

pub fn previous_month_count<I>(dates: I, today: NaiveDate) -> u64
where
    I: IntoIterator<Item = NaiveDate>,
{
    let Some((start, end)) = previous_month_range(today) else {
        return 0;
    };
    dates
        .into_iter()
        .filter(|date| *date >= start && *date <= end)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        ActivityRecord, count_by_date, count_records, previous_month_count, previous_month_range,
        restrict_to_year, total,
    };

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn counts_each_date_once_per_event() {
        let counts = count_by_date([ymd(2024, 1, 2), ymd(2024, 1, 2), ymd(2024, 5, 9)]);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&ymd(2024, 1, 2)), Some(&2));
        assert_eq!(counts.get(&ymd(2024, 5, 9)), Some(&1));
        assert_eq!(total(&counts), 3);
    }

    #[test]
    fn records_bucket_by_local_date() {
        // 2024-03-14T20:00:00Z is already March 15 in Shanghai.
        let records = [
            ActivityRecord::new(1_710_446_400),
            ActivityRecord::new(1_710_446_400 + 3_600),
        ];
        let shanghai = chrono_tz::Asia::Shanghai;
        let counts = count_records(&records, &shanghai);
        assert_eq!(counts.get(&ymd(2024, 3, 15)), Some(&2));

        let utc = count_records(&records, &chrono_tz::UTC);
        assert_eq!(utc.get(&ymd(2024, 3, 14)), Some(&2));
        assert!(!utc.contains_key(&ymd(2024, 3, 15)));
    }

    #[test]
    fn restricts_to_one_year() {
        let counts = count_by_date([ymd(2023, 12, 31), ymd(2024, 1, 1), ymd(2024, 12, 31)]);
        let year = restrict_to_year(&counts, 2024);
        assert_eq!(year.len(), 2);
        assert!(!year.contains_key(&ymd(2023, 12, 31)));
    }

    #[test]
    fn previous_month_wraps_year() {
        assert_eq!(
            previous_month_range(ymd(2026, 1, 19)),
            Some((ymd(2025, 12, 1), ymd(2025, 12, 31)))
        );
        assert_eq!(
            previous_month_range(ymd(2024, 3, 31)),
            Some((ymd(2024, 2, 1), ymd(2024, 2, 29)))
        );

        let dates = [
            ymd(2024, 1, 31),
            ymd(2024, 2, 1),
            ymd(2024, 2, 29),
            ymd(2024, 3, 1),
        ];
        assert_eq!(previous_month_count(dates, ymd(2024, 3, 10)), 2);
    }
}
