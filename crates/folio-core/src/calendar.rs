//! Year-at-a-glance contribution grid.
//!
//! A grid is a list of week columns, each holding seven Monday-first cells.
//! Cells before January 1 and after December 31 are empty placeholders so
//! every column is complete.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::activity::{DateCountMap, restrict_to_year, total};
use crate::config::Config;

pub const MAX_LEVEL: u8 = 4;
pub const DAYS_PER_WEEK: u32 = 7;

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Weekday of January 1, Monday = 0 .. Sunday = 6.
pub fn first_day_offset(year: i32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(|jan1| jan1.weekday().num_days_from_monday())
}

pub fn exact_week_count(year: i32) -> Option<u32> {
    first_day_offset(year).map(|offset| (offset + days_in_year(year)).div_ceil(DAYS_PER_WEEK))
}

/// Ascending lower bounds for levels 1..=4.
///
/// A count reaches level `n` when it is at least the `n`-th bound, so the
/// level is a non-decreasing step function of the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelThresholds(Vec<u64>);

impl LevelThresholds {
    pub fn new(bounds: Vec<u64>) -> anyhow::Result<Self> {
        if bounds.is_empty() || bounds.len() > MAX_LEVEL as usize {
            return Err(anyhow!(
                "expected between 1 and {MAX_LEVEL} level thresholds, got {}",
                bounds.len()
            ));
        }
        if bounds[0] == 0 {
            return Err(anyhow!("level thresholds must start at 1 or more"));
        }
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(anyhow!(
                "level thresholds must be strictly ascending: {bounds:?}"
            ));
        }
        Ok(Self(bounds))
    }

    /// `>0`, `>3`, `>6`, `>9` tiers used by the submission calendar.
    pub fn stepped() -> Self {
        Self(vec![1, 4, 7, 10])
    }

    /// One level per event, capped at the top level.
    pub fn capped() -> Self {
        Self(vec![1, 2, 3, 4])
    }

    pub fn bounds(&self) -> &[u64] {
        &self.0
    }

    pub fn level_for(&self, count: u64) -> u8 {
        self.0.iter().take_while(|bound| count >= **bound).count() as u8
    }
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self::stepped()
    }
}

impl FromStr for LevelThresholds {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stepped" => return Ok(Self::stepped()),
            "capped" => return Ok(Self::capped()),
            _ => {}
        }

        let bounds = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>()
                    .with_context(|| format!("invalid level threshold: {part}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::new(bounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekPolicy {
    #[default]
    Exact,
    AtLeast(u32),
}

impl WeekPolicy {
    pub fn week_count(self, year: i32) -> Option<u32> {
        let exact = exact_week_count(year)?;
        Some(match self {
            Self::Exact => exact,
            // never drop trailing days in a year that needs a 54th column
            Self::AtLeast(min) => exact.max(min),
        })
    }
}

impl FromStr for WeekPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("exact") {
            return Ok(Self::Exact);
        }
        let weeks = trimmed
            .parse::<u32>()
            .with_context(|| format!("expected 'exact' or a week count, got: {trimmed}"))?;
        if weeks == 0 || weeks > 60 {
            return Err(anyhow!("week count out of range: {weeks}"));
        }
        Ok(Self::AtLeast(weeks))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Weeks run left to right, weekdays top to bottom.
    #[default]
    Columns,
    /// One line per week, weekdays left to right.
    Rows,
}

impl FromStr for Orientation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columns" | "column" | "horizontal" => Ok(Self::Columns),
            "rows" | "row" | "vertical" => Ok(Self::Rows),
            other => Err(anyhow!("invalid calendar orientation: {other}")),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columns => write!(f, "columns"),
            Self::Rows => write!(f, "rows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GridOptions {
    pub thresholds: LevelThresholds,
    pub weeks: WeekPolicy,
    pub orientation: Orientation,
}

impl GridOptions {
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let mut options = Self::default();
        if let Some(raw) = cfg.get("calendar.thresholds") {
            options.thresholds = raw
                .parse()
                .context("invalid calendar.thresholds setting")?;
        }
        if let Some(raw) = cfg.get("calendar.weeks") {
            options.weeks = raw.parse().context("invalid calendar.weeks setting")?;
        }
        if let Some(raw) = cfg.get("calendar.orientation") {
            options.orientation = raw
                .parse()
                .context("invalid calendar.orientation setting")?;
        }
        debug!(?options, "resolved calendar options");
        Ok(options)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub week: u32,
    pub weekday: u8,
    /// `None` marks a filler cell outside the year.
    pub date: Option<NaiveDate>,
    pub count: u64,
    pub level: u8,
}

impl GridCell {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    pub month: u32,
    pub name: &'static str,
    pub week: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusiestDay {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GridStats {
    pub total: u64,
    pub active_days: u32,
    pub busiest: Option<BusiestDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_month: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGrid {
    pub year: i32,
    pub orientation: Orientation,
    pub thresholds: LevelThresholds,
    pub first_day_offset: u32,
    pub days_in_year: u32,
    pub weeks: Vec<Vec<GridCell>>,
    pub month_labels: Vec<MonthLabel>,
    pub stats: GridStats,
}

impl YearGrid {
    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn populated_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.weeks.iter().flatten().filter(|cell| !cell.is_empty())
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&GridCell> {
        if date.year() != self.year {
            return None;
        }
        let index = date.ordinal0() + self.first_day_offset;
        self.weeks
            .get((index / DAYS_PER_WEEK) as usize)
            .and_then(|week| week.get((index % DAYS_PER_WEEK) as usize))
    }

    /// Cells regrouped by weekday, one row per weekday, for painters that
    /// draw week columns line by line.
    pub fn weekday_rows(&self) -> Vec<Vec<&GridCell>> {
        (0..DAYS_PER_WEEK as usize)
            .map(|weekday| {
                self.weeks
                    .iter()
                    .filter_map(|week| week.get(weekday))
                    .collect()
            })
            .collect()
    }

    pub fn with_previous_month(mut self, count: u64) -> Self {
        self.stats.previous_month = Some(count);
        self
    }
}

/// Lays out `year` as a Monday-first week grid.
///
/// Total over every year chrono can represent; years outside that range
/// yield a grid without weeks.
#[tracing::instrument(skip(counts, options), fields(entries = counts.len()))]
pub fn build_year_grid(year: i32, counts: &DateCountMap, options: &GridOptions) -> YearGrid {
    let days = days_in_year(year);
    let (Some(jan1), Some(offset), Some(total_weeks)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        first_day_offset(year),
        options.weeks.week_count(year),
    ) else {
        warn!(year, "year outside supported date range; rendering empty grid");
        return YearGrid {
            year,
            orientation: options.orientation,
            thresholds: options.thresholds.clone(),
            first_day_offset: 0,
            days_in_year: days,
            weeks: vec![],
            month_labels: vec![],
            stats: GridStats::default(),
        };
    };

    let mut weeks = Vec::with_capacity(total_weeks as usize);
    let mut month_labels: Vec<MonthLabel> = Vec::with_capacity(12);
    let mut current_month = None;

    for week in 0..total_weeks {
        let mut cells = Vec::with_capacity(DAYS_PER_WEEK as usize);
        for weekday in 0..DAYS_PER_WEEK {
            let day_index = i64::from(week * DAYS_PER_WEEK + weekday) - i64::from(offset);
            let date = u64::try_from(day_index)
                .ok()
                .filter(|index| *index < u64::from(days))
                .and_then(|index| jan1.checked_add_days(Days::new(index)));

            let Some(date) = date else {
                cells.push(GridCell {
                    week,
                    weekday: weekday as u8,
                    date: None,
                    count: 0,
                    level: 0,
                });
                continue;
            };

            let month = date.month();
            if current_month != Some(month) {
                current_month = Some(month);
                if !month_labels.iter().any(|label| label.month == month) {
                    month_labels.push(MonthLabel {
                        month,
                        name: MONTH_NAMES[month0(month)],
                        week,
                    });
                }
            }

            let count = counts.get(&date).copied().unwrap_or(0);
            cells.push(GridCell {
                week,
                weekday: weekday as u8,
                date: Some(date),
                count,
                level: options.thresholds.level_for(count),
            });
        }
        weeks.push(cells);
    }

    let stats = year_stats(year, counts);
    debug!(
        year,
        weeks = weeks.len(),
        total = stats.total,
        active_days = stats.active_days,
        "built year grid"
    );

    YearGrid {
        year,
        orientation: options.orientation,
        thresholds: options.thresholds.clone(),
        first_day_offset: offset,
        days_in_year: days,
        weeks,
        month_labels,
        stats,
    }
}

fn year_stats(year: i32, counts: &DateCountMap) -> GridStats {
    let in_year = restrict_to_year(counts, year);
    let mut stats = GridStats {
        total: total(&in_year),
        ..GridStats::default()
    };
    for (date, count) in &in_year {
        if *count > 0 {
            stats.active_days += 1;
        }
        let beats_busiest = stats
            .busiest
            .map(|busiest| *count > busiest.count)
            .unwrap_or(*count > 0);
        if beats_busiest {
            stats.busiest = Some(BusiestDay {
                date: *date,
                count: *count,
            });
        }
    }
    stats
}

fn month0(month: u32) -> usize {
    (month.clamp(1, 12) - 1) as usize
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        GridOptions, LevelThresholds, Orientation, WeekPolicy, build_year_grid, days_in_year,
        exact_week_count, first_day_offset, is_leap_year,
    };
    use crate::activity::DateCountMap;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn gregorian_leap_rule() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(is_leap_year(2024));
        assert_eq!(days_in_year(2000), 366);
        assert_eq!(days_in_year(1900), 365);
        assert_eq!(days_in_year(2023), 365);

        for year in -400..2400 {
            let expected = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
            assert_eq!(is_leap_year(year), expected, "year {year}");
        }
    }

    #[test]
    fn first_day_offset_is_monday_based() {
        // 2024-01-01 was a Monday, 2023-01-01 a Sunday.
        assert_eq!(first_day_offset(2024), Some(0));
        assert_eq!(first_day_offset(2023), Some(6));
        assert_eq!(first_day_offset(2026), Some(3));
    }

    #[test]
    fn every_day_lands_in_exactly_one_cell() {
        let options = GridOptions::default();
        for year in 1890..2110 {
            let grid = build_year_grid(year, &DateCountMap::new(), &options);
            let dates: Vec<NaiveDate> = grid.populated_cells().filter_map(|c| c.date).collect();
            assert_eq!(dates.len() as u32, days_in_year(year), "year {year}");
            assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
            assert_eq!(dates.first(), Some(&ymd(year, 1, 1)));
            assert_eq!(dates.last(), Some(&ymd(year, 12, 31)));
            assert_eq!(grid.week_count() as u32, exact_week_count(year).unwrap_or(0));
            assert!(grid.weeks.iter().all(|week| week.len() == 7));
        }
    }

    #[test]
    fn fixed_week_count_pads_but_never_truncates() {
        let options = GridOptions {
            weeks: WeekPolicy::AtLeast(53),
            ..GridOptions::default()
        };

        // 2023 needs exactly 53 columns.
        let grid = build_year_grid(2023, &DateCountMap::new(), &options);
        assert_eq!(grid.week_count(), 53);

        // 2026 fits in 53 columns with a trailing partial week.
        let grid = build_year_grid(2026, &DateCountMap::new(), &options);
        assert_eq!(grid.week_count(), 53);
        assert_eq!(exact_week_count(2026), Some(53));

        // 2012 starts on a Sunday and is a leap year: 6 + 366 needs 54.
        let grid = build_year_grid(2012, &DateCountMap::new(), &options);
        assert_eq!(grid.week_count(), 54);
        assert_eq!(grid.populated_cells().count(), 366);
        assert!(grid.cell(ymd(2012, 12, 31)).is_some());

        let padded = GridOptions {
            weeks: WeekPolicy::AtLeast(55),
            ..GridOptions::default()
        };
        let grid = build_year_grid(2024, &DateCountMap::new(), &padded);
        assert_eq!(grid.week_count(), 55);
        assert!(grid.weeks[54].iter().all(|cell| cell.is_empty()));
    }

    #[test]
    fn single_entry_gets_stepped_level() {
        let mut counts = DateCountMap::new();
        counts.insert(ymd(2024, 3, 15), 7);

        let grid = build_year_grid(2024, &counts, &GridOptions::default());
        let cell = grid.cell(ymd(2024, 3, 15)).expect("cell for 2024-03-15");
        assert_eq!(cell.date, Some(ymd(2024, 3, 15)));
        assert_eq!(cell.count, 7);
        assert_eq!(cell.level, 3);
        assert_eq!(cell.weekday, 4);

        let others = grid
            .populated_cells()
            .filter(|c| c.date != Some(ymd(2024, 3, 15)));
        assert!(others.into_iter().all(|c| c.level == 0 && c.count == 0));
        assert_eq!(grid.stats.total, 7);
        assert_eq!(grid.stats.active_days, 1);
    }

    #[test]
    fn levels_step_monotonically() {
        let stepped = LevelThresholds::stepped();
        let expected = [0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        for (count, level) in expected.iter().enumerate() {
            assert_eq!(stepped.level_for(count as u64), *level, "count {count}");
        }

        let capped = LevelThresholds::capped();
        assert_eq!(capped.level_for(0), 0);
        assert_eq!(capped.level_for(2), 2);
        assert_eq!(capped.level_for(4), 4);
        assert_eq!(capped.level_for(40), 4);

        let mut previous = 0;
        for count in 0..200 {
            let level = stepped.level_for(count);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn parses_threshold_settings() {
        assert_eq!(
            "1, 4,7,10".parse::<LevelThresholds>().expect("parse"),
            LevelThresholds::stepped()
        );
        assert_eq!(
            "capped".parse::<LevelThresholds>().expect("parse"),
            LevelThresholds::capped()
        );
        assert_eq!(
            "2,5".parse::<LevelThresholds>().expect("parse").bounds(),
            &[2, 5]
        );
        assert!("4,1".parse::<LevelThresholds>().is_err());
        assert!("0,1".parse::<LevelThresholds>().is_err());
        assert!("1,2,3,4,5".parse::<LevelThresholds>().is_err());
        assert!("".parse::<LevelThresholds>().is_err());
        assert!("1,x".parse::<LevelThresholds>().is_err());
    }

    #[test]
    fn parses_week_policy_and_orientation() {
        assert_eq!("exact".parse::<WeekPolicy>().expect("parse"), WeekPolicy::Exact);
        assert_eq!(
            "53".parse::<WeekPolicy>().expect("parse"),
            WeekPolicy::AtLeast(53)
        );
        assert!("0".parse::<WeekPolicy>().is_err());
        assert!("many".parse::<WeekPolicy>().is_err());
        assert_eq!(
            "Rows".parse::<Orientation>().expect("parse"),
            Orientation::Rows
        );
        assert!("diagonal".parse::<Orientation>().is_err());
    }

    #[test]
    fn month_labels_follow_week_order() {
        let grid = build_year_grid(2025, &DateCountMap::new(), &GridOptions::default());
        assert_eq!(grid.month_labels.len(), 12);
        assert_eq!(grid.month_labels[0].week, 0);
        assert_eq!(grid.month_labels[0].name, "Jan");
        for pair in grid.month_labels.windows(2) {
            assert_eq!(pair[1].month, pair[0].month + 1);
            assert!(pair[1].week >= pair[0].week);
        }
        // 2025-03-01 is a Saturday in the ninth column.
        assert_eq!(grid.month_labels[2].week, 8);
        let label_cell = grid.cell(ymd(2025, 3, 1)).expect("march 1");
        assert_eq!(label_cell.week, grid.month_labels[2].week);
    }

    #[test]
    fn totals_ignore_other_years() {
        let mut counts = DateCountMap::new();
        counts.insert(ymd(2023, 12, 31), 5);
        counts.insert(ymd(2024, 1, 1), 2);
        counts.insert(ymd(2024, 6, 1), 9);
        counts.insert(ymd(2025, 1, 1), 3);

        let grid = build_year_grid(2024, &counts, &GridOptions::default());
        assert_eq!(grid.stats.total, 11);
        assert_eq!(grid.stats.active_days, 2);
        let busiest = grid.stats.busiest.expect("busiest day");
        assert_eq!(busiest.date, ymd(2024, 6, 1));
        assert_eq!(busiest.count, 9);
        assert_eq!(grid.stats.previous_month, None);
    }

    #[test]
    fn empty_counts_give_blank_grid() {
        let grid = build_year_grid(2023, &DateCountMap::new(), &GridOptions::default());
        assert!(grid.populated_cells().all(|cell| cell.level == 0));
        assert_eq!(grid.stats.total, 0);
        assert_eq!(grid.stats.active_days, 0);
        assert!(grid.stats.busiest.is_none());
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let mut counts = DateCountMap::new();
        counts.insert(ymd(2024, 2, 29), 12);
        counts.insert(ymd(2024, 7, 4), 1);
        let options = GridOptions {
            thresholds: LevelThresholds::capped(),
            weeks: WeekPolicy::AtLeast(53),
            orientation: Orientation::Rows,
        };

        let first = build_year_grid(2024, &counts, &options);
        let second = build_year_grid(2024, &counts, &options);
        assert_eq!(first, second);
        assert_eq!(first.cell(ymd(2024, 2, 29)).map(|c| c.level), Some(4));
    }

    #[test]
    fn weekday_rows_transpose_weeks() {
        let grid = build_year_grid(2024, &DateCountMap::new(), &GridOptions::default());
        let rows = grid.weekday_rows();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|row| row.len() == grid.week_count()));
        assert!(rows[6].iter().all(|cell| cell.weekday == 6));
        assert_eq!(rows[0][0].date, Some(ymd(2024, 1, 1)));
    }

    #[test]
    fn out_of_range_year_yields_empty_grid() {
        let grid = build_year_grid(i32::MAX, &DateCountMap::new(), &GridOptions::default());
        assert_eq!(grid.week_count(), 0);
        assert!(grid.month_labels.is_empty());
    }
}
