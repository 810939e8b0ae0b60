//! Append-only completion counters for reporting.
//!
//! Three counter families are incremented together for every completed work
//! interval: per local calendar day, per (day, half-hour slot), and per
//! (day, category). Counts only ever grow; a full reset is the single path
//! that clears them. Durability is layered on by [`crate::storage::Database`],
//! which applies the same three increments in one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::task::TaskCategory;

/// Half-hour slot of a day, 0..=47.
pub type Slot = u8;

/// Rolling summary over trailing day windows (inclusive of today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub today: u32,
    pub this_week: u32,
    pub this_month: u32,
    pub total: u32,
}

/// In-memory completion counters. Purely derived, historical state.
#[derive(Debug, Clone, Default)]
pub struct StatisticsStore {
    daily: BTreeMap<NaiveDate, u32>,
    half_hour: BTreeMap<(NaiveDate, Slot), u32>,
    by_category: BTreeMap<(NaiveDate, TaskCategory), u32>,
}

/// Slot index for a time of day: `hour * 2`, plus one past the half hour.
pub fn slot_of(time: NaiveTime) -> Slot {
    (time.hour() * 2 + u32::from(time.minute() >= 30)) as Slot
}

impl StatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted counter rows.
    pub fn from_counts(
        daily: BTreeMap<NaiveDate, u32>,
        half_hour: BTreeMap<(NaiveDate, Slot), u32>,
        by_category: BTreeMap<(NaiveDate, TaskCategory), u32>,
    ) -> Self {
        Self {
            daily,
            half_hour,
            by_category,
        }
    }

    /// Count one completed interval for `category` at `at`, bucketed by the
    /// local calendar day. All three counters move as one logical event.
    pub fn record(&mut self, category: TaskCategory, at: DateTime<Local>) {
        let day = at.date_naive();
        let slot = slot_of(at.time());
        *self.daily.entry(day).or_insert(0) += 1;
        *self.half_hour.entry((day, slot)).or_insert(0) += 1;
        *self.by_category.entry((day, category)).or_insert(0) += 1;
    }

    pub fn count_for_day(&self, date: NaiveDate) -> u32 {
        self.daily.get(&date).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.daily.values().sum()
    }

    /// Summary with trailing 7- and 30-day windows ending at `today`.
    pub fn summary_at(&self, today: NaiveDate) -> Summary {
        Summary {
            today: self.count_for_day(today),
            this_week: self.trailing_sum(today, 7),
            this_month: self.trailing_sum(today, 30),
            total: self.total(),
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary_at(Local::now().date_naive())
    }

    /// Per-day counts for a trailing window of `days` ending at `ending`,
    /// oldest first. Days with no completions are present with a zero count.
    pub fn heatmap_series_at(&self, days: u32, ending: NaiveDate) -> Vec<(NaiveDate, u32)> {
        (0..days)
            .rev()
            .filter_map(|offset| ending.checked_sub_days(Days::new(u64::from(offset))))
            .map(|day| (day, self.count_for_day(day)))
            .collect()
    }

    pub fn heatmap_series(&self, days: u32) -> Vec<(NaiveDate, u32)> {
        self.heatmap_series_at(days, Local::now().date_naive())
    }

    /// Non-zero half-hour slot counts for `date`.
    pub fn half_hourly_at(&self, date: NaiveDate) -> BTreeMap<Slot, u32> {
        self.half_hour
            .range((date, 0)..=(date, 47))
            .map(|(&(_, slot), &count)| (slot, count))
            .collect()
    }

    pub fn half_hourly_today(&self) -> BTreeMap<Slot, u32> {
        self.half_hourly_at(Local::now().date_naive())
    }

    /// Per-category counts for `date`. Categories with no completions are
    /// omitted.
    pub fn category_breakdown_at(&self, date: NaiveDate) -> BTreeMap<TaskCategory, u32> {
        self.by_category
            .range((date, TaskCategory::Work)..=(date, TaskCategory::Hobby))
            .map(|(&(_, category), &count)| (category, count))
            .collect()
    }

    pub fn category_breakdown_today(&self) -> BTreeMap<TaskCategory, u32> {
        self.category_breakdown_at(Local::now().date_naive())
    }

    /// Drop all counters. The only decrementing operation.
    pub fn reset(&mut self) {
        self.daily.clear();
        self.half_hour.clear();
        self.by_category.clear();
    }

    pub(crate) fn daily_counts(&self) -> &BTreeMap<NaiveDate, u32> {
        &self.daily
    }

    pub(crate) fn half_hour_counts(&self) -> &BTreeMap<(NaiveDate, Slot), u32> {
        &self.half_hour
    }

    pub(crate) fn category_counts(&self) -> &BTreeMap<(NaiveDate, TaskCategory), u32> {
        &self.by_category
    }

    fn trailing_sum(&self, ending: NaiveDate, days: u64) -> u32 {
        (0..days)
            .filter_map(|offset| ending.checked_sub_days(Days::new(offset)))
            .map(|day| self.count_for_day(day))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn slot_arithmetic() {
        assert_eq!(slot_of(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), 0);
        assert_eq!(slot_of(NaiveTime::from_hms_opt(0, 30, 0).unwrap()), 1);
        assert_eq!(slot_of(NaiveTime::from_hms_opt(12, 15, 0).unwrap()), 24);
        assert_eq!(slot_of(NaiveTime::from_hms_opt(12, 45, 0).unwrap()), 25);
        assert_eq!(slot_of(NaiveTime::from_hms_opt(23, 45, 0).unwrap()), 47);
    }

    #[test]
    fn three_same_day_completions_count_together() {
        let mut stats = StatisticsStore::new();
        let d = day(2026, 8, 3);
        for _ in 0..3 {
            stats.record(TaskCategory::Work, at(d, 9, 10));
        }
        assert_eq!(stats.count_for_day(d), 3);
        assert_eq!(stats.category_breakdown_at(d)[&TaskCategory::Work], 3);
        assert_eq!(stats.half_hourly_at(d)[&18], 3);
    }

    #[test]
    fn summary_uses_trailing_windows() {
        let mut stats = StatisticsStore::new();
        let today = day(2026, 8, 7);
        stats.record(TaskCategory::Study, at(today, 8, 0));
        // 6 days back: inside the week window.
        stats.record(TaskCategory::Study, at(day(2026, 8, 1), 8, 0));
        // 7 days back: outside the week, inside the month.
        stats.record(TaskCategory::Study, at(day(2026, 7, 31), 8, 0));
        // 29 days back: last day inside the month window.
        stats.record(TaskCategory::Study, at(day(2026, 7, 9), 8, 0));
        // 30 days back: outside the month.
        stats.record(TaskCategory::Study, at(day(2026, 7, 8), 8, 0));

        let summary = stats.summary_at(today);
        assert_eq!(summary.today, 1);
        assert_eq!(summary.this_week, 2);
        assert_eq!(summary.this_month, 4);
        assert_eq!(summary.total, 5);
    }

    #[test]
    fn heatmap_window_is_ordered_and_dense() {
        let mut stats = StatisticsStore::new();
        let today = day(2026, 8, 7);
        stats.record(TaskCategory::Hobby, at(day(2026, 8, 5), 20, 40));
        let series = stats.heatmap_series_at(4, today);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0], (day(2026, 8, 4), 0));
        assert_eq!(series[1], (day(2026, 8, 5), 1));
        assert_eq!(series[3], (today, 0));
    }

    #[test]
    fn categories_are_bucketed_per_day() {
        let mut stats = StatisticsStore::new();
        let d1 = day(2026, 8, 6);
        let d2 = day(2026, 8, 7);
        stats.record(TaskCategory::Work, at(d1, 10, 0));
        stats.record(TaskCategory::Health, at(d1, 11, 0));
        stats.record(TaskCategory::Work, at(d2, 10, 0));

        let b1 = stats.category_breakdown_at(d1);
        assert_eq!(b1.len(), 2);
        assert_eq!(b1[&TaskCategory::Work], 1);
        assert_eq!(b1[&TaskCategory::Health], 1);
        assert_eq!(stats.category_breakdown_at(d2).len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut stats = StatisticsStore::new();
        stats.record(TaskCategory::Personal, at(day(2026, 8, 7), 14, 5));
        stats.reset();
        assert_eq!(stats.total(), 0);
        assert!(stats.half_hourly_at(day(2026, 8, 7)).is_empty());
    }
}
