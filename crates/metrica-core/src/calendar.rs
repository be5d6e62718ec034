//! Contribution calendar types.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One day of activity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    #[serde(rename = "contributionCount")]
    pub count: u32,
    /// Color suggested by the provider for this day's intensity.
    #[serde(rename = "color", default)]
    pub color_hint: String,
}

/// A calendar week as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionWeek {
    #[serde(rename = "contributionDays")]
    pub days: Vec<ContributionDay>,
}

/// Concatenated weeks covering a requested span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub weeks: Vec<ContributionWeek>,
}

impl ContributionCalendar {
    pub fn days(&self) -> impl Iterator<Item = &ContributionDay> {
        self.weeks.iter().flat_map(|w| w.days.iter())
    }

    /// Highest single-day count across the whole calendar.
    pub fn reference(&self) -> u32 {
        self.days().map(|d| d.count).max().unwrap_or(0)
    }
}

impl ContributionDay {
    /// Intensity of this day relative to `reference`, usually
    /// [`ContributionCalendar::reference`] computed once per calendar.
    pub fn ratio(&self, reference: u32) -> f64 {
        if reference == 0 {
            0.0
        } else {
            f64::from(self.count) / f64::from(reference)
        }
    }
}

/// Half-open `[from, to)` range fetched in a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl CalendarWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Inclusive bounds sent to the provider.
    ///
    /// The upper bound is the last millisecond of the day before `to`, so
    /// consecutive windows never report the same day twice. Returns `None`
    /// when the window does not contain a whole day.
    pub fn query_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = self.to.date_naive().and_time(NaiveTime::MIN).and_utc();
        let last = midnight - Duration::milliseconds(1);
        (last >= self.from).then_some((self.from, last))
    }

    pub fn span(&self) -> Duration {
        self.to - self.from
    }
}

/// Statistics derived from a day sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    pub current_streak: u32,
    pub max_streak: u32,
    pub max_daily_count: u32,
    /// Mean daily count, two decimals at most, trailing zeros trimmed.
    pub average: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_bounds_end_on_previous_day() {
        let from = Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 4, 0, 0, 0).unwrap();
        let (start, end) = CalendarWindow::new(from, to).query_bounds().unwrap();
        assert_eq!(start, from);
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
    }

    #[test]
    fn test_query_bounds_skip_partial_day() {
        let from = Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 7, 15, 30, 0).unwrap();
        assert!(CalendarWindow::new(from, to).query_bounds().is_none());
    }

    #[test]
    fn test_day_deserializes_provider_shape() {
        let day: ContributionDay = serde_json::from_str(
            r##"{"date":"2024-01-07","contributionCount":4,"color":"#40c463"}"##,
        )
        .unwrap();
        assert_eq!(day.count, 4);
        assert_eq!(day.color_hint, "#40c463");
    }

    #[test]
    fn test_ratio_against_reference() {
        let day = |count| ContributionDay {
            date: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            count,
            color_hint: String::new(),
        };
        let calendar = ContributionCalendar {
            weeks: vec![ContributionWeek {
                days: vec![day(2), day(4), day(0)],
            }],
        };
        let reference = calendar.reference();
        assert_eq!(reference, 4);
        assert!((day(2).ratio(reference) - 0.5).abs() < f64::EPSILON);
        let ratios: Vec<f64> = calendar.days().map(|d| d.ratio(reference)).collect();
        assert_eq!(ratios, vec![0.5, 1.0, 0.0]);
        assert_eq!(day(3).ratio(ContributionCalendar::default().reference()), 0.0);
    }
}
