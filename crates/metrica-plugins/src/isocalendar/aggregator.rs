//! Windowed calendar fetch and daily statistics.

use crate::queries;
use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use metrica_core::calendar::{
    CalendarWindow, ContributionCalendar, ContributionWeek, StatisticsResult,
};
use metrica_core::ports::UpstreamApi;
use metrica_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Largest span the provider accepts in one calendar query.
pub const MAX_WINDOW_DAYS: i64 = 28;

/// Span used for every duration other than a full year.
pub const HALF_YEAR_DAYS: i64 = 180;

/// Requested calendar length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalendarDuration {
    FullYear,
    HalfYear,
}

impl CalendarDuration {
    /// Anything but `full-year` selects the shorter window.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("full-year") => CalendarDuration::FullYear,
            _ => CalendarDuration::HalfYear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarDuration::FullYear => "full-year",
            CalendarDuration::HalfYear => "half-year",
        }
    }
}

/// First instant of the calendar: the duration back from `now`, snapped to
/// the preceding Sunday at midnight UTC.
pub fn resolve_start(duration: CalendarDuration, now: DateTime<Utc>) -> DateTime<Utc> {
    let start = match duration {
        CalendarDuration::FullYear => now
            .checked_sub_months(Months::new(12))
            .unwrap_or(now - Duration::days(365)),
        CalendarDuration::HalfYear => now - Duration::days(HALF_YEAR_DAYS),
    };
    let offset = i64::from(start.weekday().num_days_from_sunday());
    (start.date_naive() - Duration::days(offset))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Split `[start, end)` into contiguous windows of at most `max_span`.
///
/// The last window is clipped to `end`. An empty range yields no window.
pub fn partition(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    max_span: Duration,
) -> Vec<CalendarWindow> {
    let mut windows = Vec::new();
    let mut from = start;
    while from < end {
        let to = (from + max_span).min(end);
        windows.push(CalendarWindow::new(from, to));
        from = to;
    }
    windows
}

/// Streaks, maximum and mean over a chronological sequence of daily counts.
pub fn statistics<I>(counts: I) -> StatisticsResult
where
    I: IntoIterator<Item = u32>,
{
    let mut result = StatisticsResult::default();
    let mut sum: u64 = 0;
    let mut days: u64 = 0;

    for count in counts {
        result.max_daily_count = result.max_daily_count.max(count);
        result.current_streak = if count > 0 {
            result.current_streak + 1
        } else {
            0
        };
        result.max_streak = result.max_streak.max(result.current_streak);
        sum += u64::from(count);
        days += 1;
    }

    result.average = format_average(sum, days);
    result
}

/// Mean with two decimals, trailing zeros and a bare point removed.
///
/// Ties round up, away from zero.
pub fn format_average(sum: u64, days: u64) -> String {
    if days == 0 {
        return "0".to_string();
    }
    let hundredths = (sum * 200 + days) / (2 * days);
    let formatted = format!("{}.{:02}", hundredths / 100, hundredths % 100);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Result of a calendar computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarReport {
    pub duration: CalendarDuration,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(flatten)]
    pub statistics: StatisticsResult,
    pub calendar: ContributionCalendar,
}

#[derive(Deserialize)]
struct CalendarData {
    user: Option<CalendarUser>,
}

#[derive(Deserialize)]
struct CalendarUser {
    calendar: CalendarCollection,
}

#[derive(Deserialize)]
struct CalendarCollection {
    #[serde(rename = "contributionCalendar")]
    contribution_calendar: ContributionCalendar,
}

/// Fetches a long calendar through provider-sized windows.
#[derive(Clone)]
pub struct WindowedAggregator {
    upstream: Arc<dyn UpstreamApi>,
    max_span: Duration,
}

impl WindowedAggregator {
    pub fn new(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self {
            upstream,
            max_span: Duration::days(MAX_WINDOW_DAYS),
        }
    }

    pub fn with_max_span(mut self, max_span: Duration) -> Self {
        self.max_span = max_span;
        self
    }

    /// Fetch the weeks of one window.
    pub async fn fetch_window(
        &self,
        login: &str,
        window: &CalendarWindow,
    ) -> Result<Vec<ContributionWeek>> {
        let Some((from, to)) = window.query_bounds() else {
            return Ok(Vec::new());
        };
        debug!(
            login = %login,
            from = %from.to_rfc3339(),
            to = %to.to_rfc3339(),
            "Loading calendar window"
        );

        let data = self
            .upstream
            .query(
                queries::CALENDAR,
                json!({
                    "login": login,
                    "from": from.to_rfc3339(),
                    "to": to.to_rfc3339(),
                }),
            )
            .await?;
        let data: CalendarData = serde_json::from_value(data)?;
        let user = data.user.ok_or(Error::NotFound)?;
        Ok(user.calendar.contribution_calendar.weeks)
    }

    /// Fetch `[start, end)` window by window, in chronological order.
    pub async fn calendar(
        &self,
        login: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ContributionCalendar> {
        let mut calendar = ContributionCalendar::default();
        for window in partition(start, end, self.max_span) {
            let weeks = self.fetch_window(login, &window).await?;
            calendar.weeks.extend(weeks);
        }
        Ok(calendar)
    }

    /// Compute the calendar and its statistics for `duration` ending at `now`.
    pub async fn compute(
        &self,
        login: &str,
        duration: CalendarDuration,
        now: DateTime<Utc>,
    ) -> Result<CalendarReport> {
        let start = resolve_start(duration, now);
        debug!(login = %login, start = %start, "Computing calendar statistics");
        let calendar = self.calendar(login, start, now).await?;
        let statistics = statistics(calendar.days().map(|d| d.count));

        Ok(CalendarReport {
            duration,
            start,
            end: now,
            statistics,
            calendar,
        })
    }
}
