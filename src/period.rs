use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use log::info;
use serde::Serialize;

use crate::datetime;
use crate::error::{Result, TrackerError};

/// 集計対象期間の指定。週の始まりは日曜日で固定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    Custom,
}

impl FromStr for Period {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "this_week" => Ok(Self::ThisWeek),
            "last_week" => Ok(Self::LastWeek),
            "this_month" => Ok(Self::ThisMonth),
            "last_month" => Ok(Self::LastMonth),
            "custom" => Ok(Self::Custom),
            _ => Err(TrackerError::InvalidPeriod(format!(
                "Unknown period '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this_week",
            Self::LastWeek => "last_week",
            Self::ThisMonth => "this_month",
            Self::LastMonth => "last_month",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// エポックミリ秒で表した期間。`start <= end`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

/// 現在時刻を基準に期間を解決する。
///
/// # Arguments
///
/// * `period` - 期間の指定
/// * `start` - `custom`の場合の開始日時(ISO-8601またはエポックミリ秒)
/// * `end` - `custom`の場合の終了日時(ISO-8601またはエポックミリ秒)
pub fn resolve(period: Period, start: Option<&str>, end: Option<&str>) -> Result<TimeRange> {
    let range = resolve_at(datetime::now(), period, start, end)?;
    info!(
        "Resolved {} to {} ~ {}",
        period, range.start, range.end
    );

    Ok(range)
}

/// 指定した時刻を基準に期間を解決する。
///
/// 日の区切りはローカルタイムゾーンの00:00:00とする。終わりが確定している期間は
/// 次の区切りの1ミリ秒前を終了とする。
pub fn resolve_at(
    now: DateTime<Local>,
    period: Period,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<TimeRange> {
    let today = now.date_naive();
    let now_ms = now.timestamp_millis();

    let range = match period {
        Period::Today => TimeRange {
            start: datetime::local_midnight_ms(today)?,
            end: now_ms,
        },
        Period::Yesterday => TimeRange {
            start: datetime::local_midnight_ms(today - Duration::days(1))?,
            end: datetime::local_midnight_ms(today)? - 1,
        },
        Period::ThisWeek => TimeRange {
            start: datetime::local_midnight_ms(week_start(today))?,
            end: now_ms,
        },
        Period::LastWeek => {
            let this_sunday = week_start(today);
            TimeRange {
                start: datetime::local_midnight_ms(this_sunday - Duration::days(7))?,
                end: datetime::local_midnight_ms(this_sunday)? - 1,
            }
        }
        Period::ThisMonth => TimeRange {
            start: datetime::local_midnight_ms(month_start(today))?,
            end: now_ms,
        },
        Period::LastMonth => {
            let first = month_start(today);
            TimeRange {
                start: datetime::local_midnight_ms(month_start(first - Duration::days(1)))?,
                end: datetime::local_midnight_ms(first)? - 1,
            }
        }
        Period::Custom => {
            let (start, end) = match (start, end) {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    return Err(TrackerError::InvalidPeriod(
                        "custom period requires both start and end".to_string(),
                    ))
                }
            };
            let range = TimeRange {
                start: parse_bound(start)?,
                end: parse_bound(end)?,
            };
            if range.start > range.end {
                return Err(TrackerError::InvalidPeriod(format!(
                    "start {} is after end {}",
                    start, end
                )));
            }
            range
        }
    };

    Ok(range)
}

/// ISO-8601またはエポックミリ秒の文字列をエポックミリ秒にする。
///
/// タイムゾーンを持たない日時はローカルタイムゾーンとして扱う。
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
    {
        return datetime::local_datetime(naive)
            .ok()
            .map(|dt| dt.timestamp_millis());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| datetime::local_midnight_ms(date).ok())
}

fn parse_bound(s: &str) -> Result<i64> {
    parse_timestamp(s)
        .ok_or_else(|| TrackerError::InvalidPeriod(format!("Failed to parse date: {}", s)))
}

/// 直近の日曜日(当日を含む)。
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}
