use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{Result, TrackerError};

#[cfg(not(test))]
/// 現在のローカル時間を取得する。
pub fn now() -> DateTime<Local> {
    Local::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// ローカルの日時をタイムゾーン付きの日時に変換する。
///
/// DSTで存在しない時刻は、その後で最初に存在する時刻にずらす。
/// 重複する時刻は早い方を採用する。
pub fn local_datetime(naive: NaiveDateTime) -> Result<DateTime<Local>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt),
        LocalResult::None => (1..=4)
            .map(|hours| naive + chrono::Duration::minutes(30 * hours))
            .find_map(|shifted| Local.from_local_datetime(&shifted).earliest())
            .ok_or_else(|| TrackerError::InvalidPeriod(format!("No local time for {}", naive))),
    }
}

/// ローカル日付の00:00:00をエポックミリ秒で返す。
pub fn local_midnight_ms(date: NaiveDate) -> Result<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| TrackerError::InvalidPeriod(format!("No midnight for {}", date)))?;

    Ok(local_datetime(midnight)?.timestamp_millis())
}

/// エポックミリ秒をローカル日時に変換する。
pub fn from_millis(ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single()
}
