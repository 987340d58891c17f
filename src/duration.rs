const MS_PER_DAY: i64 = 86_400_000;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_SECOND: i64 = 1_000;

/// ミリ秒を`1d 2h 3m`形式の文字列にする。
///
/// 秒以下は切り捨てる。上位の単位が0の場合は省略するが、分は常に表示する。
/// 集計結果(report, summary)の表示はこの形式を利用する。
pub fn format_duration(ms: i64) -> String {
    if ms <= 0 {
        return "0m".to_string();
    }

    let days = ms / MS_PER_DAY;
    let hours = (ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    parts.push(format!("{}m", minutes));

    parts.join(" ")
}

/// ミリ秒を`1h 2m 3s`形式の文字列にする。
///
/// タイマーやtime entry単体の表示に利用する。日の単位は使わない。
pub fn format_duration_hms(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (ms % MS_PER_MINUTE) / MS_PER_SECOND;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
