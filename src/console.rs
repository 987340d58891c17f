use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::datetime;
use crate::duration::{format_duration, format_duration_hms};
use crate::models::TimeEntry;
use crate::period::{Period, TimeRange};
use crate::report_command::TimeReport;
use crate::summary_command::Summary;
use crate::timer_command::{StartOutcome, StopOutcome};

/// Consoleに結果を表示するためのtrait。
pub trait ConsolePresenter {
    /// タイムエントリーを表示する。
    ///
    /// # Arguments
    ///
    /// * `time_entries` - 表示するタイムエントリー
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()>;

    /// ユーザーごとの時間を表示する。
    fn show_report(&mut self, report: &TimeReport) -> Result<()>;

    /// グループごとの時間を表示する。
    fn show_summary(&mut self, summary: &Summary) -> Result<()>;

    fn show_start(&mut self, outcome: &StartOutcome) -> Result<()>;

    fn show_stop(&mut self, outcome: &StopOutcome) -> Result<()>;

    /// 1行のメッセージを表示する。
    fn show_message(&mut self, message: &str) -> Result<()>;
}

/// 結果をMarkdown形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    fn write_header(&mut self, title: &str, period: Period, range: &TimeRange, total: &str) -> Result<()> {
        writeln!(
            self.writer,
            "# {} ({})\n\n{} ~ {}\nTotal: {}",
            title,
            period,
            format_millis(range.start, "%Y-%m-%d %H:%M"),
            format_millis(range.end, "%Y-%m-%d %H:%M"),
            total
        )
        .context("Failed to write header")
    }
}

/// エポックミリ秒をローカル時間で整形する。
fn format_millis(ms: i64, format: &str) -> String {
    datetime::from_millis(ms)
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// time entryの内容を`task: description`の形式にする。
fn entry_label(entry: &TimeEntry) -> String {
    let task = entry
        .task
        .as_ref()
        .map(|task| task.name.as_str())
        .unwrap_or("(no task)");
    if entry.description.is_empty() {
        task.to_string()
    } else {
        format!("{}: {}", task, entry.description)
    }
}

/// 計測中のtime entryは開始から現在までの時間を返す。
fn elapsed_ms(entry: &TimeEntry) -> i64 {
    match (entry.start_ms(), entry.is_running()) {
        (Ok(start), true) => datetime::now().timestamp_millis() - start,
        _ => entry.duration_ms().unwrap_or_default(),
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // time entryを日ごとにlist形式で表示する。
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()> {
        let mut sorted_entries = time_entries.to_vec();
        sorted_entries.sort_by_key(|entry| entry.start_ms().unwrap_or_default());

        let mut current_date: Option<NaiveDate> = None;
        for entry in sorted_entries {
            let start = entry
                .start_ms()
                .ok()
                .and_then(datetime::from_millis)
                .with_context(|| format!("Invalid start of time entry: {:?}", entry))?;
            if current_date != Some(start.date_naive()) {
                current_date = Some(start.date_naive());
                writeln!(self.writer, "## {}", start.format("%Y-%m-%d"))
                    .context("Failed to write date")?;
            }

            let end_str = entry
                .end_ms()
                .ok()
                .flatten()
                .map(|end| format_millis(end, "%H:%M"))
                .unwrap_or_else(|| "now".to_string());
            writeln!(
                self.writer,
                "- {} ~ {}: {} ({})",
                start.format("%H:%M"),
                end_str,
                entry_label(&entry),
                format_duration_hms(elapsed_ms(&entry))
            )
            .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
        }

        Ok(())
    }

    fn show_report(&mut self, report: &TimeReport) -> Result<()> {
        self.write_header("Time report", report.period, &report.range, &report.total_duration)?;

        for user in &report.users {
            writeln!(self.writer, "\n## {}: {}", user.user.username, user.duration)
                .context("Failed to write user")?;
            for task in &user.tasks {
                writeln!(
                    self.writer,
                    "- {}: {} ({}%)",
                    task.name,
                    format_duration(task.time),
                    task.percentage
                )
                .with_context(|| format!("Failed to write task: {}", task.id))?;
            }
        }

        Ok(())
    }

    fn show_summary(&mut self, summary: &Summary) -> Result<()> {
        let title = format!("Summary by {}", summary.group_by);
        self.write_header(&title, summary.period, &summary.range, &summary.total_duration)?;

        for group in &summary.groups {
            writeln!(
                self.writer,
                "\n## {}: {} ({}%)",
                group.group_name,
                format_duration(group.time),
                group.percentage
            )
            .with_context(|| format!("Failed to write group: {}", group.group_key))?;
            for task in &group.tasks {
                writeln!(
                    self.writer,
                    "- {}: {} ({}%)",
                    task.name,
                    format_duration(task.time),
                    task.percentage
                )
                .with_context(|| format!("Failed to write task: {}", task.id))?;
            }
        }

        Ok(())
    }

    fn show_start(&mut self, outcome: &StartOutcome) -> Result<()> {
        let line = match outcome {
            StartOutcome::Started { entry } => {
                format!("Timer started: {} (entry {})", entry_label(entry), entry.id)
            }
            StartOutcome::AlreadyRunning { current } => format!(
                "Timer already running: {} for {}. Stop it before starting another.",
                entry_label(current),
                format_duration_hms(elapsed_ms(current))
            ),
        };
        self.show_message(&line)
    }

    fn show_stop(&mut self, outcome: &StopOutcome) -> Result<()> {
        let line = match outcome {
            StopOutcome::Stopped { entry } => format!(
                "Timer stopped: {} ({})",
                entry_label(entry),
                format_duration_hms(elapsed_ms(entry))
            ),
            StopOutcome::NotRunning => "No timer is running.".to_string(),
        };
        self.show_message(&line)
    }

    fn show_message(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer, "{}", message).context("Failed to write message")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use rstest::rstest;

    use super::ConsoleMarkdownList;
    use super::ConsolePresenter;
    use crate::aggregation::{GroupBy, GroupSummary, TaskShare};
    use crate::models::fixtures::entry;
    use crate::models::TimeEntry;
    use crate::period::{Period, TimeRange};
    use crate::summary_command::Summary;
    use crate::timer_command::{StartOutcome, StopOutcome};

    fn at(h: u32, m: u32) -> i64 {
        Local
            .with_ymd_and_hms(2024, 7, 17, h, m, 0)
            .unwrap()
            .timestamp_millis()
    }

    /// テスト用にダミーのTimeEntryを作成する。
    fn dummy_entry(pattern: u8) -> TimeEntry {
        match pattern {
            1 => entry("e1", ("t1", "entry1"), "u1", at(1, 0), 3_600_000),
            2 => entry("e2", ("t2", "entry2"), "u1", at(3, 0), 3_600_000),
            3 => entry("e3", ("t3", "entry3"), "u1", at(3, 0), 7_200_000),
            4 => TimeEntry {
                end: None,
                ..entry("e4", ("t3", "entry3"), "u1", at(5, 0), 0)
            },
            _ => panic!("Invalid pattern: {}", pattern),
        }
    }

    /// 正常系のテスト。
    #[rstest]
    #[case::no_entry(&[], "")]
    #[case::single(&[dummy_entry(1)], "## 2024-07-17\n- 01:00 ~ 02:00: entry1 (1h 0m 0s)\n")]
    #[case::sort_with_start_time(
        &[dummy_entry(2), dummy_entry(1)],
        "## 2024-07-17\n- 01:00 ~ 02:00: entry1 (1h 0m 0s)\n- 03:00 ~ 04:00: entry2 (1h 0m 0s)\n",
    )]
    #[case::no_sort_with_same_start_time(
        &[dummy_entry(3), dummy_entry(2)],
        "## 2024-07-17\n- 03:00 ~ 05:00: entry3 (2h 0m 0s)\n- 03:00 ~ 04:00: entry2 (1h 0m 0s)\n",
    )]
    fn test_show_time_entries(#[case] input: &[TimeEntry], #[case] expected: &str) {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_time_entries(input).unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    /// 計測中のエントリーは終了を`now`と表示する。
    #[test]
    fn test_show_time_entries_running() {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_time_entries(&[dummy_entry(4)]).unwrap();

        let output = String::from_utf8(writer).unwrap();
        assert!(output.contains("- 05:00 ~ now: entry3"));
    }

    #[test]
    fn test_show_summary() {
        let summary = Summary {
            period: Period::Today,
            range: TimeRange {
                start: at(0, 0),
                end: at(15, 30),
            },
            group_by: GroupBy::Task,
            total_time: 5_400_000,
            total_duration: "1h 30m".to_string(),
            groups: vec![GroupSummary {
                group_key: "t1".to_string(),
                group_name: "Fix Bug".to_string(),
                time: 5_400_000,
                percentage: 100,
                tasks: vec![TaskShare {
                    id: "t1".to_string(),
                    name: "Fix Bug".to_string(),
                    time: 5_400_000,
                    percentage: 100,
                }],
            }],
        };
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_summary(&summary).unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            "# Summary by task (today)\n\n2024-07-17 00:00 ~ 2024-07-17 15:30\nTotal: 1h 30m\n\n## Fix Bug: 1h 30m (100%)\n- Fix Bug: 1h 30m (100%)\n"
        );
    }

    #[test]
    fn test_show_start_already_running() {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter
            .show_start(&StartOutcome::AlreadyRunning {
                current: dummy_entry(4),
            })
            .unwrap();

        assert!(String::from_utf8(writer)
            .unwrap()
            .starts_with("Timer already running: entry3 for "));
    }

    #[test]
    fn test_show_stop_not_running() {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_stop(&StopOutcome::NotRunning).unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), "No timer is running.\n");
    }
}
