use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::console::ConsolePresenter;
use crate::error::TrackerError;
use crate::models::TimeEntry;
use crate::report_command::TimeReport;
use crate::summary_command::Summary;
use crate::timer_command::{StartOutcome, StopOutcome};

/// サブコマンドの結果。
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Report(TimeReport),
    Summary(Summary),
    Entries(Vec<TimeEntry>),
    Start(StartOutcome),
    Stop(StopOutcome),
    Added(TimeEntry),
    Deleted { id: String, deleted: bool },
}

/// JSON出力の共通形式。エラーの場合は`kind`を持ち、`data`を持たない。
///
/// タイマーが計測中で開始できなかった場合などはエラーにせず、`data`の`outcome`で区別する。
#[derive(Debug, Serialize)]
pub struct Response<'a> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Output>,
}

impl<'a> Response<'a> {
    pub fn success(output: &'a Output) -> Self {
        Self {
            status: "success",
            kind: None,
            message: output.message(),
            data: Some(output),
        }
    }

    pub fn error(err: &TrackerError) -> Self {
        Self {
            status: "error",
            kind: Some(err.kind()),
            message: err.to_string(),
            data: None,
        }
    }

    pub fn write_json<W: Write>(&self, writer: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self).context("Failed to serialize response")?;
        writeln!(writer).context("Failed to write response")
    }
}

impl Output {
    pub fn message(&self) -> String {
        match self {
            Self::Report(report) => format!(
                "Tracked {} across {} users",
                report.total_duration,
                report.users.len()
            ),
            Self::Summary(summary) => format!(
                "Tracked {} in {} groups by {}",
                summary.total_duration,
                summary.groups.len(),
                summary.group_by
            ),
            Self::Entries(entries) => format!("{} time entries", entries.len()),
            Self::Start(StartOutcome::Started { entry }) => {
                format!("Timer started (entry {})", entry.id)
            }
            Self::Start(StartOutcome::AlreadyRunning { current }) => format!(
                "Timer {} is already running, stop it before starting another",
                current.id
            ),
            Self::Stop(StopOutcome::Stopped { entry }) => {
                format!("Timer stopped (entry {})", entry.id)
            }
            Self::Stop(StopOutcome::NotRunning) => "No timer is running".to_string(),
            Self::Added(entry) => format!("Time entry {} added", entry.id),
            Self::Deleted { id, deleted: true } => format!("Time entry {} deleted", id),
            Self::Deleted { id, deleted: false } => format!("Time entry {} was not deleted", id),
        }
    }

    /// 人が読む形式で表示する。
    pub fn present<P: ConsolePresenter>(&self, presenter: &mut P) -> Result<()> {
        match self {
            Self::Report(report) => presenter.show_report(report),
            Self::Summary(summary) => presenter.show_summary(summary),
            Self::Entries(entries) => presenter.show_time_entries(entries),
            Self::Start(outcome) => presenter.show_start(outcome),
            Self::Stop(outcome) => presenter.show_stop(outcome),
            Self::Added(entry) => {
                presenter.show_message(&self.message())?;
                presenter.show_time_entries(std::slice::from_ref(entry))
            }
            Self::Deleted { .. } => presenter.show_message(&self.message()),
        }
    }
}
