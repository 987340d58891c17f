use log::info;
use serde::Serialize;

use crate::aggregation::{percentage, TaskShare};
use crate::args::{RangeArgs, TaskArgs};
use crate::duration::format_duration;
use crate::error::Result;
use crate::models::{RawTimeReport, User};
use crate::period::{Period, TimeRange};
use crate::repository::WorkspaceRepository;

/// `report`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(flatten)]
    range: RangeArgs,

    #[clap(flatten)]
    task: TaskArgs,
}

/// ユーザーごとの合計とtaskの内訳。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTotal {
    pub user: User,
    pub time: i64,
    pub duration: String,
    pub tasks: Vec<TaskShare>,
}

/// 期間内のユーザーごとの時間。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeReport {
    pub period: Period,
    pub range: TimeRange,
    pub total_time: i64,
    pub total_duration: String,
    pub users: Vec<UserTotal>,
}

pub struct ReportCommand<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// `report`サブコマンドの処理を行う。
    ///
    /// 期間内の時間をユーザーごとに集計する。taskやlistを指定した場合はそのtaskだけを対象にする。
    pub async fn run(&self, args: ReportArgs) -> Result<TimeReport> {
        let (period, range) = args.range.resolve()?;
        let selection = args.task.selection(self.repository).await?;
        let report = selection.filter_report(self.repository.fetch_time_report(&range).await?);
        info!("Time report retrieved for {} users.", report.data.len());

        Ok(build_report(period, range, &report))
    }
}

/// ユーザーの合計はtaskの時間の合計とし、APIが返すユーザー単位の合計は使わない。
fn build_report(period: Period, range: TimeRange, report: &RawTimeReport) -> TimeReport {
    let mut users: Vec<UserTotal> = report
        .data
        .iter()
        .map(|record| {
            let time: i64 = record.tasks.values().map(|task| task.time).sum();
            let mut tasks: Vec<TaskShare> = record
                .tasks
                .values()
                .map(|task| TaskShare {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    time: task.time,
                    percentage: percentage(task.time, time),
                })
                .collect();
            tasks.sort_by(|a, b| b.time.cmp(&a.time));

            UserTotal {
                user: record.user.clone(),
                time,
                duration: format_duration(time),
                tasks,
            }
        })
        .collect();
    users.sort_by(|a, b| b.time.cmp(&a.time));

    let total_time = users.iter().map(|user| user.time).sum();
    TimeReport {
        period,
        range,
        total_time,
        total_duration: format_duration(total_time),
        users,
    }
}
