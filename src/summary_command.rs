use log::info;
use serde::Serialize;

use crate::aggregation::{GroupBy, GroupSummary, TimeAggregationEngine};
use crate::args::{RangeArgs, TaskArgs};
use crate::duration::format_duration;
use crate::error::Result;
use crate::period::{Period, TimeRange};
use crate::repository::WorkspaceRepository;

/// `summary`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct SummaryArgs {
    #[clap(flatten)]
    range: RangeArgs,

    #[clap(flatten)]
    task: TaskArgs,

    #[clap(
        short = 'g',
        long = "group-by",
        default_value = "task",
        help = "task, list, space or day"
    )]
    group_by: String,
}

/// グループごとの集計結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub period: Period,
    pub range: TimeRange,
    pub group_by: GroupBy,
    pub total_time: i64,
    pub total_duration: String,
    pub groups: Vec<GroupSummary>,
}

pub struct SummaryCommand<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> SummaryCommand<'a, T> {
    /// 新しい`SummaryCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// `summary`サブコマンドの処理を行う。
    ///
    /// 期間内の時間をtask, list, space, 日のいずれかでまとめ、割合をつけて返す。
    pub async fn run(&self, args: SummaryArgs) -> Result<Summary> {
        let group_by: GroupBy = args.group_by.parse()?;
        let (period, range) = args.range.resolve()?;
        let selection = args.task.selection(self.repository).await?;

        let report = selection.filter_report(self.repository.fetch_time_report(&range).await?);
        info!("Time report retrieved for {} users.", report.data.len());

        let groups = TimeAggregationEngine::new(self.repository)
            .aggregate(&report, group_by, &range)
            .await?;
        let total_time = groups.iter().map(|group| group.time).sum();

        Ok(Summary {
            period,
            range,
            group_by,
            total_time,
            total_duration: format_duration(total_time),
            groups,
        })
    }
}
