use log::info;

use crate::args::{RangeArgs, TaskArgs};
use crate::error::Result;
use crate::models::{TimeEntry, TimeEntryFilter};
use crate::repository::WorkspaceRepository;

/// `entries`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct EntriesArgs {
    #[clap(flatten)]
    range: RangeArgs,

    #[clap(flatten)]
    task: TaskArgs,
}

pub struct EntriesCommand<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> EntriesCommand<'a, T> {
    /// 新しい`EntriesCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// `entries`サブコマンドの処理を行う。
    ///
    /// 期間内のタイムエントリーを取得する。taskを1つ指定した場合はAPI側で絞り込み、
    /// listを指定した場合は取得後にそのlistのtaskだけを残す。
    pub async fn run(&self, args: EntriesArgs) -> Result<Vec<TimeEntry>> {
        let (_, range) = args.range.resolve()?;
        let selection = args.task.selection(self.repository).await?;

        let time_entries = self
            .repository
            .fetch_time_entries(&TimeEntryFilter {
                task_id: selection.task_id().map(String::from),
                range,
            })
            .await?;
        info!("Time entries retrieved successfully.");

        Ok(selection.filter_entries(time_entries))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use rstest::rstest;

    use super::{EntriesArgs, EntriesCommand};
    use crate::args::{RangeArgs, TaskArgs};
    use crate::datetime::mock_datetime;
    use crate::models::fixtures::entry;
    use crate::repository::MockWorkspaceRepository;

    fn args(period: &str, task_id: Option<&str>) -> EntriesArgs {
        EntriesArgs {
            range: RangeArgs {
                period: period.to_string(),
                start: None,
                end: None,
            },
            task: TaskArgs {
                task_id: task_id.map(String::from),
                ..TaskArgs::default()
            },
        }
    }

    #[tokio::test]
    async fn test_entries_command_no_task() {
        let mut repository = MockWorkspaceRepository::new();
        repository
            .expect_fetch_time_entries()
            .withf(|filter| filter.task_id.is_none())
            .times(1)
            .returning(|_| Ok(vec![entry("e1", ("t1", "A"), "u1", 0, 60_000)]));

        let result = EntriesCommand::new(&repository).run(args("today", None)).await;

        assert_eq!(result.unwrap().len(), 1);
    }

    /// 前日の00:00:00から当日の00:00:00の1ミリ秒前までを取得する。
    #[rstest]
    #[case(Local.with_ymd_and_hms(2024, 7, 17, 15, 30, 0).unwrap())]
    #[case(Local.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())]
    #[tokio::test]
    async fn test_entries_command_yesterday(#[case] now: chrono::DateTime<Local>) {
        mock_datetime::set_mock_time(now);
        let today_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap();
        let expected_end = Local
            .from_local_datetime(&today_start)
            .unwrap()
            .timestamp_millis()
            - 1;
        let mut repository = MockWorkspaceRepository::new();
        repository
            .expect_fetch_time_entries()
            .withf(move |filter| {
                filter.task_id.as_deref() == Some("t1") && filter.range.end == expected_end
            })
            .times(1)
            .returning(|_| Ok(vec![]));

        let result = EntriesCommand::new(&repository)
            .run(args("yesterday", Some("t1")))
            .await;
        mock_datetime::clear_mock_time();

        assert!(result.unwrap().is_empty());
    }
}
