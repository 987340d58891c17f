use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::models::{
    CreateTimeEntryParams, RawTimeReport, StartTimerParams, Task, TaskDetail, TimeEntry,
    TimeEntryFilter,
};
use crate::period::TimeRange;

/// workspaceのデータと時間計測を扱うリポジトリ。
///
/// 呼び出しごとにAPIから取得し、結果はキャッシュしない。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// space, folder, listからなる階層を取得する。
    async fn fetch_workspace_hierarchy(&self) -> Result<Hierarchy>;

    /// list内のtaskを取得する。
    async fn fetch_tasks_in_list(&self, list_id: &str) -> Result<Vec<Task>>;

    /// taskの詳細を取得する。
    async fn fetch_task_detail(&self, task_id: &str) -> Result<TaskDetail>;

    /// 期間内のユーザー、task単位の集計を取得する。
    async fn fetch_time_report(&self, range: &TimeRange) -> Result<RawTimeReport>;

    /// 条件に一致するtime entryを取得する。
    async fn fetch_time_entries(&self, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>>;

    /// 計測中のタイマーを取得する。
    async fn fetch_current_timer(&self) -> Result<Option<TimeEntry>>;

    async fn start_timer(&self, params: &StartTimerParams) -> Result<TimeEntry>;

    async fn stop_timer(&self) -> Result<TimeEntry>;

    async fn add_time_entry(&self, params: &CreateTimeEntryParams) -> Result<TimeEntry>;

    /// time entryを削除する。削除できた場合は`true`を返す。
    async fn delete_time_entry(&self, entry_id: &str) -> Result<bool>;
}
