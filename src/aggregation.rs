use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use futures::future::try_join_all;
use log::{debug, info};
use serde::Serialize;

use crate::datetime;
use crate::error::{Result, TrackerError};
use crate::models::{NamedRef, RawTimeReport, TaskDetail, TimeEntryFilter};
use crate::period::TimeRange;
use crate::repository::WorkspaceRepository;

/// 集計の単位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Task,
    List,
    Space,
    Day,
}

impl FromStr for GroupBy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "task" => Ok(Self::Task),
            "list" => Ok(Self::List),
            "space" => Ok(Self::Space),
            "day" => Ok(Self::Day),
            _ => Err(TrackerError::InvalidArgument(format!(
                "Unknown group '{}', expected task, list, space or day",
                s
            ))),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Task => "task",
            Self::List => "list",
            Self::Space => "space",
            Self::Day => "day",
        };
        f.write_str(name)
    }
}

/// グループ内のtaskの時間と割合。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskShare {
    pub id: String,
    pub name: String,
    pub time: i64,
    pub percentage: i64,
}

/// グループ単位の集計結果。`time`は`tasks`の`time`の合計と一致する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group_key: String,
    pub group_name: String,
    pub time: i64,
    pub percentage: i64,
    pub tasks: Vec<TaskShare>,
}

/// `part`が`whole`に占める割合を0-100の整数で返す。
///
/// 小数点以下は四捨五入する。`whole`が0以下の場合は0。
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    (200 * part + whole) / (2 * whole)
}

/// 時間集計をtask, list, space, 日単位にまとめる。
pub struct TimeAggregationEngine<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> TimeAggregationEngine<'a, T> {
    /// 新しい`TimeAggregationEngine`を返す。
    ///
    /// # Arguments
    /// * `repository` - task詳細やtime entryを取得するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// 時間集計をグループ化し、時間の長い順に並べて返す。
    ///
    /// list, spaceの場合はtaskごとに詳細を、dayの場合はtaskごとに期間内のtime entryを取得する。
    /// ユーザー単位の`time`は利用せず、task単位の時間を合計する。
    ///
    /// # Arguments
    ///
    /// * `report` - ユーザー、task単位の時間集計
    /// * `group_by` - 集計の単位
    /// * `range` - 集計対象の期間。dayの場合にtime entryの取得に利用する
    pub async fn aggregate(
        &self,
        report: &RawTimeReport,
        group_by: GroupBy,
        range: &TimeRange,
    ) -> Result<Vec<GroupSummary>> {
        let mut groups = GroupAccumulator::default();

        match group_by {
            GroupBy::Task => {
                for task in report.data.iter().flat_map(|record| record.tasks.values()) {
                    groups.add(&task.id, &task.name, &task.id, &task.name, task.time);
                }
            }
            GroupBy::List | GroupBy::Space => {
                let details = self.fetch_details(report).await?;
                for task in report.data.iter().flat_map(|record| record.tasks.values()) {
                    let detail = details.get(task.id.as_str()).ok_or_else(|| {
                        TrackerError::upstream(format!("Missing detail for task {}", task.id))
                    })?;
                    let owner: &NamedRef = match group_by {
                        GroupBy::List => &detail.list,
                        _ => &detail.space,
                    };
                    groups.add(&owner.id, &owner.name, &task.id, &task.name, task.time);
                }
            }
            GroupBy::Day => {
                let tasks = distinct_tasks(report);
                let filters: Vec<TimeEntryFilter> = tasks
                    .iter()
                    .map(|task| TimeEntryFilter {
                        task_id: Some(task.id.clone()),
                        range: *range,
                    })
                    .collect();
                let entries = try_join_all(
                    filters
                        .iter()
                        .map(|filter| self.repository.fetch_time_entries(filter)),
                )
                .await?;

                for (task, entries) in tasks.iter().zip(entries) {
                    for entry in entries.iter().filter(|entry| !entry.is_running()) {
                        let start = entry.start_ms()?;
                        let local = datetime::from_millis(start).ok_or_else(|| {
                            TrackerError::upstream(format!("Invalid start time {}", start))
                        })?;
                        let key = format!("{}-{}-{}", local.year(), local.month(), local.day());
                        let name = local.format("%Y-%m-%d").to_string();
                        groups.add(&key, &name, &task.id, &task.name, entry.duration_ms()?);
                    }
                }
            }
        }

        let summaries = groups.finish();
        info!("Aggregated {} groups by {}", summaries.len(), group_by);

        Ok(summaries)
    }

    /// 時間集計に含まれるtaskの詳細をtaskごとに1回ずつ取得する。
    async fn fetch_details(&self, report: &RawTimeReport) -> Result<HashMap<String, TaskDetail>> {
        let ids: Vec<String> = distinct_tasks(report)
            .into_iter()
            .map(|task| task.id)
            .collect();
        debug!("Fetching details for {} tasks", ids.len());

        let details = try_join_all(ids.iter().map(|id| self.repository.fetch_task_detail(id))).await?;

        Ok(ids.into_iter().zip(details).collect())
    }
}

/// 時間集計に現れるtaskを最初に現れた順に重複なく返す。
fn distinct_tasks(report: &RawTimeReport) -> Vec<NamedRef> {
    let mut tasks: Vec<NamedRef> = Vec::new();
    for task in report.data.iter().flat_map(|record| record.tasks.values()) {
        if !tasks.iter().any(|t| t.id == task.id) {
            tasks.push(NamedRef {
                id: task.id.clone(),
                name: task.name.clone(),
            });
        }
    }
    tasks
}

struct Group {
    key: String,
    name: String,
    time: i64,
    tasks: Vec<(String, String, i64)>,
}

/// グループとグループ内のtaskの時間を、最初に現れた順を保って積み上げる。
#[derive(Default)]
struct GroupAccumulator {
    groups: Vec<Group>,
    index: HashMap<String, usize>,
}

impl GroupAccumulator {
    fn add(&mut self, key: &str, name: &str, task_id: &str, task_name: &str, time: i64) {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.groups.push(Group {
                    key: key.to_string(),
                    name: name.to_string(),
                    time: 0,
                    tasks: Vec::new(),
                });
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[position];
        group.time += time;
        match group.tasks.iter_mut().find(|(id, _, _)| id == task_id) {
            Some((_, _, task_time)) => *task_time += time,
            None => group
                .tasks
                .push((task_id.to_string(), task_name.to_string(), time)),
        }
    }

    fn finish(self) -> Vec<GroupSummary> {
        let total: i64 = self.groups.iter().map(|group| group.time).sum();

        let mut summaries: Vec<GroupSummary> = self
            .groups
            .into_iter()
            .map(|group| {
                let mut tasks: Vec<TaskShare> = group
                    .tasks
                    .into_iter()
                    .map(|(id, name, time)| TaskShare {
                        id,
                        name,
                        time,
                        percentage: percentage(time, group.time),
                    })
                    .collect();
                tasks.sort_by(|a, b| b.time.cmp(&a.time));

                GroupSummary {
                    group_key: group.key,
                    group_name: group.name,
                    time: group.time,
                    percentage: percentage(group.time, total),
                    tasks,
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.time.cmp(&a.time));

        summaries
    }
}
