use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::period::TimeRange;

/// 時間を記録したユーザー。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// idと名前だけを持つ参照。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

/// list内のtask。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
}

/// 所属するlistとspaceを含むtaskの詳細。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: String,
    pub name: String,
    pub list: NamedRef,
    pub space: NamedRef,
}

/// 1回分の計測記録。`end`がない場合は計測中のタイマーを表す。
///
/// 時刻と経過時間はAPIの表現のままミリ秒の文字列で保持する。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub task: Option<NamedRef>,
    pub user: Option<User>,
    pub start: String,
    pub end: Option<String>,
    pub duration: String,
    pub description: String,
    pub billable: bool,
    pub tags: BTreeSet<String>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.end.is_none()
    }

    pub fn start_ms(&self) -> Result<i64> {
        parse_millis("start", &self.start)
    }

    pub fn end_ms(&self) -> Result<Option<i64>> {
        self.end
            .as_deref()
            .map(|end| parse_millis("end", end))
            .transpose()
    }

    pub fn duration_ms(&self) -> Result<i64> {
        parse_millis("duration", &self.duration)
    }
}

fn parse_millis(field: &str, value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|_| {
        TrackerError::upstream(format!(
            "Malformed time entry field {}: '{}'",
            field, value
        ))
    })
}

/// ユーザー単位の時間集計の中の、task単位の合計。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTime {
    pub id: String,
    pub name: String,
    pub time: i64,
}

/// ユーザー単位の時間集計。
///
/// `time`は`tasks`の合計と一致するとは限らない。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTimeRecord {
    pub user: User,
    pub time: i64,
    pub tasks: BTreeMap<String, TaskTime>,
}

/// 期間内のユーザー、task単位の時間集計。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeReport {
    pub data: Vec<UserTimeRecord>,
}

impl RawTimeReport {
    /// time entryをユーザー、taskごとに集計する。
    ///
    /// 計測中のentryと、taskやユーザーを持たないentryは集計対象外とする。
    /// ユーザーは最初に現れた順に並ぶ。
    pub fn from_entries(entries: &[TimeEntry]) -> Result<Self> {
        let mut report = Self::default();

        for entry in entries {
            let (Some(task), Some(user)) = (&entry.task, &entry.user) else {
                debug!("Skip time entry {} without task or user", entry.id);
                continue;
            };
            if entry.is_running() {
                continue;
            }
            let duration = entry.duration_ms()?;

            let index = match report.data.iter().position(|r| r.user.id == user.id) {
                Some(index) => index,
                None => {
                    report.data.push(UserTimeRecord {
                        user: user.clone(),
                        time: 0,
                        tasks: BTreeMap::new(),
                    });
                    report.data.len() - 1
                }
            };
            let record = &mut report.data[index];
            record.time += duration;
            record
                .tasks
                .entry(task.id.clone())
                .or_insert_with(|| TaskTime {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    time: 0,
                })
                .time += duration;
        }

        Ok(report)
    }

    /// 指定したtaskだけを残した集計を返す。
    ///
    /// ユーザーの`time`は残したtaskの合計になり、taskが残らないユーザーは除く。
    pub fn only_tasks(&self, task_ids: &[String]) -> Self {
        let data = self
            .data
            .iter()
            .filter_map(|record| {
                let tasks: BTreeMap<String, TaskTime> = record
                    .tasks
                    .iter()
                    .filter(|(id, _)| task_ids.contains(*id))
                    .map(|(id, task)| (id.clone(), task.clone()))
                    .collect();
                if tasks.is_empty() {
                    return None;
                }
                Some(UserTimeRecord {
                    user: record.user.clone(),
                    time: tasks.values().map(|task| task.time).sum(),
                    tasks,
                })
            })
            .collect();

        Self { data }
    }
}

/// time entryを取得する条件。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeEntryFilter {
    pub task_id: Option<String>,
    pub range: TimeRange,
}

/// タイマー開始のパラメータ。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StartTimerParams {
    pub task_id: String,
    pub description: Option<String>,
    pub billable: bool,
    pub tags: BTreeSet<String>,
}

/// time entry作成のパラメータ。`start`はエポックミリ秒、`duration`はミリ秒。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CreateTimeEntryParams {
    pub task_id: String,
    pub start: i64,
    pub duration: i64,
    pub description: Option<String>,
    pub billable: bool,
    pub tags: BTreeSet<String>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{entry, user};
    use super::{RawTimeReport, TimeEntry};
    use crate::error::TrackerError;

    #[test]
    fn test_from_entries_groups_by_user_and_task() {
        let entries = vec![
            entry("e1", ("t1", "A"), "u1", 0, 1_000),
            entry("e2", ("t2", "B"), "u2", 0, 500),
            entry("e3", ("t1", "A"), "u1", 5_000, 2_000),
            entry("e4", ("t1", "A"), "u2", 5_000, 250),
        ];

        let report = RawTimeReport::from_entries(&entries).unwrap();

        assert_eq!(report.data.len(), 2);
        assert_eq!(report.data[0].user, user("u1"));
        assert_eq!(report.data[0].time, 3_000);
        assert_eq!(report.data[0].tasks["t1"].time, 3_000);
        assert_eq!(report.data[1].time, 750);
        assert_eq!(report.data[1].tasks["t1"].time, 250);
        assert_eq!(report.data[1].tasks["t2"].time, 500);
    }

    /// 計測中とtaskなしのentryは集計しない。
    #[test]
    fn test_from_entries_skips_running_and_taskless() {
        let running = TimeEntry {
            end: None,
            duration: "-1720000000000".to_string(),
            ..entry("e1", ("t1", "A"), "u1", 0, 0)
        };
        let taskless = TimeEntry {
            task: None,
            ..entry("e2", ("t1", "A"), "u1", 0, 1_000)
        };

        let report = RawTimeReport::from_entries(&[running, taskless]).unwrap();

        assert!(report.data.is_empty());
    }

    #[test]
    fn test_from_entries_malformed_duration() {
        let broken = TimeEntry {
            duration: "abc".to_string(),
            ..entry("e1", ("t1", "A"), "u1", 0, 0)
        };

        let result = RawTimeReport::from_entries(&[broken]);

        assert!(matches!(result, Err(TrackerError::Upstream { .. })));
    }

    #[test]
    fn test_only_tasks() {
        let entries = vec![
            entry("e1", ("t1", "A"), "u1", 0, 1_000),
            entry("e2", ("t2", "B"), "u1", 0, 500),
            entry("e3", ("t3", "C"), "u1", 0, 200),
            entry("e4", ("t2", "B"), "u2", 0, 300),
        ];
        let report = RawTimeReport::from_entries(&entries).unwrap();

        let only = report.only_tasks(&["t1".to_string(), "t3".to_string()]);

        assert_eq!(only.data.len(), 1);
        assert_eq!(only.data[0].time, 1_200);
        assert_eq!(only.data[0].tasks.len(), 2);
    }
}
