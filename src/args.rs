use log::info;

use crate::error::{Result, TrackerError};
use crate::models::{RawTimeReport, TimeEntry};
use crate::period::{self, Period, TimeRange};
use crate::repository::WorkspaceRepository;
use crate::resolver::NameResolver;

/// 期間を指定する引数。
#[derive(Debug, Clone, clap::Args)]
pub struct RangeArgs {
    #[clap(
        short = 'p',
        long = "period",
        default_value = "today",
        help = "today, yesterday, this_week, last_week, this_month, last_month or custom"
    )]
    pub period: String,

    #[clap(long = "start", help = "Start of a custom period (ISO-8601 or epoch milliseconds)")]
    pub start: Option<String>,

    #[clap(long = "end", help = "End of a custom period (ISO-8601 or epoch milliseconds)")]
    pub end: Option<String>,
}

impl RangeArgs {
    pub fn period(&self) -> Result<Period> {
        self.period.parse()
    }

    /// 期間をエポックミリ秒に解決する。
    pub fn resolve(&self) -> Result<(Period, TimeRange)> {
        let period = self.period()?;
        let range = period::resolve(period, self.start.as_deref(), self.end.as_deref())?;
        Ok((period, range))
    }
}

/// taskをidか名前で指定する引数。
#[derive(Debug, Clone, Default, clap::Args)]
pub struct TaskArgs {
    #[clap(long = "task-id", help = "Task id")]
    pub task_id: Option<String>,

    #[clap(long = "task-name", help = "Task name (case-insensitive)")]
    pub task_name: Option<String>,

    #[clap(long = "list-name", help = "List name to search the task in, or to filter by")]
    pub list_name: Option<String>,
}

/// 集計や一覧の対象。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Task(String),
    List { id: String, task_ids: Vec<String> },
}

impl Selection {
    /// 時間集計を対象のtaskに絞り込む。
    pub fn filter_report(&self, report: RawTimeReport) -> RawTimeReport {
        match self {
            Self::All => report,
            Self::Task(id) => report.only_tasks(std::slice::from_ref(id)),
            Self::List { task_ids, .. } => report.only_tasks(task_ids),
        }
    }

    /// time entryを対象のtaskに絞り込む。
    pub fn filter_entries(&self, entries: Vec<TimeEntry>) -> Vec<TimeEntry> {
        match self {
            Self::All => entries,
            Self::Task(id) => retain_tasks(entries, std::slice::from_ref(id)),
            Self::List { task_ids, .. } => retain_tasks(entries, task_ids),
        }
    }

    /// APIの取得条件に渡せるtask id。
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Task(id) => Some(id),
            _ => None,
        }
    }
}

fn retain_tasks(entries: Vec<TimeEntry>, task_ids: &[String]) -> Vec<TimeEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            entry
                .task
                .as_ref()
                .map_or(false, |task| task_ids.contains(&task.id))
        })
        .collect()
}

impl TaskArgs {
    /// 引数から対象を決める。
    ///
    /// task idを優先し、task名があればlist名で絞り込んで解決する。
    /// list名だけの場合はそのlistのtask全体を対象にする。
    pub async fn selection<T: WorkspaceRepository>(&self, repository: &T) -> Result<Selection> {
        let resolver = NameResolver::new(repository);

        match (&self.task_id, &self.task_name, &self.list_name) {
            (Some(task_id), _, _) => Ok(Selection::Task(task_id.clone())),
            (None, Some(task_name), list_name) => Ok(Selection::Task(
                resolver
                    .resolve_task_id(task_name, list_name.as_deref())
                    .await?,
            )),
            (None, None, Some(list_name)) => {
                let id = resolver.resolve_list_id(list_name).await?;
                let task_ids = repository
                    .fetch_tasks_in_list(&id)
                    .await?
                    .into_iter()
                    .map(|task| task.id)
                    .collect();
                info!("Filtering by list {} ({})", list_name, id);
                Ok(Selection::List { id, task_ids })
            }
            (None, None, None) => Ok(Selection::All),
        }
    }

    /// 1つのtaskのidを返す。taskを指定していない場合はエラー。
    pub async fn require_task<T: WorkspaceRepository>(&self, repository: &T) -> Result<String> {
        if self.task_id.is_none() && self.task_name.is_none() {
            return Err(TrackerError::InvalidArgument(
                "--task-id or --task-name is required".to_string(),
            ));
        }

        match self.selection(repository).await? {
            Selection::Task(id) => Ok(id),
            other => Err(TrackerError::InvalidArgument(format!(
                "Expected a single task, got {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TrackerError;
    use crate::hierarchy::{Hierarchy, NodeKind};
    use crate::models::fixtures::entry;
    use crate::models::Task;
    use crate::repository::MockWorkspaceRepository;

    use super::{RangeArgs, Selection, TaskArgs};

    fn tree() -> Hierarchy {
        let mut tree = Hierarchy::new();
        let root = tree.root();
        let space = tree.add_child(root, "s1", "Engineering", NodeKind::Space);
        tree.add_child(space, "l1", "Sprint", NodeKind::List);
        tree
    }

    fn task_args(task_id: Option<&str>, task_name: Option<&str>, list_name: Option<&str>) -> TaskArgs {
        TaskArgs {
            task_id: task_id.map(String::from),
            task_name: task_name.map(String::from),
            list_name: list_name.map(String::from),
        }
    }

    #[test]
    fn test_range_args_invalid_period() {
        let args = RangeArgs {
            period: "fortnight".to_string(),
            start: None,
            end: None,
        };

        assert!(matches!(args.resolve(), Err(TrackerError::InvalidPeriod(_))));
    }

    /// task idがあれば名前解決はしない。
    #[tokio::test]
    async fn test_selection_task_id() {
        let mut repository = MockWorkspaceRepository::new();
        repository.expect_fetch_workspace_hierarchy().times(0);

        let selection = task_args(Some("t1"), Some("ignored"), None)
            .selection(&repository)
            .await
            .unwrap();

        assert_eq!(selection, Selection::Task("t1".to_string()));
    }

    #[tokio::test]
    async fn test_selection_list() {
        let mut repository = MockWorkspaceRepository::new();
        repository
            .expect_fetch_workspace_hierarchy()
            .returning(|| Ok(tree()));
        repository
            .expect_fetch_tasks_in_list()
            .withf(|list_id| list_id == "l1")
            .returning(|_| {
                Ok(vec![
                    Task {
                        id: "t1".to_string(),
                        name: "A".to_string(),
                    },
                    Task {
                        id: "t2".to_string(),
                        name: "B".to_string(),
                    },
                ])
            });

        let selection = task_args(None, None, Some("sprint"))
            .selection(&repository)
            .await
            .unwrap();

        assert_eq!(
            selection,
            Selection::List {
                id: "l1".to_string(),
                task_ids: vec!["t1".to_string(), "t2".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_require_task_missing() {
        let repository = MockWorkspaceRepository::new();

        let result = task_args(None, None, Some("Sprint"))
            .require_task(&repository)
            .await;

        assert!(matches!(result, Err(TrackerError::InvalidArgument(_))));
    }

    #[test]
    fn test_filter_entries() {
        let entries = vec![
            entry("e1", ("t1", "A"), "u1", 0, 10),
            entry("e2", ("t2", "B"), "u1", 0, 10),
        ];
        let selection = Selection::List {
            id: "l1".to_string(),
            task_ids: vec!["t2".to_string()],
        };

        let filtered = selection.filter_entries(entries);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "e2");
    }
}
