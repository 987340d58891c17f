use log::info;

use crate::args::TaskArgs;
use crate::error::{Result, TrackerError};
use crate::models::{CreateTimeEntryParams, TimeEntry};
use crate::period::parse_timestamp;
use crate::repository::WorkspaceRepository;

/// `add`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct AddArgs {
    #[clap(flatten)]
    task: TaskArgs,

    #[clap(long = "start", help = "Start time (ISO-8601 or epoch milliseconds)")]
    start: String,

    #[clap(long = "duration", help = "Duration in minutes")]
    minutes: i64,

    #[clap(short = 'd', long = "description", help = "Description of the time entry")]
    description: Option<String>,

    #[clap(long = "billable", help = "Mark the time entry as billable")]
    billable: bool,

    #[clap(long = "tag", help = "Tag to attach, can be repeated", multiple_occurrences = true)]
    tags: Vec<String>,
}

/// `delete`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct DeleteArgs {
    #[clap(help = "Time entry id")]
    pub id: String,
}

pub struct EntryCommand<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> EntryCommand<'a, T> {
    /// 新しい`EntryCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// `add`サブコマンドの処理を行う。開始日時と分単位の時間からtime entryを作成する。
    pub async fn add(&self, args: AddArgs) -> Result<TimeEntry> {
        let start = parse_timestamp(&args.start).ok_or_else(|| {
            TrackerError::InvalidArgument(format!("Failed to parse start: {}", args.start))
        })?;
        if args.minutes <= 0 {
            return Err(TrackerError::InvalidArgument(format!(
                "Duration must be positive, got {} minutes",
                args.minutes
            )));
        }
        let duration = args.minutes.checked_mul(60_000).ok_or_else(|| {
            TrackerError::InvalidArgument(format!("Duration is too large: {} minutes", args.minutes))
        })?;
        let task_id = args.task.require_task(self.repository).await?;

        let params = CreateTimeEntryParams {
            task_id,
            start,
            duration,
            description: args.description,
            billable: args.billable,
            tags: args.tags.into_iter().collect(),
        };
        let entry = self.repository.add_time_entry(&params).await?;
        info!("Time entry {} added to task {}", entry.id, params.task_id);

        Ok(entry)
    }

    /// `delete`サブコマンドの処理を行う。
    pub async fn delete(&self, args: DeleteArgs) -> Result<bool> {
        let deleted = self.repository.delete_time_entry(&args.id).await?;
        info!("Time entry {} deleted: {}", args.id, deleted);

        Ok(deleted)
    }
}
