use std::collections::BTreeSet;

use log::{info, warn};
use serde::Serialize;

use crate::args::TaskArgs;
use crate::error::Result;
use crate::models::{StartTimerParams, TimeEntry};
use crate::repository::WorkspaceRepository;

/// `start`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct StartArgs {
    #[clap(flatten)]
    task: TaskArgs,

    #[clap(short = 'd', long = "description", help = "Description of the time entry")]
    description: Option<String>,

    #[clap(long = "billable", help = "Mark the time entry as billable")]
    billable: bool,

    #[clap(long = "tag", help = "Tag to attach, can be repeated", multiple_occurrences = true)]
    tags: Vec<String>,
}

/// タイマー開始の結果。既に計測中の場合は開始せず、そのタイマーを返す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started { entry: TimeEntry },
    AlreadyRunning { current: TimeEntry },
}

/// タイマー停止の結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { entry: TimeEntry },
    NotRunning,
}

pub struct TimerCommand<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> TimerCommand<'a, T> {
    /// 新しい`TimerCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// `start`サブコマンドの処理を行う。
    ///
    /// taskを解決したあと、計測中のタイマーがなければ開始する。
    pub async fn start(&self, args: StartArgs) -> Result<StartOutcome> {
        let task_id = args.task.require_task(self.repository).await?;

        if let Some(current) = self.repository.fetch_current_timer().await? {
            warn!("Timer {} is already running", current.id);
            return Ok(StartOutcome::AlreadyRunning { current });
        }

        let params = StartTimerParams {
            task_id,
            description: args.description,
            billable: args.billable,
            tags: args.tags.into_iter().collect::<BTreeSet<_>>(),
        };
        let entry = self.repository.start_timer(&params).await?;
        info!("Timer {} started on task {}", entry.id, params.task_id);

        Ok(StartOutcome::Started { entry })
    }

    /// `stop`サブコマンドの処理を行う。
    pub async fn stop(&self) -> Result<StopOutcome> {
        if self.repository.fetch_current_timer().await?.is_none() {
            return Ok(StopOutcome::NotRunning);
        }

        let entry = self.repository.stop_timer().await?;
        info!("Timer {} stopped", entry.id);

        Ok(StopOutcome::Stopped { entry })
    }
}
