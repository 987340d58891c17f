use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error};

mod aggregation;
mod args;
mod clickup;
mod config;
mod console;
mod datetime;
mod duration;
mod entries_command;
mod entry_command;
mod error;
mod hierarchy;
mod logging;
mod models;
mod output;
mod period;
mod repository;
mod report_command;
mod resolver;
mod summary_command;
mod timer_command;

use clickup::ClickUpClient;
use config::Config;
use console::ConsoleMarkdownList;
use entries_command::{EntriesArgs, EntriesCommand};
use entry_command::{AddArgs, DeleteArgs, EntryCommand};
use error::TrackerError;
use output::{Output, Response};
use report_command::{ReportArgs, ReportCommand};
use repository::WorkspaceRepository;
use summary_command::{SummaryArgs, SummaryCommand};
use timer_command::{StartArgs, TimerCommand};

/// ClickUpの作業時間を集計し、タイマーを操作するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- summary --period this_week --group-by list
/// $ cargo run -- start --task-name "Fix Bug" --list-name Sprint
/// $ cargo run -- --json stop
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(long, global = true, help = "Print the result as JSON")]
    json: bool,

    #[clap(short, long, global = true, help = "Print debug logs")]
    verbose: bool,

    #[clap(long = "log-file", global = true, help = "Also write logs to the cache directory")]
    log_file: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// ユーザーごとの作業時間
    Report(ReportArgs),
    /// task, list, space, 日ごとの作業時間
    Summary(SummaryArgs),
    /// タイムエントリーの一覧
    Entries(EntriesArgs),
    /// タイマーを開始する
    Start(StartArgs),
    /// 計測中のタイマーを停止する
    Stop,
    /// 終了済みのタイムエントリーを追加する
    Add(AddArgs),
    /// タイムエントリーを削除する
    Delete(DeleteArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = logging::setup_logger(args.verbose, args.log_file)? {
        debug!("Writing logs to {}", path.display());
    }

    let config = Config::from_env()?;
    debug!("Loaded config: {:?}", config);
    let repository = ClickUpClient::new(&config);

    let result = execute(&repository, args.subcommand).await;
    let stdout = io::stdout();
    let succeeded = render(result, args.json, &mut stdout.lock(), &mut io::stderr())?;
    if !succeeded {
        process::exit(1);
    }

    Ok(())
}

/// サブコマンドを実行する。
async fn execute<T: WorkspaceRepository>(
    repository: &T,
    subcommand: SubCommands,
) -> error::Result<Output> {
    let output = match subcommand {
        SubCommands::Report(args) => Output::Report(ReportCommand::new(repository).run(args).await?),
        SubCommands::Summary(args) => {
            Output::Summary(SummaryCommand::new(repository).run(args).await?)
        }
        SubCommands::Entries(args) => {
            Output::Entries(EntriesCommand::new(repository).run(args).await?)
        }
        SubCommands::Start(args) => Output::Start(TimerCommand::new(repository).start(args).await?),
        SubCommands::Stop => Output::Stop(TimerCommand::new(repository).stop().await?),
        SubCommands::Add(args) => Output::Added(EntryCommand::new(repository).add(args).await?),
        SubCommands::Delete(args) => {
            let id = args.id.clone();
            let deleted = EntryCommand::new(repository).delete(args).await?;
            Output::Deleted { id, deleted }
        }
    };

    Ok(output)
}

/// 結果を表示し、成功したかどうかを返す。
///
/// JSONの場合はエラーも標準出力に共通形式で出す。それ以外はエラーを`err`に出す。
fn render<W: Write, E: Write>(
    result: error::Result<Output>,
    json: bool,
    out: &mut W,
    err: &mut E,
) -> Result<bool> {
    match (result, json) {
        (Ok(output), true) => {
            Response::success(&output).write_json(out)?;
            Ok(true)
        }
        (Ok(output), false) => {
            output.present(&mut ConsoleMarkdownList::new(out))?;
            Ok(true)
        }
        (Err(e), true) => {
            error!("{}", e);
            Response::error(&e).write_json(out)?;
            Ok(false)
        }
        (Err(e), false) => {
            error!("{}", e);
            report_error(&e, err)?;
            Ok(false)
        }
    }
}

fn report_error<E: Write>(e: &TrackerError, err: &mut E) -> Result<()> {
    writeln!(err, "Error: {}", e).context("Failed to write error")
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::Value;

    use super::{execute, render, Args, SubCommands};
    use crate::error::TrackerError;
    use crate::models::fixtures::entry;
    use crate::models::TimeEntry;
    use crate::repository::MockWorkspaceRepository;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    fn running(id: &str) -> TimeEntry {
        TimeEntry {
            end: None,
            ..entry(id, ("t1", "A"), "u1", 1_720_000_000_000, 0)
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = parse(&["clickup-timekeeper", "stop", "--json", "-v"]);

        assert!(args.json);
        assert!(args.verbose);
        assert!(matches!(args.subcommand, SubCommands::Stop));
    }

    #[test]
    fn test_parse_summary_defaults() {
        let args = parse(&["clickup-timekeeper", "summary"]);

        assert!(!args.json);
        assert!(matches!(args.subcommand, SubCommands::Summary(_)));
    }

    #[tokio::test]
    async fn test_stop_json() {
        let mut repository = MockWorkspaceRepository::new();
        repository
            .expect_fetch_current_timer()
            .returning(|| Ok(Some(running("e1"))));
        repository
            .expect_stop_timer()
            .times(1)
            .returning(|| Ok(entry("e1", ("t1", "A"), "u1", 1_720_000_000_000, 60_000)));
        let args = parse(&["clickup-timekeeper", "--json", "stop"]);

        let result = execute(&repository, args.subcommand).await;
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let succeeded = render(result, true, &mut out, &mut err).unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        assert!(succeeded);
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["outcome"], "stopped");
        assert_eq!(value["data"]["entry"]["id"], "e1");
        assert!(err.is_empty());
    }

    /// taskを指定しない`start`は、APIを呼ばずにエラーになる。
    #[tokio::test]
    async fn test_start_without_task_json() {
        let mut repository = MockWorkspaceRepository::new();
        repository.expect_fetch_current_timer().times(0);
        repository.expect_start_timer().times(0);
        let args = parse(&["clickup-timekeeper", "start"]);

        let result = execute(&repository, args.subcommand).await;
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let succeeded = render(result, true, &mut out, &mut err).unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        assert!(!succeeded);
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "invalid_argument");
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn test_delete_markdown() {
        let mut repository = MockWorkspaceRepository::new();
        repository
            .expect_delete_time_entry()
            .withf(|id| id == "e9")
            .times(1)
            .returning(|_| Ok(true));
        let args = parse(&["clickup-timekeeper", "delete", "e9"]);

        let result = execute(&repository, args.subcommand).await;
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let succeeded = render(result, false, &mut out, &mut err).unwrap();

        assert!(succeeded);
        assert_eq!(String::from_utf8(out).unwrap(), "Time entry e9 deleted\n");
    }

    #[test]
    fn test_render_error_markdown() {
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let succeeded = render(
            Err(TrackerError::Upstream {
                status: Some(401),
                message: "Token invalid".to_string(),
            }),
            false,
            &mut out,
            &mut err,
        )
        .unwrap();

        assert!(!succeeded);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Error: Upstream error (401): Token invalid\n"
        );
    }
}
