use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

const LOG_ENV: &str = "CLICKUP_LOG";

/// ログの出力先を設定する。
///
/// 標準出力は結果の表示に使うため、ログは標準エラー出力に出す。
/// レベルは`CLICKUP_LOG`があればそれを優先し、なければ`verbose`でdebug、それ以外はinfoとする。
///
/// # Arguments
///
/// * `verbose` - debugログを出力する
/// * `log_file` - ファイルにもログを出力する
pub fn setup_logger(verbose: bool, log_file: bool) -> Result<Option<PathBuf>> {
    let level = level_from(env::var(LOG_ENV).ok().as_deref(), verbose);
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Red);

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    out.finish(format_args!(
                        "{} {} [{}] {}",
                        chrono::Local::now().format("%H:%M:%S%.3f"),
                        colors.color(record.level()),
                        record.target(),
                        message
                    ))
                })
                .chain(std::io::stderr()),
        );

    let path = if log_file {
        let dir = dirs::cache_dir()
            .context("Failed to find cache directory")?
            .join(env!("CARGO_PKG_NAME"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {} [{}] {}",
                        chrono::Local::now().to_rfc3339(),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(
                    fern::log_file(&path)
                        .with_context(|| format!("Failed to open log file: {}", path.display()))?,
                ),
        );
        Some(path)
    } else {
        None
    };

    dispatch.apply().context("Failed to set logger")?;

    Ok(path)
}

/// ログレベルを決める。不明なレベル名は無視する。
fn level_from(env_level: Option<&str>, verbose: bool) -> LevelFilter {
    env_level
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}
