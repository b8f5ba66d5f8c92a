/*!
 * Logging Module
 * Centralized logging configuration and utilities
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::LogConfig;

/// Initialize the logging system.
///
/// The returned guards flush the background writers; hold them for the
/// lifetime of the process.
pub fn init(config: &LogConfig) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let (console_writer, console_guard) = non_blocking(io::stdout());
    guards.push(console_guard);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let files = if config.console_only {
        None
    } else {
        match (
            rolling_appender(config, "cms.log"),
            rolling_appender(config, "error.log"),
        ) {
            (Ok(main), Ok(errors)) => Some((main, errors)),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!(
                    "Failed to open log files in {}: {}. Logging to console only.",
                    config.directory.display(),
                    e
                );
                None
            }
        }
    };

    match files {
        Some((main_appender, error_appender)) => {
            let (file_writer, file_guard) = non_blocking(main_appender);
            let (error_writer, error_guard) = non_blocking(error_appender);
            guards.push(file_guard);
            guards.push(error_guard);

            if config.is_production() {
                // JSON format for production
                let file_layer = fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true);

                let error_layer = fmt::layer()
                    .json()
                    .with_writer(error_writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

                let console_layer = fmt::layer()
                    .json()
                    .with_writer(console_writer)
                    .with_target(false);

                subscriber
                    .with(file_layer)
                    .with(error_layer)
                    .with(console_layer)
                    .init();
            } else {
                let file_layer = fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);

                let error_layer = fmt::layer()
                    .with_writer(error_writer)
                    .with_ansi(false)
                    .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

                let console_layer = fmt::layer()
                    .with_writer(console_writer)
                    .with_target(true)
                    .pretty();

                subscriber
                    .with(file_layer)
                    .with(error_layer)
                    .with(console_layer)
                    .init();
            }
        }
        None => {
            let console_layer = fmt::layer()
                .with_writer(console_writer)
                .with_target(false)
                .compact();

            subscriber.with(console_layer).init();
        }
    }

    tracing::info!("Logging initialized for {} environment", config.environment);

    guards
}

fn rolling_appender(
    config: &LogConfig,
    file_name: &str,
) -> Result<RollingFileAppender, rolling::InitError> {
    std::fs::create_dir_all(&config.directory).ok();

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(config.max_files)
        .build(&config.directory)
}
