//! Slicer - cooperative time-sliced task scheduling
//!
//! CLI entry point: runs each primitive on real time and reports the result.

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use tokio::sync::{Notify, oneshot};
use tokio::task::LocalSet;
use tracing::{debug, info};

use slicer::cli::{Cli, Command, OutputFormat};
use slicer::config::Config;
use slicer::{
    AddOutcome, BatchConfig, BatchSlicer, DelayedTaskRegistry, DrainSummary, LocalScheduler, SliceConfig, StopOptions,
    TaskState, TimeSlicer, ValueAnimator,
};

fn parse_level(level: &str) -> tracing::Level {
    match level.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", level);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slicer")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = cli_log_level
        .or(config_log_level)
        .map(parse_level)
        .unwrap_or(tracing::Level::INFO);

    let log_file = fs::File::create(log_dir.join("slicer.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("slicer starting");

    // Every timer callback is !Send and lives on this thread
    let local = LocalSet::new();
    local.run_until(run(cli, config)).await
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    debug!(command = ?cli.command, "run: dispatching command");
    let format = cli.format;
    match cli.command {
        Command::Chunk {
            count,
            tick_delay_ms,
            fail,
        } => {
            let slice_config = tick_delay_ms
                .map(|ms| SliceConfig { tick_delay_ms: ms })
                .unwrap_or_else(|| config.chunk.clone());
            cmd_chunk(slice_config, count, fail, format).await
        }
        Command::Batch {
            count,
            tick_delay_ms,
            budget_ms,
            work_us,
        } => {
            let batch_config = BatchConfig {
                tick_delay_ms: tick_delay_ms.unwrap_or(config.batch.tick_delay_ms),
                per_tick_budget_ms: budget_ms.unwrap_or(config.batch.per_tick_budget_ms),
            };
            cmd_batch(batch_config, count, work_us, format).await
        }
        Command::Animate {
            from,
            to,
            duration_ms,
            verbose,
        } => cmd_animate(&config, from, to, Duration::from_millis(duration_ms), verbose, format).await,
        Command::Delay { ids, delay_ms, forget } => {
            let delay = delay_ms.map(Duration::from_millis).unwrap_or_else(|| config.delay.delay());
            cmd_delay(ids, delay, forget, format).await
        }
    }
}

#[derive(Serialize)]
struct DrainReport<'a> {
    command: &'a str,
    elapsed_ms: u128,
    #[serde(flatten)]
    summary: &'a DrainSummary,
}

fn print_drain(command: &str, summary: &DrainSummary, elapsed: Duration, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let report = DrainReport {
                command,
                elapsed_ms: elapsed.as_millis(),
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {}: processed {} items in {} ticks ({:?})",
                "✓".green(),
                command,
                summary.processed.to_string().cyan(),
                summary.ticks.to_string().cyan(),
                elapsed
            );
            for failure in &summary.failures {
                println!("  {} {}", "✗".red(), failure);
            }
        }
    }
    Ok(())
}

async fn cmd_chunk(config: SliceConfig, count: usize, fail: Vec<usize>, format: OutputFormat) -> Result<()> {
    debug!(?config, count, ?fail, "cmd_chunk: called");
    let scheduler = Rc::new(LocalScheduler::new());
    let (tx, rx) = oneshot::channel();
    let started = Instant::now();
    let verbose = format == OutputFormat::Text;

    TimeSlicer::new(scheduler, config).run(
        0..count,
        move |index| {
            if fail.contains(&index) {
                eyre::bail!("item {} marked to fail", index);
            }
            if verbose {
                println!("  {} item {}", "•".dimmed(), index);
            }
            Ok(())
        },
        move |summary| {
            let _ = tx.send(summary);
        },
    );

    let summary = rx.await.context("Time slicer stopped before completing")?;
    print_drain("chunk", &summary, started.elapsed(), format)
}

async fn cmd_batch(config: BatchConfig, count: usize, work_us: u64, format: OutputFormat) -> Result<()> {
    debug!(?config, count, work_us, "cmd_batch: called");
    let scheduler = Rc::new(LocalScheduler::new());
    let (tx, rx) = oneshot::channel();
    let started = Instant::now();
    let work = Duration::from_micros(work_us);

    BatchSlicer::new(scheduler, config).run(
        0..count,
        move |_| {
            // Stand-in for blocking per-item work
            std::thread::sleep(work);
            Ok(())
        },
        move |summary| {
            let _ = tx.send(summary);
        },
    );

    let summary = rx.await.context("Batch slicer stopped before completing")?;
    print_drain("batch", &summary, started.elapsed(), format)
}

#[derive(Serialize)]
struct AnimateReport {
    from: f64,
    to: f64,
    duration_ms: u128,
    steps: u64,
    ticks: u64,
    final_value: f64,
    elapsed_ms: u128,
}

async fn cmd_animate(
    config: &Config,
    from: f64,
    to: f64,
    duration: Duration,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    debug!(from, to, ?duration, verbose, "cmd_animate: called");
    let scheduler = Rc::new(LocalScheduler::new());
    let (tx, rx) = oneshot::channel();
    let started = Instant::now();
    let steps = Rc::new(Cell::new(0u64));
    let print_steps = verbose && format == OutputFormat::Text;

    let counter = Rc::clone(&steps);
    let handle = ValueAnimator::new(scheduler, config.animate.clone()).start(
        from,
        to,
        duration,
        move |value| {
            counter.set(counter.get() + 1);
            if print_steps {
                println!("  {:>12.3}", value);
            }
        },
        move |value| {
            let _ = tx.send(value);
        },
    )?;

    let final_value = rx.await.context("Animation stopped before completing")?;
    let report = AnimateReport {
        from,
        to,
        duration_ms: duration.as_millis(),
        steps: steps.get(),
        ticks: handle.ticks(),
        final_value,
        elapsed_ms: started.elapsed().as_millis(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "{} animate: {} -> {} reached {} after {} steps ({}ms)",
            "✓".green(),
            report.from,
            report.to,
            report.final_value.to_string().cyan(),
            report.steps,
            report.elapsed_ms
        ),
    }
    Ok(())
}

#[derive(Serialize)]
struct TaskReport {
    id: String,
    outcome: AddOutcome,
    state: TaskState,
}

async fn cmd_delay(ids: Vec<String>, delay: Duration, forget: Vec<String>, format: OutputFormat) -> Result<()> {
    debug!(?ids, ?delay, ?forget, "cmd_delay: called");
    let scheduler = Rc::new(LocalScheduler::new());
    let registry: DelayedTaskRegistry<String> = DelayedTaskRegistry::new(scheduler)
        .with_error_hook(|err| eprintln!("{} {}", "✗".red(), err));
    let remaining = Rc::new(Cell::new(0usize));
    let all_done = Rc::new(Notify::new());
    let text = format == OutputFormat::Text;

    let mut outcomes = Vec::with_capacity(ids.len());
    for id in ids {
        let left = Rc::clone(&remaining);
        let done = Rc::clone(&all_done);
        let outcome = registry.add(id.clone(), delay, move |id| {
            if text {
                println!("  {} ran {}", "•".dimmed(), id);
            }
            left.set(left.get() - 1);
            if left.get() == 0 {
                done.notify_one();
            }
            Ok(())
        });
        if outcome.accepted() {
            remaining.set(remaining.get() + 1);
        }
        outcomes.push((id, outcome));
    }

    for id in &forget {
        if registry.stop(id, StopOptions::forget()) {
            remaining.set(remaining.get() - 1);
        }
    }

    if remaining.get() > 0 {
        all_done.notified().await;
    }

    let report: Vec<TaskReport> = outcomes
        .into_iter()
        .map(|(id, outcome)| {
            let state = registry.state(&id);
            TaskReport { id, outcome, state }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for task in &report {
                let state = format!("{:?}", task.state);
                let state = match task.state {
                    TaskState::Finished => state.green(),
                    _ => state.yellow(),
                };
                println!("{} {:<16} {:?}", state, task.id, task.outcome);
            }
        }
    }
    Ok(())
}
