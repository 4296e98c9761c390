//! Run command implementation
//!
//! Starts the delivery worker and the periodic monitor loop, optionally
//! reading external reports from stdin.

use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::output::{print_output, RunReport};
use crate::clock::SystemClock;
use crate::commands::build_pipeline;
use crate::config::{Config, ConfigBuilder};
use crate::dispatch::Pipeline;
use crate::error::{AppError, Result};
use crate::ingress::RawReport;
use crate::notify::{Notifier, TerminalNotifier};
use crate::sources::{MetricsSource, SystemSource};

use chrono::Utc;
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long `--once` waits for the queue to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Granularity of shutdown checks while sleeping
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Execute the run command
pub fn run_daemon(args: &RunArgs, format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let config = ConfigBuilder::new()
        .with_file(config_path)?
        .with_interval(args.interval)
        .with_host_label(args.host_label.clone())
        .build()?;

    let source: Arc<dyn MetricsSource> =
        Arc::new(SystemSource::new().with_disk_mount(config.general.disk_mount.clone()));
    let pipeline = Arc::new(build_pipeline(&config, source));
    // With --once the run report owns stdout
    let terminal = if args.once {
        TerminalNotifier::stderr()
    } else {
        TerminalNotifier::stdout()
    };
    let notifier: Arc<dyn Notifier> = Arc::new(terminal.with_colors(!args.no_color));

    log::info!("Starting herald on {}", config.general.host_label);
    log::info!("  Interval: {:?}", config.interval());
    log::info!("  Metrics: {}", pipeline.thresholds().len());
    log::info!("  Notifier: {}", notifier.name());
    log::debug!("  Channels: {:?}", pipeline.routing().channels());

    let worker = pipeline
        .worker(notifier, config.retry_policy())
        .spawn(Arc::new(SystemClock))
        .map_err(|e| AppError::Worker(format!("failed to start delivery worker: {}", e)))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let pipeline = Arc::clone(&pipeline);
        ctrlc::set_handler(move || {
            log::info!("Shutdown requested");
            running.store(false, Ordering::SeqCst);
            pipeline.shutdown();
        })
        .map_err(|e| AppError::Worker(format!("failed to install signal handler: {}", e)))?;
    }

    if args.once {
        if args.stdin {
            read_reports(&pipeline, io::stdin().lock(), &running);
        }
        let tick = pipeline.tick(Utc::now());
        drain(&pipeline, &running);
        pipeline.shutdown();
        join(worker)?;

        let report = RunReport {
            tick,
            health: pipeline.health_snapshot(),
        };
        print_output(&report, format)?;
        return Ok(());
    }

    if args.stdin {
        let pipeline = Arc::clone(&pipeline);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("herald-stdin".into())
            .spawn(move || read_reports(&pipeline, io::stdin().lock(), &running))
            .map_err(|e| AppError::Worker(format!("failed to start stdin reader: {}", e)))?;
    }

    monitor_loop(&pipeline, &config, &running);
    pipeline.shutdown();
    join(worker)?;

    let health = pipeline.health_snapshot();
    log::info!(
        "Stopped: {} delivered, {} failed, {} dropped, {} abandoned",
        health.delivered,
        health.failed,
        health.dropped,
        health.queue_depth
    );
    Ok(())
}

fn monitor_loop(pipeline: &Pipeline, config: &Config, running: &AtomicBool) {
    let interval = config.interval();

    while running.load(Ordering::SeqCst) {
        let summary = pipeline.tick(Utc::now());
        log::debug!(
            "Tick: {} sampled, {} transitions, {} queued, {} suppressed",
            summary.sampled,
            summary.transitions,
            summary.enqueued,
            summary.suppressed
        );

        let deadline = Instant::now() + interval;
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}

/// Feed newline-delimited tagged JSON reports into the pipeline
pub fn read_reports<R: BufRead>(pipeline: &Pipeline, reader: R, running: &AtomicBool) -> usize {
    let mut accepted = 0;

    for (number, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Stopped reading reports: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let raw = match RawReport::from_tagged_json(&line) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Line {}: malformed report: {}", number + 1, e);
                continue;
            }
        };

        match pipeline.submit_external_event(raw) {
            Ok(()) => accepted += 1,
            Err(e) => log::warn!("Line {}: rejected report: {}", number + 1, e),
        }
    }

    accepted
}

fn drain(pipeline: &Pipeline, running: &AtomicBool) {
    let started = Instant::now();
    while !pipeline.queue().is_empty() && running.load(Ordering::SeqCst) {
        if started.elapsed() >= DRAIN_TIMEOUT {
            log::warn!(
                "Gave up waiting for {} queued item(s)",
                pipeline.queue().len()
            );
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn join(worker: thread::JoinHandle<()>) -> Result<()> {
    worker
        .join()
        .map_err(|_| AppError::Worker("delivery worker panicked".into()))
}
