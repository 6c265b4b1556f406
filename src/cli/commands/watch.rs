//! Watch command - pump the watcher and print notifications.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::watcher::{ChannelListener, DirectoryWatcher, Notification, RecursiveMode};

/// Options for one `watch` run, CLI overrides already applied.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub dirs: Vec<PathBuf>,
    pub timeout: Duration,
    pub interval: Duration,
    pub ticks: Option<u64>,
    pub mode: RecursiveMode,
}

impl WatchOptions {
    pub fn from_args(
        dirs: Vec<PathBuf>,
        timeout_ms: Option<u64>,
        interval_ms: Option<u64>,
        ticks: Option<u64>,
        recursive: bool,
        config: &Settings,
    ) -> Self {
        Self {
            dirs,
            timeout: timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.watcher.poll_timeout()),
            interval: interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.watcher.tick_interval()),
            ticks,
            mode: if recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            },
        }
    }
}

/// One output line: `<watch id>\t<action>\t<path>`.
pub fn format_notification(notification: &Notification) -> String {
    format!(
        "{}\t{}\t{}",
        notification.watch_id,
        notification.action,
        notification.file.display()
    )
}

/// Run watch command until interrupted or `ticks` pumps have run.
pub fn run_watch(options: WatchOptions, config: &Settings) -> Result<()> {
    let mut watcher = DirectoryWatcher::builder()
        .settings(&config.watcher)
        .poll_timeout(options.timeout)
        .build()
        .context("failed to create event queue")?;

    let (listener, rx) = ChannelListener::new();
    let listener = Arc::new(listener);

    for dir in &options.dirs {
        let id = watcher
            .add_watch_with_mode(dir.clone(), listener.clone(), options.mode)
            .with_context(|| format!("cannot watch {}", dir.display()))?;
        eprintln!(
            "watching {} as {id} ({} files)",
            dir.display(),
            watcher.tracked_files(id).len()
        );
    }

    let stdout = std::io::stdout();
    let mut tick = 0u64;
    loop {
        watcher.pump();

        let mut out = stdout.lock();
        for notification in rx.try_iter() {
            writeln!(out, "{}", format_notification(&notification))?;
        }
        out.flush()?;
        drop(out);

        tick += 1;
        if options.ticks.is_some_and(|limit| tick >= limit) {
            break;
        }
        if !options.interval.is_zero() {
            std::thread::sleep(options.interval);
        }
    }

    crate::log_event!("watch", "stopping", "{tick} ticks");
    Ok(())
}
