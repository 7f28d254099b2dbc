use anyhow::{Context as _, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,headless_chrome=warn";

/// Counts error-level events. The count is the "errors" figure in the run
/// summary.
#[derive(Debug, Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn subscriber(
    filter: EnvFilter,
    log: File,
    counter: ErrorCounter,
) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(log)),
        )
        .with(counter)
}

/// Installs the global subscriber: the console, `log_file` and the error
/// counter all see the same filtered events.
pub fn init(log_file: &Path) -> Result<ErrorCounter> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let counter = ErrorCounter::default();
    subscriber(filter, open_log(log_file)?, counter.clone())
        .try_init()
        .context("installing the tracing subscriber")?;
    Ok(counter)
}
