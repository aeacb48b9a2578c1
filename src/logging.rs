use std::path::{Path, PathBuf};
use std::sync::Arc;

use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a stdout subscriber plus a plain-text copy of the log in the
/// OS temp directory, named after the input so concurrent runs on
/// different inputs stay apart. Returns the log file location when the
/// file could be created.
pub fn init_tracing(input_path: &Path) -> Option<PathBuf> {
    let log_path = log_file_path(input_path);
    let log_file = std::fs::File::create(&log_path).ok();
    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file))
    });
    let opened = file_layer.is_some();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    opened.then_some(log_path)
}

fn log_file_path(input_path: &Path) -> PathBuf {
    let now = OffsetDateTime::now_utc();
    let stamp = format!(
        "{:04}_{:02}_{:02}-{:02}_{:02}_{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    );
    let base = input_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    std::env::temp_dir().join(format!("buganime_{base}_{stamp}.txt"))
}
