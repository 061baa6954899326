use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_PREFIX: &str = "gridgate";
const ACTIVE_FILE_NAME: &str = "gridgate.log";
const MAX_RETAINED_LOGS: usize = 14;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static PANIC_HOOK: OnceLock<()> = OnceLock::new();

/// Installs the tracing subscriber: stdout always, plus a daily-rotated
/// file layer when a log directory is configured. Safe to call more than
/// once; later calls are no-ops.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let writer = DailyRotatingWriter::new(dir)?;
            let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(writer);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer);
            if subscriber.try_init().is_ok() {
                let _ = FILE_GUARD.set(guard);
                install_panic_hook();
            } else {
                // Subscriber already installed elsewhere; drop the guard so
                // the worker thread exits.
                drop(guard);
            }
        }
        None => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer);
            if subscriber.try_init().is_ok() {
                install_panic_hook();
            }
        }
    }

    Ok(())
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!("panic: {}", info);
            previous(info);
        }));
    });
}

/// Appends one timestamped line to a group's chat log, creating the file
/// and its parents as needed.
pub fn append_chat_line(path: &Path, speaker: &str, message: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "[{stamp}] {speaker} : {message}")
}

#[derive(Clone)]
struct DailyRotatingWriter {
    inner: Arc<WriterInner>,
}

struct WriterInner {
    state: Mutex<WriterState>,
    log_dir: PathBuf,
}

struct WriterState {
    file: BufWriter<fs::File>,
    current_day: NaiveDate,
}

impl DailyRotatingWriter {
    fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let log_dir = dir.into();
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let active_path = log_dir.join(ACTIVE_FILE_NAME);
        let now = Local::now();
        Self::rotate_stale_file(&log_dir, &active_path, now)?;

        let state = WriterState {
            file: Self::open_writer(&active_path)?,
            current_day: now.date_naive(),
        };
        Ok(Self {
            inner: Arc::new(WriterInner {
                state: Mutex::new(state),
                log_dir,
            }),
        })
    }

    fn open_writer(path: &Path) -> Result<BufWriter<fs::File>> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    /// An active file left over from a previous day is archived before the
    /// first write of this process.
    fn rotate_stale_file(log_dir: &Path, active_path: &Path, now: DateTime<Local>) -> Result<()> {
        let metadata = match fs::metadata(active_path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("unable to inspect log file {}", active_path.display())
                });
            }
        };
        let modified: DateTime<Local> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| now);
        if modified.date_naive() < now.date_naive() {
            archive(log_dir, active_path, modified.date_naive())?;
        }
        Ok(())
    }
}

impl io::Write for DailyRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.inner.state.lock();
        let today = Local::now().date_naive();
        if today != state.current_day {
            let rotated_day = state.current_day;
            state.file.flush()?;
            let active = self.inner.log_dir.join(ACTIVE_FILE_NAME);
            archive(&self.inner.log_dir, &active, rotated_day).map_err(io::Error::other)?;
            state.file = Self::open_writer(&active).map_err(io::Error::other)?;
            state.current_day = today;
        }
        state.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.state.lock().file.flush()
    }
}

/// Moves the active file aside as `gridgate-YYYY-MM-DD.log.gz` and prunes
/// archives beyond the retention window.
fn archive(log_dir: &Path, active_path: &Path, day: NaiveDate) -> Result<()> {
    let archived = log_dir.join(format!("{LOG_PREFIX}-{day}.log"));
    fs::rename(active_path, &archived)
        .with_context(|| format!("failed to rotate {}", active_path.display()))?;

    let compressed = archived.with_extension("log.gz");
    let source = fs::read(&archived)?;
    let mut encoder = GzEncoder::new(
        BufWriter::new(fs::File::create(&compressed)?),
        Compression::default(),
    );
    encoder.write_all(&source)?;
    encoder.finish()?;
    fs::remove_file(&archived)?;

    prune(log_dir)?;
    Ok(())
}

fn prune(log_dir: &Path) -> Result<()> {
    let mut archives: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(LOG_PREFIX) && name.ends_with(".log.gz"))
                .unwrap_or(false)
        })
        .collect();
    archives.sort();
    while archives.len() > MAX_RETAINED_LOGS {
        let oldest = archives.remove(0);
        let _ = fs::remove_file(oldest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_lines_append_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat/tester.log");
        append_chat_line(&path, "Marvin", "hello").unwrap();
        append_chat_line(&path, "Marvin", "again").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Marvin : hello"));
        assert!(lines[1].contains("Marvin : again"));
    }

    #[test]
    fn archive_compresses_and_removes_the_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let active = dir.path().join(ACTIVE_FILE_NAME);
        fs::write(&active, "old entries\n").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        archive(dir.path(), &active, day).unwrap();
        assert!(!active.exists());
        assert!(dir.path().join("gridgate-2024-01-02.log.gz").exists());
        assert!(!dir.path().join("gridgate-2024-01-02.log").exists());
    }
}
