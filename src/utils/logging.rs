use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};

/// Files above this size are rotated at start-up.
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
/// Rotated files kept next to the active log.
pub const KEEP_ROTATED: usize = 5;

const LOG_NAME: &str = "kubeasy.log";
const ROTATED_PREFIX: &str = "kubeasy_";

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("kubeasy").join("logs"))
}

/// Create `dir` if needed and rotate an oversized log. Returns the path of
/// the active log file.
pub fn prepare_log_file(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let log_file = dir.join(LOG_NAME);

    if let Ok(metadata) = fs::metadata(&log_file) {
        if metadata.len() > MAX_LOG_BYTES {
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            let rotated = dir.join(format!("{}{}.log", ROTATED_PREFIX, timestamp));
            fs::rename(&log_file, &rotated)?;
            cleanup_old_logs(dir);
        }
    }
    Ok(log_file)
}

fn cleanup_old_logs(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let mut logs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "log")
                && p.file_stem().is_some_and(|s| s.to_string_lossy().starts_with(ROTATED_PREFIX))
        })
        .collect();

    // Names embed the timestamp, so lexical order is age order.
    logs.sort();
    if logs.len() > KEEP_ROTATED {
        for old in &logs[..logs.len() - KEEP_ROTATED] {
            let _ = fs::remove_file(old);
        }
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "[{}] [{}] [{}] {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Appends formatted records to a single file.
pub struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    pub fn open(path: &Path, level: LevelFilter) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { level, file: Mutex::new(file) })
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let _ = file.write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = self.file.lock().unwrap_or_else(|e| e.into_inner()).flush();
    }
}

/// Install the file logger under the platform data directory.
pub fn init_logger(level: LevelFilter) -> Result<PathBuf, String> {
    let dir = default_log_dir().ok_or("Could not find data directory")?;
    init_logger_in(&dir, level)
}

pub fn init_logger_in(dir: &Path, level: LevelFilter) -> Result<PathBuf, String> {
    let path = prepare_log_file(dir).map_err(|e| format!("Failed to prepare log file: {}", e))?;
    let logger = FileLogger::open(&path, level).map_err(|e| format!("Failed to open log file: {}", e))?;
    log::set_boxed_logger(Box::new(logger)).map_err(|e| format!("Logger already set: {}", e))?;
    log::set_max_level(level);
    log::info!(target: "system", "Logger initialized");
    Ok(path)
}
