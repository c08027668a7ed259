//! Plain-text activity log for the eBay inventory sync job.
//!
//! Every record is one line, `[YYYY-MM-DD HH:MM:SS] [CONTEXT] message`,
//! appended to a file that is never rewritten. Timestamps are UTC in every
//! process, whatever the host's zone. A captured backtrace is written one
//! frame line per record under the same prefix.
//!
//! Logging is best-effort: a failed write is reported through `tracing` and
//! otherwise ignored so the sync itself never fails because of its log.

use std::backtrace::Backtrace;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{SeekFrom, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};

use time::{OffsetDateTime, macros::format_description};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::constants::*;

pub const CONTEXT_REQUEST: &str = "REQUEST";
pub const CONTEXT_RESPONSE: &str = "RESPONSE";
pub const CONTEXT_WARNING: &str = "WARNING";
pub const CONTEXT_ERROR: &str = "ERROR";
pub const CONTEXT_PHP_ERROR: &str = "PHP_ERROR";

/// Human-readable label for a numeric error severity code.
pub fn severity_label(code: i64) -> &'static str {
    match code {
        1 => "ERROR",
        2 => "WARNING",
        8 => "NOTICE",
        256 => "USER_ERROR",
        512 => "USER_WARNING",
        1024 => "USER_NOTICE",
        2048 => "STRICT",
        8192 => "DEPRECATED",
        16384 => "USER_DEPRECATED",
        _ => "UNKNOWN",
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc().format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct SyncLogger {
    path: PathBuf,
    enabled: bool,
}

impl Default for SyncLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncLogger {
    /// A disabled logger aimed at the default log file.
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SYNC_LOG_PATH),
            enabled: false,
        }
    }

    /// Enables logging to `path` (or the default file) and writes the
    /// session-start banner.
    pub fn init(&mut self, path: Option<PathBuf>) {
        if let Some(path) = path {
            self.path = path;
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "could not create sync log directory");
            }
        }
        self.enabled = true;

        self.append(&format!(
            "{SYNC_LOG_BANNER}\neBay Sync Session Started: {}\n{SYNC_LOG_BANNER}\n\n",
            timestamp()
        ));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record. Does nothing until [`SyncLogger::init`] has run.
    pub fn log(&self, message: &str, context: Option<&str>) {
        if !self.enabled {
            return;
        }
        let line = match context.filter(|c| !c.is_empty()) {
            Some(context) => format!("[{}] [{}] {}\n", timestamp(), context, message),
            None => format!("[{}] {}\n", timestamp(), message),
        };
        self.append(&line);
    }

    pub fn log_request(&self, url: &str, method: &str) {
        self.log(&format!("{} {}", method, url), Some(CONTEXT_REQUEST));
    }

    pub fn log_response(&self, body: &str, http_code: Option<u16>) {
        let body = truncate_body(body);
        let message = match http_code {
            Some(code) => format!("HTTP {}: {}", code, body),
            None => body,
        };
        self.log(&message, Some(CONTEXT_RESPONSE));
    }

    pub fn log_warning(&self, message: &str) {
        self.log(message, Some(CONTEXT_WARNING));
    }

    /// Logs `message`, plus the error's description, the caller's location,
    /// its source chain and a backtrace when an error is supplied.
    #[track_caller]
    pub fn log_error(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
        self.log(message, Some(CONTEXT_ERROR));

        let Some(error) = error else {
            return;
        };
        if !self.enabled {
            return;
        }

        let location = Location::caller();
        self.log(&format!("Exception: {}", error), Some(CONTEXT_ERROR));
        self.log(
            &format!("Location: {}:{}", location.file(), location.line()),
            Some(CONTEXT_ERROR),
        );

        let mut source = error.source();
        while let Some(cause) = source {
            self.log(&format!("Caused by: {}", cause), Some(CONTEXT_ERROR));
            source = cause.source();
        }

        let stamp = timestamp();
        let mut trace = format!("[{stamp}] [{CONTEXT_ERROR}] Stack trace:\n");
        for frame in Backtrace::force_capture().to_string().lines() {
            if !frame.trim().is_empty() {
                trace.push_str(&format!("[{stamp}] [{CONTEXT_ERROR}] {frame}\n"));
            }
        }
        self.append(&trace);
    }

    pub fn log_coded_error(&self, code: i64, message: &str, file: &str, line: u32) {
        self.log(
            &format!(
                "{}: {} in {} on line {}",
                severity_label(code),
                message,
                file,
                line
            ),
            Some(CONTEXT_PHP_ERROR),
        );
    }

    /// Writes the session-end banner and disables further logging.
    pub fn finalize(&mut self) {
        if !self.enabled {
            return;
        }
        self.append(&format!(
            "\n{SYNC_LOG_BANNER}\neBay Sync Session Ended: {}\n{SYNC_LOG_BANNER}\n\n",
            timestamp()
        ));
        self.enabled = false;
    }

    fn append(&self, text: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(text.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "sync log write failed");
        }
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_LOGGED_RESPONSE_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}

/// Last `max_lines` lines of a log file. A missing file has no lines.
///
/// Reads backwards from the end in chunks and never looks further back than
/// `SYNC_LOG_TAIL_MAX_BYTES`. Bytes that are not UTF-8 come back as U+FFFD.
pub async fn read_tail(path: &Path, max_lines: usize) -> std::io::Result<Vec<String>> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if max_lines == 0 {
        return Ok(Vec::new());
    }

    let len = file.metadata().await?.len();
    let floor = len.saturating_sub(SYNC_LOG_TAIL_MAX_BYTES);
    let mut pos = len;
    let mut window: Vec<u8> = Vec::new();
    let mut newlines = 0;

    // One newline more than requested means the first kept line is whole.
    while pos > floor && newlines <= max_lines {
        let step = (pos - floor).min(SYNC_LOG_TAIL_CHUNK_BYTES);
        pos -= step;

        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(pos)).await?;
        file.read_exact(&mut chunk).await?;

        newlines += chunk.iter().filter(|&&b| b == b'\n').count();
        chunk.extend_from_slice(&window);
        window = chunk;
    }

    let text = String::from_utf8_lossy(&window);
    let mut lines: Vec<&str> = text.lines().collect();
    if pos > 0 && !lines.is_empty() {
        // The window starts mid-line.
        lines.remove(0);
    }
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}
