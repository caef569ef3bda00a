//! Ambient logging: a `tracing`/`tracing-subscriber` layer for
//! structured per-request spans (console diagnostics), paired with a
//! rotating one-line-per-request access log carried over from the
//! teacher's hand-rolled `SimpleLogger` (`logger.rs`), generalized from
//! a generic "append a message" helper into the request summary spec §5
//! requires ("tokens, elapsed, token/s, error").

use chrono::Local;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

const LOG_PATH: &str = "gateway.log";
const MAX_ENTRIES: usize = 5_000;

static LOGGER: OnceLock<RequestLogger> = OnceLock::new();

/// Initialize the `tracing` subscriber. Call once at process startup.
/// `very_verbose` widens the default filter to include per-delta
/// diagnostic events (spec §6 Configuration).
pub fn init_tracing(very_verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_directive = if very_verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// One-line request summary: tokens, elapsed, token/s, and error if any
/// (spec §5 cancellation handling requires exactly this on cancellation,
/// and it's useful for every request, not only cancelled ones).
pub struct RequestSummary {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl RequestSummary {
    fn format(&self) -> String {
        let tokens_per_sec = if self.elapsed_ms > 0 {
            self.completion_tokens as f64 / (self.elapsed_ms as f64 / 1000.0)
        } else {
            0.0
        };
        match &self.error {
            Some(err) => format!(
                "model={} prompt_tokens={} completion_tokens={} elapsed_ms={} tok/s={:.1} error={}",
                self.model, self.prompt_tokens, self.completion_tokens, self.elapsed_ms, tokens_per_sec, err
            ),
            None => format!(
                "model={} prompt_tokens={} completion_tokens={} elapsed_ms={} tok/s={:.1}",
                self.model, self.prompt_tokens, self.completion_tokens, self.elapsed_ms, tokens_per_sec
            ),
        }
    }
}

pub fn log_request(summary: &RequestSummary) {
    let line = summary.format();
    tracing::info!(target: "gateway::access", "{line}");
    LOGGER
        .get_or_init(|| RequestLogger::new(PathBuf::from(LOG_PATH), MAX_ENTRIES))
        .append(&line);
}

struct RequestLogger {
    path: PathBuf,
    max_entries: usize,
    buffer: Mutex<VecDeque<String>>,
}

impl RequestLogger {
    fn new(path: PathBuf, max_entries: usize) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = fs::create_dir_all(parent) {
                    eprintln!("logging: failed to create {}: {}", parent.display(), err);
                }
            }
        }

        let buffer = Self::read_existing(&path, max_entries).unwrap_or_else(|err| {
            eprintln!(
                "logging: failed to read existing log {}: {}",
                path.display(),
                err
            );
            VecDeque::with_capacity(max_entries)
        });

        Self {
            path,
            max_entries,
            buffer: Mutex::new(buffer),
        }
    }

    fn read_existing(path: &Path, max_entries: usize) -> io::Result<VecDeque<String>> {
        if !path.exists() {
            return Ok(VecDeque::with_capacity(max_entries));
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = VecDeque::with_capacity(max_entries);
        for line in reader.lines() {
            let line = line?;
            if lines.len() == max_entries {
                lines.pop_front();
            }
            lines.push_back(line);
        }
        Ok(lines)
    }

    fn append(&self, message: &str) {
        let now = Local::now();
        let timestamp = format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:04}",
            now.format("%Y"),
            now.format("%m"),
            now.format("%d"),
            now.format("%H"),
            now.format("%M"),
            now.format("%S"),
            now.timestamp_subsec_millis()
        );
        let entry = format!("{} - {}", timestamp, message);

        let mut buffer = match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                eprintln!("logging: mutex poisoned, recovering buffer");
                poisoned.into_inner()
            }
        };

        buffer.push_back(entry);
        if buffer.len() > self.max_entries {
            buffer.pop_front();
        }

        if let Err(err) = Self::write_all(&self.path, &buffer) {
            eprintln!("logging: failed to write {}: {}", self.path.display(), err);
        }
    }

    fn write_all(path: &Path, lines: &VecDeque<String>) -> io::Result<()> {
        let mut file = File::create(path)?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_format_includes_tokens_per_second() {
        let summary = RequestSummary {
            model: "tensor-runtime".to_string(),
            prompt_tokens: 10,
            completion_tokens: 20,
            elapsed_ms: 2000,
            error: None,
        };
        let line = summary.format();
        assert!(line.contains("tok/s=10.0"));
        assert!(!line.contains("error="));
    }

    #[test]
    fn summary_format_includes_error_when_present() {
        let summary = RequestSummary {
            model: "tensor-runtime".to_string(),
            prompt_tokens: 5,
            completion_tokens: 0,
            elapsed_ms: 100,
            error: Some("client disconnected".to_string()),
        };
        assert!(summary.format().contains("error=client disconnected"));
    }
}
