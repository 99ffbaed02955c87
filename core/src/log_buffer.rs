//! Ring-buffer backend for the `log` facade. Keeps the newest records in
//! memory so a frontend can print them after a run.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5} {}] {}", self.level, self.target, self.message)
    }
}

pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    /// Shrinking discards the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
    }

    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    /// Records evicted since the last clear.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

static LOG_BUFFER: OnceLock<Mutex<LogBuffer>> = OnceLock::new();

fn global_buffer() -> &'static Mutex<LogBuffer> {
    LOG_BUFFER.get_or_init(|| Mutex::new(LogBuffer::new(DEFAULT_CAPACITY)))
}

struct BufferLogger;

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        if let Ok(mut buf) = global_buffer().lock() {
            buf.push(entry);
        }
    }

    fn flush(&self) {}
}

static LOGGER: BufferLogger = BufferLogger;

/// Installs the buffer as the global logger. Fails if another logger is
/// already installed.
pub fn init_logger(level: log::LevelFilter, capacity: usize) -> Result<(), log::SetLoggerError> {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.set_capacity(capacity);
    }
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

pub fn drain_logs() -> Vec<LogEntry> {
    global_buffer()
        .lock()
        .map(|mut buf| buf.drain())
        .unwrap_or_default()
}

pub fn dropped_logs() -> u64 {
    global_buffer().lock().map(|buf| buf.dropped()).unwrap_or_default()
}

pub fn clear_logs() {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.clear();
    }
}
