//! Producer handle and writer thread

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::{Level, LogEntry, LogSink};
use crate::error::{ChatError, Result};

struct QueueState {
    entries: VecDeque<LogEntry>,
    /// False before `init` and once `shutdown` has begun; producers drop
    /// their entries while it is false.
    running: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    ready: Condvar,
    min_level: AtomicU8,
    /// Held for the whole of `init`/`shutdown`, so lifecycle calls serialize
    writer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the logging pipeline
///
/// Clones share one queue and one writer thread. The lifecycle is explicit:
/// [`Logger::init`] before use, [`Logger::shutdown`] before exit.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
}

impl Logger {
    /// Create a stopped pipeline. Entries are dropped until `init`.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    entries: VecDeque::new(),
                    running: false,
                }),
                ready: Condvar::new(),
                min_level: AtomicU8::new(Level::Debug as u8),
                writer: Mutex::new(None),
            }),
        }
    }

    /// Open the sink and start the writer thread.
    ///
    /// Calling this while the pipeline is already running is a no-op: the
    /// existing sink and level are kept.
    pub fn init(&self, sink: LogSink, level: Level) -> Result<()> {
        let mut writer = lock(&self.shared.writer);
        if writer.is_some() {
            return Ok(());
        }

        let out = sink
            .open()
            .map_err(|e| ChatError::config(format!("failed to open log sink: {}", e)))?;

        self.set_level(level);
        lock(&self.shared.queue).running = true;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || writer_loop(shared, out));

        match spawned {
            Ok(handle) => {
                *writer = Some(handle);
                Ok(())
            }
            Err(e) => {
                lock(&self.shared.queue).running = false;
                Err(ChatError::internal(format!(
                    "failed to spawn log writer: {}",
                    e
                )))
            }
        }
    }

    /// Enqueue a message. Below the minimum level, or while the pipeline is
    /// not running, the call has no effect.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        if level < self.level() {
            return;
        }

        let entry = LogEntry::new(level, message.into());
        {
            let mut queue = lock(&self.shared.queue);
            if !queue.running {
                return;
            }
            queue.entries.push_back(entry);
        }
        self.shared.ready.notify_one();
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    /// Change the minimum level at runtime
    pub fn set_level(&self, level: Level) {
        self.shared.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.shared.min_level.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.queue).running
    }

    /// Stop accepting entries, wait for the writer to drain the queue, and
    /// close the sink. Returns once every previously enqueued entry has been
    /// written. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut writer = lock(&self.shared.writer);
        let Some(handle) = writer.take() else {
            return;
        };

        lock(&self.shared.queue).running = false;
        self.shared.ready.notify_all();

        if handle.join().is_err() {
            eprintln!("log writer thread panicked");
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("running", &self.is_running())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drain batches until the queue is empty and `running` is false.
/// The sink is dropped, and thereby closed, when the loop returns.
fn writer_loop(shared: Arc<Shared>, mut out: Box<dyn Write + Send>) {
    let mut queue = lock(&shared.queue);
    loop {
        if queue.entries.is_empty() {
            if !queue.running {
                break;
            }
            queue = shared
                .ready
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        let batch: Vec<LogEntry> = queue.entries.drain(..).collect();
        drop(queue);

        for entry in &batch {
            if let Err(e) = writeln!(out, "{}", entry.render()) {
                // The pipeline cannot report its own sink failures through itself.
                eprintln!("log sink write failed: {}", e);
            }
        }
        if let Err(e) = out.flush() {
            eprintln!("log sink flush failed: {}", e);
        }

        queue = lock(&shared.queue);
    }
    drop(queue);
    let _ = out.flush();
}
