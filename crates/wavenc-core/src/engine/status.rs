//! Append-only log of per-file status events.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

pub const KEY_COMPLETE: &str = "Complete";
pub const KEY_ERROR: &str = "Error";

/// One status event, printed as `<key> <value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub key: String,
    pub value: String,
}

impl StatusEvent {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A worker picked up `input`.
    pub fn processing(thread_id: u32, input: &Path) -> Self {
        Self::new(
            format!("Thread {thread_id}"),
            format!("Processing {}", input.display()),
        )
    }

    /// `input` was encoded to `output`.
    pub fn complete(input: &Path, output: &Path) -> Self {
        Self::new(
            KEY_COMPLETE,
            format!("{} -> Output: {}", input.display(), output.display()),
        )
    }

    pub fn error(message: impl fmt::Display, input: &Path) -> Self {
        Self::new(KEY_ERROR, format!("{message}: {}", input.display()))
    }

    pub fn is_complete(&self) -> bool {
        self.key == KEY_COMPLETE
    }

    pub fn is_error(&self) -> bool {
        self.key == KEY_ERROR
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

/// Thread-safe status sink shared by all workers.
///
/// The lock is held only for the push.
#[derive(Debug, Default)]
pub struct StatusLog {
    events: Mutex<Vec<StatusEvent>>,
    echo: bool,
}

impl StatusLog {
    /// `echo` prints each event to stdout as it arrives.
    pub fn new(echo: bool) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            echo,
        }
    }

    pub fn push(&self, event: StatusEvent) {
        log::debug!("{event}");
        if self.echo {
            println!("{event}");
        }
        self.lock().push(event);
    }

    /// Copy of every event recorded so far.
    pub fn snapshot(&self) -> Vec<StatusEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StatusEvent>> {
        // A panicking worker never leaves the Vec half-written.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}
