//! Debounced auto-save scheduling and save status.
//!
//! Time is always passed in, never read, so callers (and tests) decide what
//! "now" is. The scheduler only says *when* to save; the sync gateway does
//! the saving.

use std::time::{Duration, Instant};

/// Default debounce delay in milliseconds.
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;

/// What the save indicator shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing saved yet this session and nothing pending.
    #[default]
    Idle,
    /// A change is waiting for the debounce deadline.
    Pending,
    Saving,
    Saved(Instant),
    Error(String),
}

impl SaveStatus {
    /// Indicator text at `now`.
    pub fn label(&self, now: Instant) -> String {
        match self {
            SaveStatus::Idle => "Saved".to_string(),
            SaveStatus::Pending | SaveStatus::Saving => "Saving...".to_string(),
            SaveStatus::Error(_) => "Save failed".to_string(),
            SaveStatus::Saved(at) => {
                let secs = now.saturating_duration_since(*at).as_secs();
                if secs < 60 {
                    "Saved".to_string()
                } else if secs < 3600 {
                    format!("Saved {}m ago", secs / 60)
                } else {
                    format!("Saved {}h ago", secs / 3600)
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SaveStatus::Error(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, SaveStatus::Pending | SaveStatus::Saving)
    }
}

/// Debounce state for document saves.
///
/// Every change re-arms the deadline, so a burst of edits produces a single
/// save once the document has been quiet for the whole delay.
#[derive(Debug, Clone)]
pub struct AutoSave {
    delay: Duration,
    deadline: Option<Instant>,
    dirty: bool,
    status: SaveStatus,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS))
    }
}

impl AutoSave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            dirty: false,
            status: SaveStatus::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Record a local change and push the deadline out.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.deadline = Some(now + self.delay);
        self.status = SaveStatus::Pending;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the debounce deadline has passed with changes outstanding.
    pub fn is_due(&self, now: Instant) -> bool {
        self.dirty && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// A save is starting. Disarms the deadline; changes made while the save
    /// is in flight re-arm it.
    pub fn begin(&mut self) {
        self.deadline = None;
        self.dirty = false;
        self.status = SaveStatus::Saving;
    }

    /// The save went through.
    pub fn succeeded(&mut self, now: Instant) {
        if !self.dirty {
            self.status = SaveStatus::Saved(now);
        }
    }

    /// The save failed. The document stays dirty but nothing is retried
    /// until the next change or manual save.
    pub fn failed(&mut self, message: impl Into<String>) {
        self.dirty = true;
        self.deadline = None;
        self.status = SaveStatus::Error(message.into());
    }

    /// Forget pending work, e.g. after loading a fresh document.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.dirty = false;
        self.status = SaveStatus::Idle;
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }
}

/// Fixed-interval timer driven by `tick(now)`.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when the interval has elapsed. Fires on the first call.
    /// Missed intervals collapse into one firing.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now < next => false,
            _ => {
                self.next = Some(now + self.interval);
                true
            }
        }
    }
}
