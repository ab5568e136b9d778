use std::time::Duration;

use crate::models::{DEFAULT_POLL_INTERVAL_SECS, SourceConfig};
use crate::source::DEFAULT_PAGE_SIZE;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EVENT_CAPACITY: usize = 100;
pub const DEFAULT_TRIGGER_CAPACITY: usize = 1;

/// Poller-wide knobs. Per-source intervals live on [`SourceConfig`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollerSettings {
    /// Used for sources whose `poll_interval_sec` is not positive.
    pub default_poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub fetch_page_size: u32,
    pub event_capacity: usize,
    pub trigger_capacity: usize,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            default_poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_page_size: DEFAULT_PAGE_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            trigger_capacity: DEFAULT_TRIGGER_CAPACITY,
        }
    }
}

impl PollerSettings {
    pub fn with_default_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fetch_page_size(mut self, page_size: u32) -> Self {
        self.fetch_page_size = page_size;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_trigger_capacity(mut self, capacity: usize) -> Self {
        self.trigger_capacity = capacity;
        self
    }

    pub fn poll_interval_for(&self, config: &SourceConfig) -> Duration {
        if config.poll_interval_sec > 0 {
            config.poll_interval()
        } else {
            self.default_poll_interval.max(Duration::from_millis(1))
        }
    }
}
