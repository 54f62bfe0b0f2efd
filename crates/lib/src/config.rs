//! Configuration for binders and the curator.
//!
//! Both structs deserialize with every field optional, so a config file
//! only names what it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for one binder task. Applied uniformly to every binder the
/// curator spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// How often the flush timer fires, in milliseconds.
    pub flush_period_ms: u64,

    /// How many recent transforms stay in memory after a flush. This is
    /// the furthest back a late submitter can be and still be rewritten;
    /// anyone older is told to resync.
    pub retention_window: usize,

    /// Consecutive flush failures tolerated before the binder reports a
    /// fatal error and shuts down.
    pub max_flush_failures: u32,

    /// How long a binder lingers with zero subscribers before it flushes
    /// and requests shutdown, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Capacity of each subscriber's outbound queue. A subscriber whose
    /// queue is full when a transform arrives is dropped.
    pub subscriber_queue_capacity: usize,

    /// Capacity of the binder's inbound command queue.
    pub command_queue_capacity: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            flush_period_ms: 2_000,
            retention_window: 256,
            max_flush_failures: 5,
            idle_timeout_ms: 60_000,
            subscriber_queue_capacity: 64,
            command_queue_capacity: 128,
        }
    }
}

impl BinderConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_period_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Tuning for the curator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    /// Configuration handed to every binder.
    pub binder: BinderConfig,

    /// Capacity of the binder-to-curator event channel.
    pub event_channel_capacity: usize,
}

impl CuratorConfig {
    /// Capacity with the zero-value guarded; an unbuffered event channel
    /// would let one exiting binder block the rest.
    pub(crate) fn event_capacity(&self) -> usize {
        self.event_channel_capacity.max(10)
    }
}
