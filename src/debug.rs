//! Debugger pause detection.
//!
//! A remote runtime stopped at a breakpoint cannot answer. If the host kept
//! sending heartbeats and public calls it would block on replies that never
//! come, and the remote would drown in queued ticks once it resumes.
//!
//! The heuristic: every received frame refreshes the last interaction time,
//! every sent heartbeat refreshes the last heartbeat time. When the last
//! heartbeat went out long after the remote was last heard from, the remote is
//! presumed paused. While paused, heartbeats are suppressed except for an
//! occasional keepalive so the remote can tell it is still attached.

use std::time::{Duration, Instant};

use crate::config::DebugConfig;

/// Source of the current instant.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Timing state for the pause heuristic.
#[derive(Debug, Clone)]
pub struct DebugDetector {
    config: DebugConfig,
    last_interaction: Option<Instant>,
    last_heartbeat: Option<Instant>,
    skipped: u32,
    paused: bool,
}

impl DebugDetector {
    pub fn new(config: DebugConfig) -> Self {
        Self {
            config,
            last_interaction: None,
            last_heartbeat: None,
            skipped: 0,
            paused: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The remote was heard from.
    pub fn record_interaction(&mut self, now: Instant) {
        self.last_interaction = Some(now);
    }

    /// A heartbeat went out.
    pub fn record_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Result of the most recent check.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Heartbeats suppressed since the last keepalive.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Time between the last heartbeat and the last interaction.
    fn staleness(&self) -> Option<Duration> {
        let heartbeat = self.last_heartbeat?;
        let interaction = self.last_interaction?;
        Some(heartbeat.saturating_duration_since(interaction))
    }

    /// Whether traffic to the remote should be held back.
    ///
    /// `is_tick` enables skip accounting and the periodic keepalive; public
    /// calls pass `false`.
    pub fn is_suspended(&mut self, now: Instant, is_tick: bool) -> bool {
        if !self.config.enabled {
            return false;
        }

        let paused = self
            .staleness()
            .is_some_and(|stale| stale >= self.config.pause_timeout());

        if paused && !self.paused {
            tracing::info!("Debugger pause detected");
        } else if !paused && self.paused {
            tracing::info!("Debugger resume detected");
        }

        if is_tick {
            if paused && self.paused {
                let since_heartbeat = self
                    .last_heartbeat
                    .map_or(Duration::ZERO, |h| now.saturating_duration_since(h));
                if since_heartbeat >= self.config.keepalive_interval()
                    && self.skipped > self.config.keepalive_min_skipped
                {
                    tracing::debug!("Keepalive tick");
                    self.skipped = 0;
                    return false;
                }
                self.skipped += 1;
            } else if !paused && self.skipped > 0 {
                self.skipped = 0;
            }
        }

        self.paused = paused;
        paused
    }
}
