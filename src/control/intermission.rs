//! Session lifecycle reporting ("intermission").
//!
//! While no script runtime is attached, the host usually shows players a
//! holding state. [`Intermission`] tracks whether that state should be up and
//! forwards every lifecycle transition to an optional [`LifecycleReporter`].

use std::fmt;

/// A session lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The bridge was created and waits for its first connection.
    Starting,
    /// A remote runtime connected.
    Connected,
    /// The remote went away cleanly.
    Disconnected,
    /// The remote went away unexpectedly.
    Error,
}

/// Observer for lifecycle transitions.
pub trait LifecycleReporter: Send {
    fn report(&mut self, event: LifecycleEvent);

    /// Called when the holding state is raised or lowered.
    fn holding_changed(&mut self, _on: bool) {}
}

impl<F> LifecycleReporter for F
where
    F: FnMut(LifecycleEvent) + Send,
{
    fn report(&mut self, event: LifecycleEvent) {
        self(event)
    }
}

/// Holding-state tracker.
#[derive(Default)]
pub struct Intermission {
    on: bool,
    last: Option<LifecycleEvent>,
    reporter: Option<Box<dyn LifecycleReporter>>,
}

impl Intermission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(reporter: Box<dyn LifecycleReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            ..Self::default()
        }
    }

    /// Whether the host should show its holding state.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Most recent transition.
    pub fn last_event(&self) -> Option<LifecycleEvent> {
        self.last
    }

    pub fn signal_starting(&mut self) {
        self.emit(LifecycleEvent::Starting);
        self.set_on(true);
    }

    pub fn signal_connected(&mut self) {
        self.emit(LifecycleEvent::Connected);
        self.set_on(false);
    }

    pub fn signal_disconnect(&mut self) {
        self.emit(LifecycleEvent::Disconnected);
        self.set_on(true);
    }

    pub fn signal_error(&mut self) {
        self.emit(LifecycleEvent::Error);
        self.set_on(true);
    }

    /// Raise or lower the holding state; no-op when unchanged.
    pub fn set_on(&mut self, on: bool) {
        if self.on == on {
            return;
        }
        self.on = on;
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.holding_changed(on);
        }
    }

    fn emit(&mut self, event: LifecycleEvent) {
        self.last = Some(event);
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.report(event);
        }
    }
}

impl fmt::Debug for Intermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intermission")
            .field("on", &self.on)
            .field("last", &self.last)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}
