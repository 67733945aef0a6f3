//! Connection status and its transitions.

/// Whether a peer is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Link {
    #[default]
    Down,
    Up,
}

/// What the remote announced it is about to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    None,
    Reconnecting,
    Disconnecting,
}

/// Named combinations of the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Linked, waiting for START.
    AwaitingStart,
    /// Started, the init callback has not been delivered yet.
    AwaitingInit,
    Initialized,
    Reconnecting,
    Disconnecting,
}

/// Operations gated on the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Send the per-tick heartbeat.
    Heartbeat,
    /// Forward a host callback.
    PublicCall,
}

/// Why the link went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// Requested by the caller, e.g. for a reconnect. Keeps the registries.
    Expected,
    /// The remote announced it was leaving.
    Declared,
    /// Anything else.
    Unexpected,
}

impl DisconnectCause {
    /// Whether the native and callback tables are dropped.
    pub fn clears_registries(self) -> bool {
        !matches!(self, DisconnectCause::Expected)
    }
}

/// Session status. Empty on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    link: Link,
    started: bool,
    client_init: bool,
    host_init: bool,
    intent: Intent,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn is_link_up(&self) -> bool {
        self.link == Link::Up
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The remote has been delivered the init callback.
    pub fn has_client_init(&self) -> bool {
        self.client_init
    }

    /// The host script is running (init seen, exit not yet).
    pub fn has_host_init(&self) -> bool {
        self.host_init
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn state(&self) -> SessionState {
        match (self.link, self.intent) {
            (_, Intent::Reconnecting) => SessionState::Reconnecting,
            (Link::Down, _) => SessionState::Disconnected,
            (Link::Up, Intent::Disconnecting) => SessionState::Disconnecting,
            (Link::Up, Intent::None) if !self.started => SessionState::AwaitingStart,
            (Link::Up, Intent::None) if !self.client_init => SessionState::AwaitingInit,
            (Link::Up, Intent::None) => SessionState::Initialized,
        }
    }

    /// Transition table.
    pub fn permits(&self, op: Operation) -> bool {
        let live = self.is_link_up() && self.started && self.intent == Intent::None;
        match op {
            Operation::Heartbeat => live && self.client_init,
            Operation::PublicCall => live,
        }
    }

    /// Classify a disconnect request.
    pub fn disconnect_cause(&self, expected: bool) -> DisconnectCause {
        if expected {
            DisconnectCause::Expected
        } else if self.intent == Intent::Disconnecting {
            DisconnectCause::Declared
        } else {
            DisconnectCause::Unexpected
        }
    }

    /// The link came up; returns whether this completes a reconnect.
    pub fn on_connected(&mut self) -> bool {
        self.link = Link::Up;
        let reconnected = self.intent == Intent::Reconnecting;
        if reconnected {
            self.intent = Intent::None;
        }
        reconnected
    }

    pub fn on_start(&mut self) {
        self.started = true;
    }

    pub fn on_reconnect_requested(&mut self) {
        self.intent = Intent::Reconnecting;
    }

    pub fn on_disconnect_requested(&mut self) {
        self.intent = Intent::Disconnecting;
    }

    /// Apply a disconnect. The link is cleared last.
    ///
    /// The client-init flag is kept across disconnects.
    pub fn on_disconnected(&mut self, cause: DisconnectCause) {
        match cause {
            DisconnectCause::Expected => {}
            DisconnectCause::Declared => {
                self.started = false;
                self.intent = Intent::None;
            }
            DisconnectCause::Unexpected => {
                self.started = false;
            }
        }
        self.link = Link::Down;
    }

    pub fn on_host_init(&mut self) {
        self.host_init = true;
    }

    pub fn on_host_exit(&mut self) {
        self.host_init = false;
    }

    pub fn on_client_init(&mut self) {
        self.client_init = true;
    }
}
