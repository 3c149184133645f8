//! Connection states and the indicator shown to users.

use std::fmt;

/// Lifecycle of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Subscription requested, not yet confirmed.
    Opening,
    /// The server confirmed the subscription.
    Live,
    /// Remote error/close, or disposed by the owner. Terminal.
    Terminated,
}

/// Lifecycle of a supervised resource stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Live,
    Reconnecting,
    /// Stopped explicitly. Terminal.
    Closed,
}

impl SupervisorState {
    pub fn label(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Connecting => "connecting",
            SupervisorState::Live => "live",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::Closed => "closed",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Connectivity of one resource, as published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: SupervisorState,
    /// User-visible connectivity error; cleared once the stream is live.
    pub error: Option<String>,
    /// Reconnect attempts since the stream was last live.
    pub attempt: u32,
}

impl ConnectionStatus {
    pub fn new(state: SupervisorState) -> Self {
        Self {
            state,
            error: None,
            attempt: 0,
        }
    }

    /// The indicator to show, given whether any snapshot is available.
    pub fn indicator(&self, has_snapshot: bool) -> Indicator {
        match self.state {
            SupervisorState::Closed => Indicator::Closed,
            SupervisorState::Reconnecting => Indicator::Reconnecting,
            SupervisorState::Live if has_snapshot => Indicator::Live,
            _ => Indicator::Loading,
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(SupervisorState::Idle)
    }
}

/// What the user sees for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// No data yet.
    Loading,
    /// Stream open and data present.
    Live,
    /// Connection lost, retrying automatically.
    Reconnecting,
    Closed,
}

impl Indicator {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Indicator::Loading => "LOADING",
            Indicator::Live => "LIVE",
            Indicator::Reconnecting => "RETRYING",
            Indicator::Closed => "CLOSED",
        }
    }
}
