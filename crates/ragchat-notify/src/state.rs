use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SocketConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Everything that can happen to a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketInput {
    /// Caller asked for a connection
    Connect,
    /// Transport handshake succeeded
    Opened,
    /// Transport closed or failed, including a failed handshake
    Closed,
    /// Caller asked to close for good
    CloseRequested,
    /// Reconnect timer fired
    RetryElapsed,
}

/// Side effects the driver must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAction {
    OpenTransport,
    CloseTransport,
    StartHeartbeat,
    StopHeartbeat,
    ScheduleReconnect { delay: Duration, attempt: u32 },
    CancelReconnect,
    GiveUp { attempts: u32 },
}

/// Connection lifecycle without any I/O
///
/// `handle` maps one input to the next state and the actions to run, in order. Inputs that make
/// no sense in the current state are ignored and produce no actions.
#[derive(Debug, Clone)]
pub struct SocketMachine {
    state: ConnectionState,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    reconnect_enabled: bool,
    retry_pending: bool,
    gave_up: bool,
}

impl SocketMachine {
    pub fn new(config: &SocketConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay,
            reconnect_enabled: true,
            retry_pending: false,
            gave_up: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// False once `close()` was requested
    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// The attempt bound was exhausted; only an explicit `Connect` starts over
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    pub fn handle(&mut self, input: SocketInput) -> Vec<SocketAction> {
        use ConnectionState::*;

        let mut actions = Vec::new();

        match (self.state, input) {
            (Disconnected, SocketInput::Connect) => {
                if self.retry_pending {
                    self.retry_pending = false;
                    actions.push(SocketAction::CancelReconnect);
                }
                if self.gave_up {
                    self.gave_up = false;
                    self.reconnect_attempts = 0;
                }
                self.state = Connecting;
                actions.push(SocketAction::OpenTransport);
            }

            (Disconnected, SocketInput::RetryElapsed) if self.retry_pending => {
                self.retry_pending = false;
                self.state = Connecting;
                actions.push(SocketAction::OpenTransport);
            }

            (Connecting, SocketInput::Opened) => {
                self.state = Open;
                self.reconnect_attempts = 0;
                actions.push(SocketAction::StartHeartbeat);
            }

            (Connecting | Open, SocketInput::Closed) => {
                self.state = Disconnected;
                actions.push(SocketAction::StopHeartbeat);

                if !self.reconnect_enabled {
                    return actions;
                }

                if self.reconnect_attempts < self.max_reconnect_attempts {
                    self.reconnect_attempts += 1;
                    self.retry_pending = true;
                    actions.push(SocketAction::ScheduleReconnect {
                        delay: self.reconnect_delay,
                        attempt: self.reconnect_attempts,
                    });
                } else {
                    self.gave_up = true;
                    actions.push(SocketAction::GiveUp {
                        attempts: self.reconnect_attempts,
                    });
                }
            }

            (Closing, SocketInput::Closed) => {
                self.state = Disconnected;
            }

            (state, SocketInput::CloseRequested) => {
                self.reconnect_enabled = false;
                if self.retry_pending {
                    self.retry_pending = false;
                    actions.push(SocketAction::CancelReconnect);
                }
                if matches!(state, Connecting | Open) {
                    self.state = Closing;
                    actions.push(SocketAction::StopHeartbeat);
                    actions.push(SocketAction::CloseTransport);
                }
            }

            (state, input) => {
                tracing::debug!(?state, ?input, "Ignoring socket input");
            }
        }

        actions
    }
}
