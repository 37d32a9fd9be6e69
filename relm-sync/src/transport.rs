//! Transport pass-through.
//!
//! The provider that moves document updates between replicas lives outside
//! this crate. The engine only forwards connect/disconnect requests and reports
//! the provider's status; updates themselves travel through
//! [`WorldSync::take_updates`](crate::WorldSync::take_updates) and
//! [`WorldSync::apply_update`](crate::WorldSync::apply_update).

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        })
    }
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Server endpoint.
    pub url: String,
    /// Shared document (room) name.
    pub room: String,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            room: room.into(),
        }
    }
}

/// A document transport.
pub trait Provider: Send {
    /// Begins connecting. The status moves through `Connecting`.
    fn connect(&mut self, options: &ConnectOptions) -> SyncResult<()>;

    fn disconnect(&mut self) -> SyncResult<()>;

    fn status(&self) -> ConnectionStatus;
}

/// A scripted provider for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::sync::{Arc, Mutex};

    /// Records every request and lets the test drive the status.
    #[derive(Debug, Clone, Default)]
    pub struct MockProvider {
        state: Arc<Mutex<MockState>>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        status: ConnectionStatus,
        connects: Vec<ConnectOptions>,
        disconnects: usize,
        refuse: bool,
    }

    impl MockProvider {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent connects fail.
        pub fn refuse_connections(&self) {
            if let Ok(mut state) = self.state.lock() {
                state.refuse = true;
            }
        }

        /// Simulates the server accepting the connection.
        pub fn complete_connection(&self) {
            if let Ok(mut state) = self.state.lock()
                && state.status == ConnectionStatus::Connecting
            {
                state.status = ConnectionStatus::Connected;
            }
        }

        /// Options of every connect call so far.
        #[must_use]
        pub fn connects(&self) -> Vec<ConnectOptions> {
            self.state
                .lock()
                .map(|s| s.connects.clone())
                .unwrap_or_default()
        }

        #[must_use]
        pub fn disconnects(&self) -> usize {
            self.state.lock().map(|s| s.disconnects).unwrap_or_default()
        }
    }

    impl Provider for MockProvider {
        fn connect(&mut self, options: &ConnectOptions) -> SyncResult<()> {
            let mut state = self
                .state
                .lock()
                .map_err(|_| SyncError::Transport("mock state poisoned".into()))?;
            if state.refuse {
                return Err(SyncError::Transport(format!("refused: {}", options.url)));
            }
            state.connects.push(options.clone());
            state.status = ConnectionStatus::Connecting;
            Ok(())
        }

        fn disconnect(&mut self) -> SyncResult<()> {
            let mut state = self
                .state
                .lock()
                .map_err(|_| SyncError::Transport("mock state poisoned".into()))?;
            state.disconnects += 1;
            state.status = ConnectionStatus::Disconnected;
            Ok(())
        }

        fn status(&self) -> ConnectionStatus {
            self.state
                .lock()
                .map(|s| s.status)
                .unwrap_or(ConnectionStatus::Disconnected)
        }
    }
}
