//! Connectivity state tracking.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and connected to the remote service.
    Online,
    /// Offline (network unreachable or remote service unavailable).
    Offline,
}

/// Mutable connectivity state, shared between the worker and the adapter.
#[derive(Debug)]
pub struct Connectivity {
    state: ConnectivityState,
}

impl Connectivity {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Online,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn set_offline(&mut self) {
        self.state = ConnectivityState::Offline;
    }

    pub fn set_online(&mut self) {
        self.state = ConnectivityState::Online;
    }

    pub fn is_offline(&self) -> bool {
        self.state == ConnectivityState::Offline
    }

    /// Ensure the client is online; return error if offline.
    pub fn require_online(&self) -> Result<(), SyncError> {
        if self.is_offline() {
            Err(SyncError::Offline)
        } else {
            Ok(())
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}
