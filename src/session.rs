// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection lifecycle shared by every profile manager.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::address::BluetoothAddress;
use crate::error::{ProfileError, Result};
use crate::transport::{ConnectRequest, ListenRequest, Transport};

/// Reply channel for an outstanding connect.
pub type ReplyHandle = oneshot::Sender<Result<()>>;

/// Socket status of a profile connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    Disconnected,
    Listening,
    Connecting,
    Connected,
}

impl SocketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketStatus::Disconnected => "Disconnected",
            SocketStatus::Listening => "Listening",
            SocketStatus::Connecting => "Connecting...",
            SocketStatus::Connected => "Connected",
        }
    }
}

/// Which side of which profile a connection serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRole {
    Handsfree,
    Headset,
    OppClient,
    OppServer,
    Sco,
}

/// One connection to one remote device.
///
/// Owns the pending connect reply so it is delivered exactly once, and
/// remembers the listen parameters so the manager can go back to listening
/// after every disconnect.
pub struct ProfileSession {
    role: ProfileRole,
    status: SocketStatus,
    transport: Arc<dyn Transport>,
    remote: BluetoothAddress,
    pending: Option<ReplyHandle>,
    listen: Option<ListenRequest>,
}

impl ProfileSession {
    pub fn new(role: ProfileRole, transport: Arc<dyn Transport>) -> Self {
        Self {
            role,
            status: SocketStatus::Disconnected,
            transport,
            remote: BluetoothAddress::ANY,
            pending: None,
            listen: None,
        }
    }

    pub fn role(&self) -> ProfileRole {
        self.role
    }

    pub fn set_role(&mut self, role: ProfileRole) {
        self.role = role;
    }

    pub fn status(&self) -> SocketStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == SocketStatus::Connected
    }

    /// Address cached when the connection came up. It stays readable after
    /// the transport has dropped the link, until [`on_disconnect`] runs.
    ///
    /// [`on_disconnect`]: ProfileSession::on_disconnect
    pub fn remote_address(&self) -> BluetoothAddress {
        self.remote
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start an outgoing connection.
    ///
    /// Fails with `AlreadyActive` through `reply` without touching the
    /// transport when a connection already exists or is being set up.
    /// Without a reply, failures are only logged.
    pub fn connect(&mut self, request: ConnectRequest, reply: Option<ReplyHandle>) {
        if matches!(
            self.status,
            SocketStatus::Connected | SocketStatus::Connecting
        ) {
            warn!("{:?} already connected or connecting", self.role);
            if let Some(reply) = reply {
                let _ = reply.send(Err(ProfileError::AlreadyActive));
            }
            return;
        }

        if self.status == SocketStatus::Listening {
            self.transport.close();
        }

        match self.transport.connect(request) {
            Ok(()) => {
                self.status = SocketStatus::Connecting;
                self.pending = reply;
            }
            Err(e) => {
                warn!("{:?} connect failed: {}", self.role, e);
                if let Some(reply) = reply {
                    let _ = reply.send(Err(e));
                }
                self.resume_listening();
            }
        }
    }

    /// Accept incoming connections with `request`, and again after every
    /// disconnect.
    pub fn listen(&mut self, request: ListenRequest) -> Result<()> {
        self.listen = Some(request);
        match self.status {
            SocketStatus::Listening => {
                debug!("{:?} already listening", self.role);
                Ok(())
            }
            SocketStatus::Disconnected => self.start_listening(),
            SocketStatus::Connected | SocketStatus::Connecting => Err(ProfileError::AlreadyActive),
        }
    }

    /// Close the connection. Returns false when there was none; a listening
    /// socket stays open.
    pub fn disconnect(&mut self) -> bool {
        if matches!(
            self.status,
            SocketStatus::Disconnected | SocketStatus::Listening
        ) {
            debug!("{:?} has no connection to close", self.role);
            return false;
        }
        self.transport.close();
        true
    }

    /// Stop listening for good and close any connection. The caller still
    /// runs its disconnect cleanup afterwards.
    pub fn shutdown(&mut self) {
        self.listen = None;
        match self.status {
            SocketStatus::Disconnected => {}
            SocketStatus::Listening => {
                self.transport.close();
                self.status = SocketStatus::Disconnected;
            }
            SocketStatus::Connecting | SocketStatus::Connected => self.transport.close(),
        }
    }

    pub fn send(&self, data: Vec<u8>) -> Result<()> {
        self.transport.send(data)
    }

    /// The transport reported `ConnectSuccess`.
    pub fn on_connect_success(&mut self) {
        self.status = SocketStatus::Connected;
        self.remote = self.transport.remote_address();
        info!("{:?} connected to {}", self.role, self.remote);
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(Ok(()));
        }
    }

    /// The transport reported `ConnectError`. The reply fails, the socket is
    /// closed and listening resumes.
    pub fn on_connect_error(&mut self, reason: &str) {
        warn!("{:?} connect error: {}", self.role, reason);
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(Err(ProfileError::transport(reason)));
        }
        self.transport.close();
        self.status = SocketStatus::Disconnected;
        self.resume_listening();
    }

    /// The link went down. Returns true only when a connection was up, so
    /// callers run their cleanup once even if the transport echoes a
    /// disconnect the manager already handled.
    pub fn on_disconnect(&mut self) -> bool {
        let was_connected = self.status == SocketStatus::Connected;
        if matches!(
            self.status,
            SocketStatus::Disconnected | SocketStatus::Listening
        ) {
            return false;
        }
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(Err(ProfileError::transport("disconnected while connecting")));
        }
        info!("{:?} disconnected from {}", self.role, self.remote);
        self.status = SocketStatus::Disconnected;
        self.remote = BluetoothAddress::ANY;
        self.resume_listening();
        was_connected
    }

    fn start_listening(&mut self) -> Result<()> {
        let Some(request) = self.listen.clone() else {
            return Ok(());
        };
        self.transport.listen(request)?;
        self.status = SocketStatus::Listening;
        Ok(())
    }

    fn resume_listening(&mut self) {
        if let Err(e) = self.start_listening() {
            warn!("{:?} failed to resume listening: {}", self.role, e);
            self.status = SocketStatus::Disconnected;
        }
    }
}
