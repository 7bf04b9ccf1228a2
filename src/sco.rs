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

//! SCO audio link that follows the call state.

use std::sync::Arc;
use tracing::{debug, info};

use crate::address::BluetoothAddress;
use crate::events::{Broadcaster, LinkStatus, SystemMessage};
use crate::session::{ProfileRole, ProfileSession, SocketStatus};
use crate::transport::{ChannelType, ConnectRequest, Transport, HANDSFREE_AG_UUID};

pub struct ScoManager {
    session: ProfileSession,
    broadcaster: Broadcaster,
    encrypt: bool,
    authenticate: bool,
}

impl ScoManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        broadcaster: Broadcaster,
        encrypt: bool,
        authenticate: bool,
    ) -> Self {
        Self {
            session: ProfileSession::new(ProfileRole::Sco, transport),
            broadcaster,
            encrypt,
            authenticate,
        }
    }

    pub fn status(&self) -> SocketStatus {
        self.session.status()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Open the audio link to `address`. Failures are logged.
    pub fn connect(&mut self, address: BluetoothAddress) {
        if matches!(
            self.session.status(),
            SocketStatus::Connected | SocketStatus::Connecting
        ) {
            debug!("SCO already up or opening");
            return;
        }
        info!("Opening SCO to {}", address);
        self.session.connect(
            ConnectRequest {
                address,
                service: HANDSFREE_AG_UUID,
                channel: 0,
                channel_type: ChannelType::Sco,
                encrypt: self.encrypt,
                authenticate: self.authenticate,
            },
            None,
        );
    }

    pub fn disconnect(&mut self) {
        if self.session.disconnect() {
            self.on_disconnect();
        }
    }

    pub fn on_connect_success(&mut self) {
        self.session.on_connect_success();
        self.broadcast(true, self.session.remote_address());
    }

    pub fn on_connect_error(&mut self, reason: &str) {
        self.session.on_connect_error(reason);
    }

    pub fn on_disconnect(&mut self) {
        let address = self.session.remote_address();
        if self.session.on_disconnect() {
            self.broadcast(false, address);
        }
    }

    fn broadcast(&self, connected: bool, address: BluetoothAddress) {
        self.broadcaster
            .broadcast(SystemMessage::ScoStatusChanged(LinkStatus { connected, address }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, TransportCall};

    const HEADSET: BluetoothAddress = BluetoothAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

    #[test]
    fn test_status_broadcast_on_open_and_close() {
        let (transport, _events) = MemoryTransport::new();
        let (broadcaster, mut messages) = Broadcaster::new();
        let mut sco = ScoManager::new(transport.clone(), broadcaster, true, true);

        sco.connect(HEADSET);
        sco.connect(HEADSET);
        assert!(matches!(
            &transport.calls()[..],
            [TransportCall::Connect(request)] if request.channel_type == ChannelType::Sco
        ));

        transport.complete_connect(HEADSET);
        sco.on_connect_success();
        assert_eq!(
            messages.try_recv().unwrap(),
            SystemMessage::ScoStatusChanged(LinkStatus { connected: true, address: HEADSET })
        );

        sco.disconnect();
        assert_eq!(
            messages.try_recv().unwrap(),
            SystemMessage::ScoStatusChanged(LinkStatus { connected: false, address: HEADSET })
        );
        sco.on_disconnect();
        assert!(messages.try_recv().is_err());
        assert_eq!(sco.status(), SocketStatus::Disconnected);
    }

    #[test]
    fn test_failed_open_is_silent() {
        let (transport, _events) = MemoryTransport::new();
        let (broadcaster, mut messages) = Broadcaster::new();
        let mut sco = ScoManager::new(transport, broadcaster, true, true);

        sco.connect(HEADSET);
        sco.on_connect_error("no SCO support");
        assert!(messages.try_recv().is_err());
        assert!(!sco.is_connected());
    }
}
