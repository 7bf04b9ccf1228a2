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

//! In-process transport for simulation and tests.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ConnectRequest, ListenRequest, SocketEvent, Transport};
use crate::address::BluetoothAddress;
use crate::error::{ProfileError, Result};

/// A call made on the transport by a profile manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect(ConnectRequest),
    Listen(ListenRequest),
    Close,
}

#[derive(Debug, Default)]
struct MemoryState {
    calls: Vec<TransportCall>,
    sent: Vec<Vec<u8>>,
    remote: Option<BluetoothAddress>,
}

/// Records everything the engine does and lets the caller play the peer.
///
/// The peer side is driven with [`complete_connect`], [`deliver`] and
/// [`remote_disconnect`], which emit the same events a real socket would.
///
/// [`complete_connect`]: MemoryTransport::complete_connect
/// [`deliver`]: MemoryTransport::deliver
/// [`remote_disconnect`]: MemoryTransport::remote_disconnect
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl MemoryTransport {
    /// Create a transport and the receiver its events arrive on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SocketEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            state: Mutex::new(MemoryState::default()),
            events,
        });
        (transport, event_rx)
    }

    /// Mark the link as up with `remote` and report `ConnectSuccess`.
    pub fn complete_connect(&self, remote: BluetoothAddress) {
        self.state.lock().remote = Some(remote);
        self.emit(SocketEvent::ConnectSuccess);
    }

    pub fn fail_connect(&self, reason: &str) {
        self.emit(SocketEvent::ConnectError(reason.to_string()));
    }

    /// Bytes arriving from the peer.
    pub fn deliver(&self, data: &[u8]) {
        self.emit(SocketEvent::Received(data.to_vec()));
    }

    /// The peer dropped the link.
    pub fn remote_disconnect(&self) {
        self.state.lock().remote = None;
        self.emit(SocketEvent::Disconnect);
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().remote.is_some()
    }

    /// Drain the buffers sent so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().sent)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    fn emit(&self, event: SocketEvent) {
        if self.events.send(event).is_err() {
            debug!("Memory transport event dropped, receiver closed");
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, request: ConnectRequest) -> Result<()> {
        debug!("Memory transport connect to {}", request.address);
        self.state.lock().calls.push(TransportCall::Connect(request));
        Ok(())
    }

    fn listen(&self, request: ListenRequest) -> Result<()> {
        debug!("Memory transport listen on channel {}", request.channel);
        self.state.lock().calls.push(TransportCall::Listen(request));
        Ok(())
    }

    fn send(&self, data: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        if state.remote.is_none() {
            return Err(ProfileError::NotConnected);
        }
        state.sent.push(data);
        Ok(())
    }

    fn close(&self) {
        let was_connected = {
            let mut state = self.state.lock();
            state.calls.push(TransportCall::Close);
            state.remote.take().is_some()
        };
        if was_connected {
            self.emit(SocketEvent::Disconnect);
        }
    }

    fn remote_address(&self) -> BluetoothAddress {
        self.state.lock().remote.unwrap_or(BluetoothAddress::ANY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelType;

    #[test]
    fn test_records_calls_and_sends() {
        let (transport, mut events) = MemoryTransport::new();
        let addr = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);

        transport
            .listen(ListenRequest {
                channel: 10,
                channel_type: ChannelType::Rfcomm,
                encrypt: true,
                authenticate: true,
            })
            .unwrap();
        assert!(matches!(transport.send(vec![1]), Err(ProfileError::NotConnected)));

        transport.complete_connect(addr);
        assert_eq!(events.try_recv().unwrap(), SocketEvent::ConnectSuccess);
        assert_eq!(transport.remote_address(), addr);

        transport.send(vec![0x80, 0x00, 0x03]).unwrap();
        assert_eq!(transport.take_sent(), vec![vec![0x80, 0x00, 0x03]]);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_close_reports_disconnect_once() {
        let (transport, mut events) = MemoryTransport::new();
        transport.complete_connect(BluetoothAddress::new([9; 6]));
        let _ = events.try_recv();

        transport.close();
        transport.close();
        assert_eq!(events.try_recv().unwrap(), SocketEvent::Disconnect);
        assert!(events.try_recv().is_err());
        assert_eq!(transport.remote_address(), BluetoothAddress::ANY);
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Close, TransportCall::Close]
        );
    }
}
