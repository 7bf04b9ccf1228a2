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

//! Socket transport contract consumed by the profile engines.
//!
//! A transport starts connects and listens and enqueues outgoing bytes.
//! Everything it observes comes back as [`SocketEvent`]s on the channel it
//! was created with, so the protocol task sees one ordered event stream per
//! socket.

#[cfg(feature = "bluez")]
mod bluez;
mod memory;

use uuid::Uuid;

use crate::address::BluetoothAddress;
use crate::error::Result;

#[cfg(feature = "bluez")]
pub use bluez::BluezTransport;
pub use memory::{MemoryTransport, TransportCall};

/// Object Push service class.
pub const OBJECT_PUSH_UUID: Uuid = Uuid::from_u128(0x00001105_0000_1000_8000_00805F9B34FB);

/// Headset service class.
pub const HEADSET_UUID: Uuid = Uuid::from_u128(0x00001108_0000_1000_8000_00805F9B34FB);

/// Hands-Free service class.
pub const HANDSFREE_UUID: Uuid = Uuid::from_u128(0x0000111E_0000_1000_8000_00805F9B34FB);

/// Hands-Free Audio Gateway service class.
pub const HANDSFREE_AG_UUID: Uuid = Uuid::from_u128(0x0000111F_0000_1000_8000_00805F9B34FB);

/// Link type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Rfcomm,
    Sco,
}

/// Parameters for an outgoing connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub address: BluetoothAddress,
    pub service: Uuid,
    pub channel: u8,
    pub channel_type: ChannelType,
    pub encrypt: bool,
    pub authenticate: bool,
}

/// Parameters for accepting one incoming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenRequest {
    pub channel: u8,
    pub channel_type: ChannelType,
    pub encrypt: bool,
    pub authenticate: bool,
}

/// Everything a transport reports back to the protocol task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Bytes read from the socket, split at arbitrary boundaries.
    Received(Vec<u8>),
    /// An outgoing connect completed or an incoming connection was accepted.
    ConnectSuccess,
    /// An outgoing connect or a listen failed.
    ConnectError(String),
    /// The link went down, locally or remotely.
    Disconnect,
}

/// A socket owned by one profile manager.
///
/// `send` may be called from any thread, in particular from the ring
/// worker, and must not block.
pub trait Transport: Send + Sync {
    /// Start connecting. Completion arrives as `ConnectSuccess` or
    /// `ConnectError`.
    fn connect(&self, request: ConnectRequest) -> Result<()>;

    /// Accept the next incoming connection on a channel.
    fn listen(&self, request: ListenRequest) -> Result<()>;

    /// Enqueue bytes for the connected peer.
    fn send(&self, data: Vec<u8>) -> Result<()>;

    /// Drop the current connection or listener.
    fn close(&self);

    /// Address of the connected peer, [`BluetoothAddress::ANY`] when idle.
    fn remote_address(&self) -> BluetoothAddress;
}
