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

//! BlueZ RFCOMM transport.

use bluer::rfcomm::{Security, SecurityLevel, Socket, SocketAddr, Stream};
use bluer::Address;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ChannelType, ConnectRequest, ListenRequest, SocketEvent, Transport};
use crate::address::BluetoothAddress;
use crate::error::{ProfileError, Result};

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Default)]
struct Link {
    task: Option<JoinHandle<()>>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
    remote: Option<BluetoothAddress>,
}

/// One RFCOMM socket, client or server side.
pub struct BluezTransport {
    link: Arc<Mutex<Link>>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl BluezTransport {
    pub fn new(events: mpsc::UnboundedSender<SocketEvent>) -> Self {
        Self {
            link: Arc::new(Mutex::new(Link::default())),
            events,
        }
    }

    fn replace_task(&self, task: JoinHandle<()>) {
        if let Some(old) = self.link.lock().task.replace(task) {
            old.abort();
        }
    }
}

fn security(encrypt: bool, authenticate: bool) -> Security {
    let level = match (authenticate, encrypt) {
        (true, true) => SecurityLevel::Medium,
        (false, true) => SecurityLevel::Low,
        _ => SecurityLevel::Sdp,
    };
    Security { level, key_size: 0 }
}

fn reject_sco(channel_type: ChannelType) -> Result<()> {
    match channel_type {
        ChannelType::Rfcomm => Ok(()),
        ChannelType::Sco => Err(ProfileError::transport(
            "SCO sockets are not available through the RFCOMM transport",
        )),
    }
}

/// Pump one connected stream until either side closes it.
async fn run_stream(
    stream: Stream,
    remote: BluetoothAddress,
    link: Arc<Mutex<Link>>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    {
        let mut link = link.lock();
        link.writer = Some(write_tx);
        link.remote = Some(remote);
    }
    info!("RFCOMM link up with {}", remote);
    let _ = events.send(SocketEvent::ConnectSuccess);

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("RFCOMM link closed by {}", remote);
                    break;
                }
                Ok(n) => {
                    debug!("Read {} bytes from {}", n, remote);
                    let _ = events.send(SocketEvent::Received(buf[..n].to_vec()));
                }
                Err(e) => {
                    warn!("RFCOMM read error: {}", e);
                    break;
                }
            },
            Some(data) = write_rx.recv() => {
                if let Err(e) = writer.write_all(&data).await {
                    warn!("RFCOMM write error: {}", e);
                    break;
                }
            }
        }
    }

    {
        let mut link = link.lock();
        link.writer = None;
        link.remote = None;
    }
    let _ = events.send(SocketEvent::Disconnect);
}

impl Transport for BluezTransport {
    fn connect(&self, request: ConnectRequest) -> Result<()> {
        reject_sco(request.channel_type)?;

        let link = self.link.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let target = SocketAddr::new(Address(*request.address.as_bytes()), request.channel);
            let connected = async {
                let socket = Socket::new()?;
                socket.set_security(security(request.encrypt, request.authenticate))?;
                socket.connect(target).await
            }
            .await;

            match connected {
                Ok(stream) => run_stream(stream, request.address, link, events).await,
                Err(e) => {
                    error!("RFCOMM connect to {} failed: {}", request.address, e);
                    let _ = events.send(SocketEvent::ConnectError(e.to_string()));
                }
            }
        });
        self.replace_task(task);
        info!(
            "Connecting to {} (service {}, channel {})",
            request.address, request.service, request.channel
        );
        Ok(())
    }

    fn listen(&self, request: ListenRequest) -> Result<()> {
        reject_sco(request.channel_type)?;

        let socket = Socket::new().map_err(ProfileError::transport)?;
        socket
            .set_security(security(request.encrypt, request.authenticate))
            .map_err(ProfileError::transport)?;
        socket
            .bind(SocketAddr::new(Address::any(), request.channel))
            .map_err(ProfileError::transport)?;
        let listener = socket.listen(1).map_err(ProfileError::transport)?;
        info!("RFCOMM listening on channel {}", request.channel);

        let link = self.link.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let remote = BluetoothAddress::new(peer.addr.0);
                    run_stream(stream, remote, link, events).await;
                }
                Err(e) => {
                    error!("RFCOMM accept failed: {}", e);
                    let _ = events.send(SocketEvent::ConnectError(e.to_string()));
                }
            }
        });
        self.replace_task(task);
        Ok(())
    }

    fn send(&self, data: Vec<u8>) -> Result<()> {
        let link = self.link.lock();
        let writer = link.writer.as_ref().ok_or(ProfileError::NotConnected)?;
        writer
            .send(data)
            .map_err(|_| ProfileError::transport("RFCOMM writer closed"))
    }

    fn close(&self) {
        let was_connected = {
            let mut link = self.link.lock();
            if let Some(task) = link.task.take() {
                task.abort();
            }
            link.writer = None;
            link.remote.take().is_some()
        };
        if was_connected {
            let _ = self.events.send(SocketEvent::Disconnect);
        }
    }

    fn remote_address(&self) -> BluetoothAddress {
        self.link.lock().remote.unwrap_or(BluetoothAddress::ANY)
    }
}
