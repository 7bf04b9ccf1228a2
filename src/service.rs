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

//! The protocol task.
//!
//! [`ProfileService`] owns the OPP and HFP managers and serializes every
//! socket event, finished chunk read and API command through one loop.
//! Callers talk to it through a cloneable [`ServiceHandle`].

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::address::BluetoothAddress;
use crate::error::{ProfileError, Result};
use crate::events::Broadcaster;
use crate::hfp::{CallInfo, CallState, HfpManager, HfpRole, HfpSettings, Indicator};
use crate::opp::{Blob, ChunkRead, OppManager, OppSettings};
use crate::transport::{SocketEvent, Transport};

/// A transport and the receiver its events arrive on.
pub struct Link {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl Link {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> Self {
        Self { transport, events }
    }
}

/// One socket per profile.
pub struct ProfileLinks {
    pub opp: Link,
    pub hfp: Link,
    pub sco: Link,
}

type Reply = oneshot::Sender<Result<()>>;

/// Requests handled by the protocol task.
pub enum ServiceCommand {
    ConnectOpp {
        address: BluetoothAddress,
        reply: Reply,
    },
    DisconnectOpp,
    SendFile {
        blob: Arc<dyn Blob>,
        reply: Reply,
    },
    StopSendingFile {
        reply: Reply,
    },
    ConfirmReceivingFile {
        accept: bool,
        reply: Reply,
    },
    ConnectHfp {
        address: BluetoothAddress,
        role: HfpRole,
        reply: Reply,
    },
    DisconnectHfp,
    CallStateChanged(CallState),
    EnumerateCalls(Vec<CallInfo>),
    SetIndicator(Indicator, u8),
    SetSpeakerVolume(f32),
    Shutdown,
}

/// Cloneable front end of a running [`ProfileService`].
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::UnboundedSender<ServiceCommand>,
}

impl ServiceHandle {
    pub async fn connect_opp(&self, address: BluetoothAddress) -> Result<()> {
        self.request(|reply| ServiceCommand::ConnectOpp { address, reply })
            .await
    }

    pub fn disconnect_opp(&self) -> Result<()> {
        self.send(ServiceCommand::DisconnectOpp)
    }

    pub async fn send_file(&self, blob: Arc<dyn Blob>) -> Result<()> {
        self.request(|reply| ServiceCommand::SendFile { blob, reply })
            .await
    }

    pub async fn stop_sending_file(&self) -> Result<()> {
        self.request(|reply| ServiceCommand::StopSendingFile { reply })
            .await
    }

    pub async fn confirm_receiving_file(&self, accept: bool) -> Result<()> {
        self.request(|reply| ServiceCommand::ConfirmReceivingFile { accept, reply })
            .await
    }

    pub async fn connect_hfp(&self, address: BluetoothAddress, role: HfpRole) -> Result<()> {
        self.request(|reply| ServiceCommand::ConnectHfp {
            address,
            role,
            reply,
        })
        .await
    }

    pub fn disconnect_hfp(&self) -> Result<()> {
        self.send(ServiceCommand::DisconnectHfp)
    }

    pub fn call_state_changed(&self, state: CallState) -> Result<()> {
        self.send(ServiceCommand::CallStateChanged(state))
    }

    pub fn enumerate_calls(&self, calls: Vec<CallInfo>) -> Result<()> {
        self.send(ServiceCommand::EnumerateCalls(calls))
    }

    pub fn set_indicator(&self, indicator: Indicator, value: u8) -> Result<()> {
        self.send(ServiceCommand::SetIndicator(indicator, value))
    }

    pub fn set_speaker_volume(&self, volume: f32) -> Result<()> {
        self.send(ServiceCommand::SetSpeakerVolume(volume))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ServiceCommand::Shutdown)
    }

    fn send(&self, command: ServiceCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| ProfileError::ServiceStopped)
    }

    async fn request(&self, command: impl FnOnce(Reply) -> ServiceCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| ProfileError::ServiceStopped)?
    }
}

pub struct ProfileService {
    opp: OppManager,
    hfp: HfpManager,
    opp_events: mpsc::UnboundedReceiver<SocketEvent>,
    hfp_events: mpsc::UnboundedReceiver<SocketEvent>,
    sco_events: mpsc::UnboundedReceiver<SocketEvent>,
    chunks: mpsc::UnboundedReceiver<ChunkRead>,
    commands: mpsc::UnboundedReceiver<ServiceCommand>,
}

impl ProfileService {
    pub fn new(
        links: ProfileLinks,
        broadcaster: Broadcaster,
        opp_settings: OppSettings,
        hfp_settings: HfpSettings,
    ) -> (Self, ServiceHandle) {
        let (chunk_tx, chunks) = mpsc::unbounded_channel();
        let (tx, commands) = mpsc::unbounded_channel();
        let opp = OppManager::new(
            links.opp.transport,
            broadcaster.clone(),
            chunk_tx,
            opp_settings,
        );
        let hfp = HfpManager::new(
            links.hfp.transport,
            links.sco.transport,
            broadcaster,
            hfp_settings,
        );
        let service = Self {
            opp,
            hfp,
            opp_events: links.opp.events,
            hfp_events: links.hfp.events,
            sco_events: links.sco.events,
            chunks,
            commands,
        };
        (service, ServiceHandle { tx })
    }

    /// Listen on the OPP and HFP channels.
    pub fn start_listening(&mut self) -> Result<()> {
        self.opp.listen()?;
        self.hfp.listen()?;
        Ok(())
    }

    /// Process events until shut down or every handle is dropped.
    pub async fn run(mut self) {
        info!("Profile service running");
        loop {
            tokio::select! {
                Some(event) = self.opp_events.recv() => self.on_opp_event(event),
                Some(event) = self.hfp_events.recv() => self.on_hfp_event(event),
                Some(event) = self.sco_events.recv() => self.on_sco_event(event),
                Some(read) = self.chunks.recv() => self.opp.on_chunk_read(read),
                command = self.commands.recv() => match command {
                    Some(ServiceCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        self.opp.shutdown();
        self.hfp.shutdown();
        info!("Profile service stopped");
    }

    fn on_opp_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Received(data) => self.opp.receive_socket_data(&data),
            SocketEvent::ConnectSuccess => self.opp.on_connect_success(),
            SocketEvent::ConnectError(reason) => self.opp.on_connect_error(&reason),
            SocketEvent::Disconnect => self.opp.on_disconnect(),
        }
    }

    fn on_hfp_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Received(data) => self.hfp.receive_socket_data(&data),
            SocketEvent::ConnectSuccess => self.hfp.on_connect_success(),
            SocketEvent::ConnectError(reason) => self.hfp.on_connect_error(&reason),
            SocketEvent::Disconnect => self.hfp.on_disconnect(),
        }
    }

    fn on_sco_event(&mut self, event: SocketEvent) {
        let sco = self.hfp.sco();
        match event {
            SocketEvent::Received(data) => debug!("Ignoring {} SCO bytes", data.len()),
            SocketEvent::ConnectSuccess => sco.on_connect_success(),
            SocketEvent::ConnectError(reason) => sco.on_connect_error(&reason),
            SocketEvent::Disconnect => sco.on_disconnect(),
        }
    }

    fn handle_command(&mut self, command: ServiceCommand) {
        match command {
            ServiceCommand::ConnectOpp { address, reply } => self.opp.connect(address, reply),
            ServiceCommand::DisconnectOpp => self.opp.disconnect(),
            ServiceCommand::SendFile { blob, reply } => {
                respond(reply, self.opp.send_file(blob));
            }
            ServiceCommand::StopSendingFile { reply } => {
                respond(reply, self.opp.stop_sending_file());
            }
            ServiceCommand::ConfirmReceivingFile { accept, reply } => {
                respond(reply, self.opp.confirm_receiving_file(accept));
            }
            ServiceCommand::ConnectHfp {
                address,
                role,
                reply,
            } => self.hfp.connect(address, role, reply),
            ServiceCommand::DisconnectHfp => self.hfp.disconnect(),
            ServiceCommand::CallStateChanged(state) => self.hfp.call_state_changed(state),
            ServiceCommand::EnumerateCalls(calls) => self.hfp.enumerate_calls(&calls),
            ServiceCommand::SetIndicator(indicator, value) => {
                self.hfp.set_indicator(indicator, value)
            }
            ServiceCommand::SetSpeakerVolume(volume) => self.hfp.set_speaker_volume(volume),
            ServiceCommand::Shutdown => {}
        }
    }
}

fn respond(reply: Reply, result: Result<()>) {
    if let Err(e) = &result {
        warn!("Request failed: {}", e);
    }
    let _ = reply.send(result);
}
