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

//! Hands-free and headset audio gateway.
//!
//! Answers the AT commands of a connected unit, reports call and network
//! indicators with `+CIEV`, rings while a call is incoming and keeps the SCO
//! audio link in step with the call.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::at::{frame, LineBuffer, MAX_VGS};
use super::indicators::{CallEffect, CallIndicatorModel, CallInfo, CallState, Indicator, IndicatorChange};
use super::interpreter::{AtAction, AtCommandInterpreter, DEFAULT_SUPPORTED_FEATURES};
use super::ring::{RingIndicator, RING_INTERVAL};
use crate::address::BluetoothAddress;
use crate::error::Result;
use crate::events::{Broadcaster, LinkStatus, SystemMessage};
use crate::sco::ScoManager;
use crate::session::{ProfileRole, ProfileSession, ReplyHandle, SocketStatus};
use crate::transport::{
    ChannelType, ConnectRequest, ListenRequest, Transport, HANDSFREE_UUID, HEADSET_UUID,
};

#[derive(Debug, Clone)]
pub struct HfpSettings {
    /// Channel of the remote hands-free service, also the one we listen on.
    pub channel: u8,
    pub headset_channel: u8,
    pub supported_features: u32,
    pub ring_interval: Duration,
    pub encrypt: bool,
    pub authenticate: bool,
}

impl Default for HfpSettings {
    fn default() -> Self {
        Self {
            channel: 13,
            headset_channel: 12,
            supported_features: DEFAULT_SUPPORTED_FEATURES,
            ring_interval: RING_INTERVAL,
            encrypt: true,
            authenticate: true,
        }
    }
}

/// Profile used for an outgoing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfpRole {
    Handsfree,
    Headset,
}

pub struct HfpManager {
    session: ProfileSession,
    broadcaster: Broadcaster,
    settings: HfpSettings,
    interpreter: AtCommandInterpreter,
    indicators: CallIndicatorModel,
    lines: LineBuffer,
    ring: RingIndicator,
    sco: ScoManager,
}

impl HfpManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        sco_transport: Arc<dyn Transport>,
        broadcaster: Broadcaster,
        settings: HfpSettings,
    ) -> Self {
        let sco = ScoManager::new(
            sco_transport,
            broadcaster.clone(),
            settings.encrypt,
            settings.authenticate,
        );
        Self {
            session: ProfileSession::new(ProfileRole::Handsfree, transport),
            broadcaster,
            interpreter: AtCommandInterpreter::new(settings.supported_features),
            indicators: CallIndicatorModel::new(),
            lines: LineBuffer::new(),
            ring: RingIndicator::new(settings.ring_interval),
            sco,
            settings,
        }
    }

    pub fn status(&self) -> SocketStatus {
        self.session.status()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn indicators(&self) -> &CallIndicatorModel {
        &self.indicators
    }

    pub fn interpreter(&self) -> &AtCommandInterpreter {
        &self.interpreter
    }

    pub fn is_ringing(&self) -> bool {
        self.ring.is_running()
    }

    pub fn sco(&mut self) -> &mut ScoManager {
        &mut self.sco
    }

    pub fn connect(&mut self, address: BluetoothAddress, role: HfpRole, reply: ReplyHandle) {
        let (profile, service, channel) = match role {
            HfpRole::Handsfree => (ProfileRole::Handsfree, HANDSFREE_UUID, self.settings.channel),
            HfpRole::Headset => (ProfileRole::Headset, HEADSET_UUID, self.settings.headset_channel),
        };
        if !matches!(
            self.session.status(),
            SocketStatus::Connected | SocketStatus::Connecting
        ) {
            self.session.set_role(profile);
        }
        self.session.connect(
            ConnectRequest {
                address,
                service,
                channel,
                channel_type: ChannelType::Rfcomm,
                encrypt: self.settings.encrypt,
                authenticate: self.settings.authenticate,
            },
            Some(reply),
        );
    }

    pub fn listen(&mut self) -> Result<()> {
        if self.session.status() == SocketStatus::Disconnected {
            self.session.set_role(ProfileRole::Handsfree);
        }
        self.session.listen(ListenRequest {
            channel: self.settings.channel,
            channel_type: ChannelType::Rfcomm,
            encrypt: self.settings.encrypt,
            authenticate: self.settings.authenticate,
        })
    }

    pub fn disconnect(&mut self) {
        if self.session.disconnect() {
            self.on_disconnect();
        }
    }

    /// Stop listening and drop any link without resuming.
    pub fn shutdown(&mut self) {
        self.session.shutdown();
        self.on_disconnect();
        self.sco.disconnect();
    }

    pub fn receive_socket_data(&mut self, data: &[u8]) {
        if !self.session.is_connected() {
            debug!("Dropping {} bytes received while not connected", data.len());
            return;
        }
        for line in self.lines.push(data) {
            for action in self.interpreter.handle_line(&line, &self.indicators) {
                match action {
                    AtAction::Reply(line) => self.send_line(&line),
                    AtAction::Broadcast(message) => self.broadcaster.broadcast(message),
                }
            }
        }
    }

    /// The phone reported a new state for the current call.
    pub fn call_state_changed(&mut self, state: CallState) {
        let transition = self.indicators.call_state_changed(state);
        self.report(&transition.changes);

        for effect in transition.effects {
            match effect {
                CallEffect::StartRing => {
                    if self.session.is_connected() {
                        self.ring.start(self.session.transport().clone());
                    }
                }
                CallEffect::StopRing => self.ring.stop(),
                CallEffect::OpenSco => {
                    if self.session.is_connected() {
                        self.sco.connect(self.session.remote_address());
                    }
                }
                CallEffect::CloseSco => self.sco.disconnect(),
            }
        }
    }

    /// The phone listed every current call.
    pub fn enumerate_calls(&mut self, calls: &[CallInfo]) {
        let change = self.indicators.enumerate_calls(calls);
        self.report(change.as_slice());
    }

    pub fn set_indicator(&mut self, indicator: Indicator, value: u8) {
        let change = self.indicators.set(indicator, value);
        self.report(change.as_slice());
    }

    pub fn set_service(&mut self, available: bool) {
        self.set_indicator(Indicator::Service, u8::from(available));
    }

    pub fn set_signal(&mut self, strength: u8) {
        self.set_indicator(Indicator::Signal, strength);
    }

    pub fn set_roaming(&mut self, roaming: bool) {
        self.set_indicator(Indicator::Roam, u8::from(roaming));
    }

    pub fn set_battery(&mut self, level: u8) {
        self.set_indicator(Indicator::BatteryCharge, level);
    }

    /// Push the master volume, given in `[0.0, 1.0]`, as `+VGS`.
    pub fn set_speaker_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        let gain = ((volume * f32::from(MAX_VGS)).ceil() as u8).min(MAX_VGS);
        self.interpreter.set_volume(gain);
        if self.session.is_connected() {
            self.send_line(&format!("+VGS: {}", gain));
        }
    }

    pub fn on_connect_success(&mut self) {
        self.session.on_connect_success();
        self.lines.reset();
        self.broadcaster.broadcast(SystemMessage::HfpStatusChanged(LinkStatus {
            connected: true,
            address: self.session.remote_address(),
        }));
    }

    pub fn on_connect_error(&mut self, reason: &str) {
        self.session.on_connect_error(reason);
    }

    pub fn on_disconnect(&mut self) {
        let address = self.session.remote_address();
        if !self.session.on_disconnect() {
            return;
        }
        self.ring.stop();
        self.sco.disconnect();
        self.indicators.reset_calls();
        self.interpreter.reset();
        self.lines.reset();
        info!("HFP link to {} closed", address);
        self.broadcaster.broadcast(SystemMessage::HfpStatusChanged(LinkStatus {
            connected: false,
            address,
        }));
    }

    /// Send `+CIEV` for each change, only while connected.
    fn report(&self, changes: &[IndicatorChange]) {
        if !self.session.is_connected() {
            if !changes.is_empty() {
                debug!("Not reporting {} indicator changes, no link", changes.len());
            }
            return;
        }
        for change in changes {
            self.send_line(&change.to_ciev());
        }
    }

    fn send_line(&self, line: &str) {
        debug!("AT -> {}", line);
        if let Err(e) = self.session.send(frame(line)) {
            warn!("Failed to send {:?}: {}", line, e);
        }
    }
}
