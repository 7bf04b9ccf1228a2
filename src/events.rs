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

//! System messages broadcast to the UI layer.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::address::BluetoothAddress;

/// Details of a file transfer, shared by all OPP messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    pub address: BluetoothAddress,
    pub received: bool,
    pub file_name: String,
    pub file_length: u64,
    pub content_type: String,
    pub processed_length: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Link state of a profile connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub connected: bool,
    pub address: BluetoothAddress,
}

/// Call-control request from the hands-free unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialerCommand {
    /// Redial the last number.
    #[serde(rename = "BLDN")]
    Redial,
    /// Answer the incoming call.
    #[serde(rename = "ATA")]
    Answer,
    /// Hang up.
    #[serde(rename = "CHUP")]
    HangUp,
}

impl DialerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redial => "BLDN",
            Self::Answer => "ATA",
            Self::HangUp => "CHUP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialerPayload {
    pub command: DialerCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumePayload {
    pub direction: VolumeDirection,
}

/// A message for the UI layer, tagged with its stable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SystemMessage {
    #[serde(rename = "bluetooth-opp-transfer-start")]
    OppTransferStart(TransferInfo),
    #[serde(rename = "bluetooth-opp-update-progress")]
    OppUpdateProgress(TransferInfo),
    #[serde(rename = "bluetooth-opp-transfer-complete")]
    OppTransferComplete(TransferInfo),
    #[serde(rename = "bluetooth-opp-receiving-file-confirmation")]
    OppReceivingFileConfirmation(TransferInfo),
    #[serde(rename = "bluetooth-hfp-status-changed")]
    HfpStatusChanged(LinkStatus),
    #[serde(rename = "bluetooth-dialer-command")]
    DialerCommand(DialerPayload),
    #[serde(rename = "bluetooth-sco-status-changed")]
    ScoStatusChanged(LinkStatus),
    #[serde(rename = "bluetooth-volume-change")]
    VolumeChange(VolumePayload),
}

impl SystemMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OppTransferStart(_) => "bluetooth-opp-transfer-start",
            Self::OppUpdateProgress(_) => "bluetooth-opp-update-progress",
            Self::OppTransferComplete(_) => "bluetooth-opp-transfer-complete",
            Self::OppReceivingFileConfirmation(_) => "bluetooth-opp-receiving-file-confirmation",
            Self::HfpStatusChanged(_) => "bluetooth-hfp-status-changed",
            Self::DialerCommand(_) => "bluetooth-dialer-command",
            Self::ScoStatusChanged(_) => "bluetooth-sco-status-changed",
            Self::VolumeChange(_) => "bluetooth-volume-change",
        }
    }

    pub fn dialer(command: DialerCommand) -> Self {
        Self::DialerCommand(DialerPayload { command })
    }

    pub fn volume(direction: VolumeDirection) -> Self {
        Self::VolumeChange(VolumePayload { direction })
    }

    /// Serialize as `{"type": <name>, "payload": {...}}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Sending half of the system message channel.
///
/// Broadcasting never fails the caller; a closed channel is logged.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<SystemMessage>,
}

impl Broadcaster {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SystemMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn broadcast(&self, message: SystemMessage) {
        debug!("Broadcasting [{}]", message.name());
        if let Err(e) = self.tx.send(message) {
            warn!("Failed to broadcast [{}]", e.0.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transfer_message_json() {
        let message = SystemMessage::OppTransferComplete(TransferInfo {
            address: BluetoothAddress::new([0, 0x23, 0x7F, 0xCB, 0xB4, 0xF1]),
            received: true,
            file_name: "photo.jpg".to_string(),
            file_length: 120_000,
            content_type: "image/jpeg".to_string(),
            processed_length: 120_000,
            success: Some(true),
        });

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "bluetooth-opp-transfer-complete",
                "payload": {
                    "address": "00:23:7F:CB:B4:F1",
                    "received": true,
                    "fileName": "photo.jpg",
                    "fileLength": 120000,
                    "contentType": "image/jpeg",
                    "processedLength": 120000,
                    "success": true
                }
            })
        );
    }

    #[test]
    fn test_dialer_and_volume_json() {
        let value: serde_json::Value =
            serde_json::from_str(&SystemMessage::dialer(DialerCommand::Redial).to_json().unwrap())
                .unwrap();
        assert_eq!(
            value,
            json!({"type": "bluetooth-dialer-command", "payload": {"command": "BLDN"}})
        );

        let value: serde_json::Value =
            serde_json::from_str(&SystemMessage::volume(VolumeDirection::Down).to_json().unwrap())
                .unwrap();
        assert_eq!(value["payload"]["direction"], "down");
    }

    #[test]
    fn test_names_match_tags() {
        let status = LinkStatus {
            connected: true,
            address: BluetoothAddress::ANY,
        };
        for message in [
            SystemMessage::HfpStatusChanged(status.clone()),
            SystemMessage::ScoStatusChanged(status),
            SystemMessage::dialer(DialerCommand::Answer),
        ] {
            let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
            assert_eq!(value["type"], message.name());
        }
    }

    #[test]
    fn test_broadcast_after_receiver_dropped() {
        let (broadcaster, rx) = Broadcaster::new();
        drop(rx);
        broadcaster.broadcast(SystemMessage::dialer(DialerCommand::HangUp));
    }
}
