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

//! Object Push manager.
//!
//! Drives both sides of OPP over one RFCOMM connection. As a client it
//! pushes a [`Blob`] with Connect, a header Put, body Puts and a final
//! PutFinal, then Disconnect. As a server it answers Connect, Put, Abort
//! and Disconnect requests and writes the object into the download
//! directory once the user has confirmed it.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::blob::{derive_file_name, Blob, PLACEHOLDER_NAME};
use super::reader::{spawn_chunk_read, ChunkOutcome, ChunkRead};
use super::session::{FileTransferSession, PROGRESS_INTERVAL};
use super::storage::DownloadDir;
use crate::address::BluetoothAddress;
use crate::error::{ProfileError, Result};
use crate::events::{Broadcaster, SystemMessage};
use crate::obex::{
    self, ConnectInfo, ObexError, OpCode, Packet, PacketReassembler, ResponseCode,
};
use crate::session::{ProfileRole, ProfileSession, ReplyHandle, SocketStatus};
use crate::transport::{
    ChannelType, ConnectRequest, ListenRequest, Transport, OBJECT_PUSH_UUID,
};

/// Tunables for the OPP manager.
#[derive(Debug, Clone)]
pub struct OppSettings {
    /// RFCOMM channel to listen on and to connect to.
    pub channel: u8,
    /// Largest packet we accept, announced in Connect.
    pub max_packet_length: u16,
    pub progress_interval: u64,
    /// Accept incoming objects without waiting for the user.
    pub auto_accept: bool,
    pub encrypt: bool,
    pub authenticate: bool,
    pub download_dir: PathBuf,
}

impl Default for OppSettings {
    fn default() -> Self {
        Self {
            channel: 10,
            max_packet_length: 0xFFFE,
            progress_interval: PROGRESS_INTERVAL,
            auto_accept: false,
            encrypt: true,
            authenticate: true,
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bluetooth"),
        }
    }
}

pub struct OppManager {
    session: ProfileSession,
    broadcaster: Broadcaster,
    chunk_tx: mpsc::UnboundedSender<ChunkRead>,
    settings: OppSettings,
    downloads: DownloadDir,
    transfer: Option<FileTransferSession>,
    next_transfer_id: u64,
    /// Request we sent and are awaiting a response for.
    last_command: Option<OpCode>,
    connection_id: u32,
    remote: Option<ConnectInfo>,
    reassembler: PacketReassembler,
}

impl OppManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        broadcaster: Broadcaster,
        chunk_tx: mpsc::UnboundedSender<ChunkRead>,
        settings: OppSettings,
    ) -> Self {
        let downloads = DownloadDir::new(settings.download_dir.clone());
        Self {
            session: ProfileSession::new(ProfileRole::OppServer, transport),
            broadcaster,
            chunk_tx,
            settings,
            downloads,
            transfer: None,
            next_transfer_id: 1,
            last_command: None,
            connection_id: 1,
            remote: None,
            reassembler: PacketReassembler::new(),
        }
    }

    pub fn status(&self) -> SocketStatus {
        self.session.status()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn is_transferring(&self) -> bool {
        self.transfer.is_some()
    }

    /// Bytes moved by the active transfer.
    pub fn bytes_transferred(&self) -> Option<u64> {
        self.transfer.as_ref().map(FileTransferSession::bytes_transferred)
    }

    /// Open an RFCOMM link to a device's Object Push service.
    pub fn connect(&mut self, address: BluetoothAddress, reply: ReplyHandle) {
        if !matches!(
            self.session.status(),
            SocketStatus::Connected | SocketStatus::Connecting
        ) {
            self.session.set_role(ProfileRole::OppClient);
        }
        self.session.connect(
            ConnectRequest {
                address,
                service: OBJECT_PUSH_UUID,
                channel: self.settings.channel,
                channel_type: ChannelType::Rfcomm,
                encrypt: self.settings.encrypt,
                authenticate: self.settings.authenticate,
            },
            Some(reply),
        );
    }

    pub fn listen(&mut self) -> Result<()> {
        if self.session.status() == SocketStatus::Disconnected {
            self.session.set_role(ProfileRole::OppServer);
        }
        self.session.listen(ListenRequest {
            channel: self.settings.channel,
            channel_type: ChannelType::Rfcomm,
            encrypt: self.settings.encrypt,
            authenticate: self.settings.authenticate,
        })
    }

    /// Drop the link. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if self.session.disconnect() {
            self.on_disconnect();
        }
    }

    /// Stop listening and drop any link without resuming.
    pub fn shutdown(&mut self) {
        self.session.shutdown();
        self.on_disconnect();
    }

    /// Push `blob` over the established link.
    pub fn send_file(&mut self, blob: Arc<dyn Blob>) -> Result<()> {
        if self.transfer.is_some() {
            warn!("A file transfer is already in progress");
            return Err(ProfileError::AlreadyActive);
        }
        if blob.size() > u64::from(u32::MAX) {
            warn!("File of {} bytes is too large for OBEX", blob.size());
            return Err(ProfileError::UnsupportedSize(blob.size()));
        }
        if !self.session.is_connected() {
            return Err(ProfileError::NotConnected);
        }

        let file_name = derive_file_name(blob.name(), blob.content_type());
        let id = self.allocate_transfer_id();
        info!("Sending {} ({} bytes)", file_name, blob.size());
        self.transfer = Some(FileTransferSession::outgoing(
            id,
            blob,
            file_name,
            self.settings.progress_interval,
        ));

        let request = obex::connect_request(self.settings.max_packet_length)?;
        self.last_command = Some(OpCode::Connect);
        self.session.send(request)
    }

    /// Ask the active outgoing transfer to stop after the current packet.
    pub fn stop_sending_file(&mut self) -> Result<()> {
        match &self.transfer {
            Some(transfer) if !transfer.is_receiving() => {
                info!("Stopping transfer of {}", transfer.file_name);
                transfer.request_abort();
                Ok(())
            }
            _ => Err(ProfileError::InvalidState("no outgoing transfer")),
        }
    }

    /// Answer the pending receiving-file confirmation.
    pub fn confirm_receiving_file(&mut self, accept: bool) -> Result<()> {
        if !self.session.is_connected() {
            return Err(ProfileError::NotConnected);
        }
        let address = self.session.remote_address();
        let transfer = self
            .transfer
            .as_mut()
            .filter(|transfer| transfer.is_receiving() && transfer.waiting_for_confirmation)
            .ok_or(ProfileError::InvalidState("not waiting for a confirmation"))?;
        transfer.waiting_for_confirmation = false;

        if !accept {
            info!("Receiving {} denied", transfer.file_name);
            transfer.request_abort();
            let put_final = transfer.put_final;
            self.reply_to_put(put_final, false)?;
            if put_final {
                self.finish_transfer(address);
            }
            return Ok(());
        }

        info!("Receiving {} accepted", transfer.file_name);
        self.broadcaster
            .broadcast(SystemMessage::OppTransferStart(transfer.info(address)));

        let body = std::mem::take(&mut transfer.pending_body);
        let put_final = transfer.put_final;
        if let Err(e) = transfer.write_body(&body) {
            error!("Writing {} failed: {}", transfer.file_name, e);
            self.reply_to_put(put_final, false)?;
            self.close_link();
            return Err(ProfileError::Storage(e));
        }
        if put_final {
            transfer.success = true;
        }
        self.reply_to_put(put_final, true)?;
        if put_final {
            self.finish_transfer(address);
        }
        Ok(())
    }

    /// Bytes read from the socket.
    pub fn receive_socket_data(&mut self, data: &[u8]) {
        if !self.session.is_connected() {
            debug!("Dropping {} bytes received while not connected", data.len());
            return;
        }
        self.reassembler.push(data);

        loop {
            match self.reassembler.next_packet() {
                Ok(Some(packet)) => {
                    if let Err(e) = self.handle_packet(&packet) {
                        warn!("OPP packet handling failed: {}", e);
                        self.fail_transfer();
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!("Malformed OBEX stream: {}", e);
                    self.fail_transfer();
                    return;
                }
            }
            if !self.session.is_connected() {
                return;
            }
        }
    }

    /// A background read finished.
    pub fn on_chunk_read(&mut self, read: ChunkRead) {
        let Some(transfer) = self
            .transfer
            .as_mut()
            .filter(|transfer| transfer.id() == read.transfer_id)
        else {
            debug!("Ignoring chunk for finished transfer {}", read.transfer_id);
            return;
        };
        transfer.stream = Some(read.stream);

        match read.outcome {
            ChunkOutcome::Cancelled => self.send_abort(),
            ChunkOutcome::Failed(e) => {
                error!("Reading {} failed: {}", transfer.file_name, e);
                self.send_disconnect();
            }
            ChunkOutcome::Data(chunk) => {
                let is_final = transfer.is_last_chunk(chunk.len());
                let remote_max = self
                    .remote
                    .map(|remote| remote.max_packet_length)
                    .unwrap_or_default();
                match obex::put_body_request(&chunk, is_final, remote_max) {
                    Ok(request) => {
                        transfer.record(chunk.len());
                        self.last_command = Some(if is_final {
                            OpCode::PutFinal
                        } else {
                            OpCode::Put
                        });
                        if let Err(e) = self.session.send(request) {
                            warn!("Sending body failed: {}", e);
                            self.close_link();
                        }
                    }
                    Err(e) => {
                        warn!("Body chunk rejected: {}", e);
                        self.send_disconnect();
                    }
                }
            }
        }
    }

    pub fn on_connect_success(&mut self) {
        self.session.on_connect_success();
        self.reassembler.reset();
    }

    pub fn on_connect_error(&mut self, reason: &str) {
        self.session.on_connect_error(reason);
    }

    /// The link went down. Finishes any transfer and returns to listening.
    pub fn on_disconnect(&mut self) {
        let address = self.session.remote_address();
        if !self.session.on_disconnect() {
            return;
        }
        self.finish_transfer(address);
        self.last_command = None;
        self.remote = None;
        self.reassembler.reset();
    }

    fn allocate_transfer_id(&mut self) -> u64 {
        let id = self.next_transfer_id;
        self.next_transfer_id += 1;
        id
    }

    fn handle_packet(&mut self, packet: &[u8]) -> Result<()> {
        let packet = Packet::parse(packet)?;
        match self.last_command {
            Some(OpCode::Connect) => self.on_connect_response(&packet),
            Some(OpCode::Put) => self.on_put_response(packet.code),
            Some(OpCode::PutFinal) => {
                if ResponseCode::Success.matches(packet.code) {
                    if let Some(transfer) = self.transfer.as_mut() {
                        transfer.success = true;
                    }
                } else {
                    warn!("PutFinal failed: 0x{:02X}", packet.code);
                }
                self.send_disconnect();
                Ok(())
            }
            Some(OpCode::Abort) => {
                if !ResponseCode::Success.matches(packet.code) {
                    warn!("Abort failed: 0x{:02X}", packet.code);
                }
                self.send_disconnect();
                Ok(())
            }
            Some(OpCode::Disconnect) => {
                self.close_link();
                Ok(())
            }
            Some(other) => {
                warn!("Unexpected response to {:?}", other);
                self.send_disconnect();
                Ok(())
            }
            None => self.handle_request(&packet),
        }
    }

    fn on_connect_response(&mut self, packet: &Packet<'_>) -> Result<()> {
        if !ResponseCode::Success.matches(packet.code) {
            warn!("OBEX connect refused: 0x{:02X}", packet.code);
            self.send_disconnect();
            return Ok(());
        }

        let (info, _) = packet.connect_parts()?;
        if obex::max_body_length(info.max_packet_length) == 0 {
            warn!("Remote max packet length {} too small", info.max_packet_length);
            self.send_disconnect();
            return Ok(());
        }
        debug!(
            "Remote OBEX version 0x{:02X}, flags 0x{:02X}, max packet {}",
            info.version, info.flags, info.max_packet_length
        );
        self.remote = Some(info);

        let address = self.session.remote_address();
        let Some(transfer) = self.transfer.as_ref() else {
            self.send_disconnect();
            return Ok(());
        };
        self.broadcaster
            .broadcast(SystemMessage::OppTransferStart(transfer.info(address)));

        let content_type = Some(transfer.content_type.as_str());
        let request = obex::put_header_request(
            self.connection_id,
            &transfer.file_name,
            content_type,
            transfer.length as u32,
        )?;
        self.last_command = Some(OpCode::Put);
        self.session.send(request)
    }

    fn on_put_response(&mut self, code: u8) -> Result<()> {
        if !ResponseCode::Continue.matches(code) {
            warn!("Put failed: 0x{:02X}", code);
            self.send_disconnect();
            return Ok(());
        }

        let address = self.session.remote_address();
        let Some(transfer) = self.transfer.as_mut() else {
            self.send_disconnect();
            return Ok(());
        };
        if transfer.is_aborted() {
            self.send_abort();
            return Ok(());
        }
        if transfer.should_report_progress() {
            self.broadcaster
                .broadcast(SystemMessage::OppUpdateProgress(transfer.info(address)));
        }

        let stream = match transfer.stream.take() {
            Some(stream) => stream,
            None => match transfer.blob().map(|blob| blob.open()) {
                Some(Ok(stream)) => stream,
                Some(Err(e)) => {
                    error!("Can't open {}: {}", transfer.file_name, e);
                    self.send_disconnect();
                    return Ok(());
                }
                None => {
                    self.send_disconnect();
                    return Ok(());
                }
            },
        };

        let max_len = self
            .remote
            .map(|remote| obex::max_body_length(remote.max_packet_length))
            .unwrap_or_default();
        spawn_chunk_read(
            transfer.id(),
            stream,
            max_len,
            transfer.cancel_flag(),
            self.chunk_tx.clone(),
        );
        Ok(())
    }

    /// A request from the remote side while we are not awaiting a response.
    fn handle_request(&mut self, packet: &Packet<'_>) -> Result<()> {
        match OpCode::from_byte(packet.code) {
            Some(OpCode::Connect) => {
                let (info, _) = packet.connect_parts()?;
                info!("Remote OBEX connect, max packet {}", info.max_packet_length);
                self.remote = Some(info);
                let reply =
                    obex::connect_response(ResponseCode::Success, self.settings.max_packet_length)?;
                self.session.send(reply)
            }
            Some(OpCode::Disconnect) => {
                self.session
                    .send(obex::response(ResponseCode::Success, true)?)?;
                let address = self.session.remote_address();
                self.finish_transfer(address);
                self.remote = None;
                Ok(())
            }
            Some(OpCode::Abort) => {
                info!("Remote aborted the transfer");
                self.session
                    .send(obex::response(ResponseCode::Success, true)?)?;
                if let Some(transfer) = self.transfer.as_mut() {
                    transfer.request_abort();
                    transfer.success = false;
                }
                let address = self.session.remote_address();
                self.finish_transfer(address);
                Ok(())
            }
            Some(op @ (OpCode::Put | OpCode::PutFinal)) => {
                self.handle_put(packet, op == OpCode::PutFinal)
            }
            _ => {
                debug!("Unsupported OBEX request 0x{:02X}", packet.code);
                self.session
                    .send(obex::response(ResponseCode::NotImplemented, true)?)
            }
        }
    }

    fn handle_put(&mut self, packet: &Packet<'_>, put_final: bool) -> Result<()> {
        if self.transfer.is_none() {
            let id = self.allocate_transfer_id();
            self.transfer = Some(FileTransferSession::incoming(
                id,
                self.settings.progress_interval,
            ));
        }

        let headers = packet.headers()?;
        let name = headers.name()?;
        let content_type = headers.content_type()?;
        let address = self.session.remote_address();
        let Some(transfer) = self.transfer.as_mut() else {
            return Err(ProfileError::InvalidState("no transfer"));
        };
        if !transfer.is_receiving() {
            return Err(ProfileError::InvalidState("remote Put during outgoing transfer"));
        }

        transfer.put_final = put_final;
        if let Some(name) = name {
            transfer.file_name = name;
        }
        if let Some(content_type) = content_type {
            transfer.content_type = content_type;
        }
        if let Some(length) = headers.length() {
            transfer.length = u64::from(length);
        }
        let body = headers.body().unwrap_or_default();

        if transfer.waiting_for_confirmation {
            transfer.pending_body.extend_from_slice(body);
            if transfer.has_output() {
                return Ok(());
            }

            let requested = if transfer.file_name.is_empty() {
                PLACEHOLDER_NAME
            } else {
                transfer.file_name.as_str()
            };
            match self.downloads.create_unique(requested) {
                Ok((file, actual)) => {
                    transfer.file_name = actual;
                    transfer.set_output(file);
                    self.broadcaster.broadcast(SystemMessage::OppReceivingFileConfirmation(
                        transfer.info(address),
                    ));
                }
                Err(e) => {
                    error!("Can't create {}: {}", requested, e);
                    transfer.waiting_for_confirmation = false;
                    transfer.request_abort();
                    self.reply_to_put(put_final, false)?;
                    self.close_link();
                    return Ok(());
                }
            }

            if self.settings.auto_accept {
                return self.confirm_receiving_file(true);
            }
            return Ok(());
        }

        if transfer.is_aborted() {
            self.reply_to_put(put_final, false)?;
            if put_final {
                self.finish_transfer(address);
            }
            return Ok(());
        }
        if let Err(e) = transfer.write_body(body) {
            error!("Writing {} failed: {}", transfer.file_name, e);
            self.reply_to_put(put_final, false)?;
            self.close_link();
            return Ok(());
        }
        if transfer.should_report_progress() {
            self.broadcaster
                .broadcast(SystemMessage::OppUpdateProgress(transfer.info(address)));
        }
        if put_final {
            transfer.success = true;
        }
        self.reply_to_put(put_final, true)?;
        // Each PutFinal ends one object; the next Put starts a new one
        if put_final {
            self.finish_transfer(address);
        }
        Ok(())
    }

    /// Continue/Success when accepted, Unauthorized otherwise. A refused
    /// intermediate Put gets Unauthorized without the final bit.
    fn reply_to_put(&mut self, put_final: bool, accepted: bool) -> Result<()> {
        let reply = match (accepted, put_final) {
            (true, true) => obex::response(ResponseCode::Success, true),
            (true, false) => obex::response(ResponseCode::Continue, true),
            (false, is_final) => obex::response(ResponseCode::Unauthorized, is_final),
        }?;
        self.session.send(reply)
    }

    fn send_abort(&mut self) {
        info!("Sending OBEX abort");
        self.send_request(OpCode::Abort, obex::abort_request());
    }

    fn send_disconnect(&mut self) {
        debug!("Sending OBEX disconnect");
        self.send_request(OpCode::Disconnect, obex::disconnect_request());
    }

    fn send_request(&mut self, op: OpCode, request: std::result::Result<Vec<u8>, ObexError>) {
        let sent = request
            .map_err(ProfileError::from)
            .and_then(|request| self.session.send(request));
        match sent {
            Ok(()) => self.last_command = Some(op),
            Err(e) => {
                warn!("Sending {:?} failed: {}", op, e);
                self.close_link();
            }
        }
    }

    /// Abort the active transfer after a protocol or storage error.
    fn fail_transfer(&mut self) {
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.success = false;
            transfer.request_abort();
        }
        match self.session.role() {
            ProfileRole::OppClient
                if !matches!(self.last_command, None | Some(OpCode::Disconnect)) =>
            {
                self.send_disconnect()
            }
            _ => self.close_link(),
        }
    }

    fn close_link(&mut self) {
        self.session.disconnect();
        self.on_disconnect();
    }

    /// Broadcast completion once and drop the transfer.
    fn finish_transfer(&mut self, address: BluetoothAddress) {
        let Some(mut transfer) = self.transfer.take() else {
            return;
        };
        transfer.request_abort();
        let created = transfer.has_output();
        transfer.close_output();
        if transfer.is_receiving() && !transfer.success && created {
            self.downloads.delete(&transfer.file_name);
        }

        info!(
            "Transfer of {} finished: success={}, {} of {} bytes",
            transfer.file_name,
            transfer.success,
            transfer.bytes_transferred(),
            transfer.length
        );
        let mut info = transfer.info(address);
        info.success = Some(transfer.success);
        self.broadcaster
            .broadcast(SystemMessage::OppTransferComplete(info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferInfo;
    use crate::obex::{Header, PacketWriter};
    use crate::opp::blob::MemoryBlob;
    use crate::transport::MemoryTransport;
    use tokio::sync::oneshot;

    const PEER: BluetoothAddress = BluetoothAddress::new([0x00, 0x23, 0x7F, 0xCB, 0xB4, 0xF1]);

    struct Harness {
        manager: OppManager,
        transport: Arc<MemoryTransport>,
        messages: mpsc::UnboundedReceiver<SystemMessage>,
        chunks: mpsc::UnboundedReceiver<ChunkRead>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(auto_accept: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let (transport, _events) = MemoryTransport::new();
            let (broadcaster, messages) = Broadcaster::new();
            let (chunk_tx, chunks) = mpsc::unbounded_channel();
            let settings = OppSettings {
                download_dir: dir.path().to_path_buf(),
                auto_accept,
                ..OppSettings::default()
            };
            let manager = OppManager::new(transport.clone(), broadcaster, chunk_tx, settings);
            Self {
                manager,
                transport,
                messages,
                chunks,
                _dir: dir,
            }
        }

        fn accept_connection(&mut self) {
            self.manager.listen().unwrap();
            self.transport.complete_connect(PEER);
            self.manager.on_connect_success();
        }

        fn client_connection(&mut self) {
            let (tx, mut rx) = oneshot::channel();
            self.manager.connect(PEER, tx);
            self.transport.complete_connect(PEER);
            self.manager.on_connect_success();
            assert!(rx.try_recv().unwrap().is_ok());
        }

        fn download(&self, name: &str) -> PathBuf {
            self._dir.path().join(name)
        }

        fn drain_messages(&mut self) -> Vec<SystemMessage> {
            let mut out = Vec::new();
            while let Ok(message) = self.messages.try_recv() {
                out.push(message);
            }
            out
        }
    }

    fn connect_success(max_packet_length: u16) -> Vec<u8> {
        obex::connect_response(ResponseCode::Success, max_packet_length).unwrap()
    }

    fn completion(messages: &[SystemMessage]) -> Vec<TransferInfo> {
        messages
            .iter()
            .filter_map(|message| match message {
                SystemMessage::OppTransferComplete(info) => Some(info.clone()),
                _ => None,
            })
            .collect()
    }

    fn progress_updates(messages: &[SystemMessage]) -> usize {
        messages
            .iter()
            .filter(|message| matches!(message, SystemMessage::OppUpdateProgress(_)))
            .count()
    }

    #[test]
    fn test_send_file_preconditions() {
        let mut h = Harness::new(false);
        let blob: Arc<dyn Blob> = Arc::new(MemoryBlob::new(vec![1u8; 10]));
        assert!(matches!(
            h.manager.send_file(blob.clone()),
            Err(ProfileError::NotConnected)
        ));

        h.client_connection();
        h.manager.send_file(blob.clone()).unwrap();
        assert!(matches!(
            h.manager.send_file(blob),
            Err(ProfileError::AlreadyActive)
        ));
        assert_eq!(h.transport.take_sent(), vec![obex::connect_request(0xFFFE).unwrap()]);
    }

    struct HugeBlob;

    impl Blob for HugeBlob {
        fn name(&self) -> Option<&str> {
            Some("huge.iso")
        }
        fn content_type(&self) -> Option<&str> {
            None
        }
        fn size(&self) -> u64 {
            u64::from(u32::MAX) + 1
        }
        fn open(&self) -> std::io::Result<Box<dyn std::io::Read + Send>> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "not readable"))
        }
    }

    #[test]
    fn test_oversized_file_rejected_before_io() {
        let mut h = Harness::new(false);
        h.client_connection();
        assert!(matches!(
            h.manager.send_file(Arc::new(HugeBlob)),
            Err(ProfileError::UnsupportedSize(_))
        ));
        assert!(h.transport.sent().is_empty());
        assert!(!h.manager.is_transferring());
    }

    #[tokio::test]
    async fn test_push_small_file() {
        let mut h = Harness::new(false);
        h.client_connection();

        let data: Vec<u8> = (0..250u32).map(|i| i as u8).collect();
        let blob = MemoryBlob::new(data.clone())
            .with_name("/tmp/notes")
            .with_content_type("text/plain");
        h.manager.send_file(Arc::new(blob)).unwrap();
        h.transport.take_sent();

        // Remote accepts 106-byte packets, so 100 body bytes per Put
        h.manager.receive_socket_data(&connect_success(106));
        let header = h.transport.take_sent();
        let headers = Packet::parse(&header[0]).unwrap().headers().unwrap();
        assert_eq!(headers.name().unwrap().as_deref(), Some("notes.txt"));
        assert_eq!(headers.length(), Some(250));

        let continue_ = obex::response(ResponseCode::Continue, true).unwrap();
        let mut opcodes = Vec::new();
        let mut body = Vec::new();
        loop {
            h.manager.receive_socket_data(&continue_);
            let read = h.chunks.recv().await.unwrap();
            h.manager.on_chunk_read(read);
            let sent = h.transport.take_sent();
            let packet = Packet::parse(&sent[0]).unwrap();
            opcodes.push(packet.code);
            body.extend_from_slice(packet.headers().unwrap().body().unwrap());
            if packet.code == OpCode::PutFinal.as_byte() {
                break;
            }
        }
        assert_eq!(opcodes, vec![0x02, 0x02, 0x82]);
        assert_eq!(body, data);
        assert_eq!(h.manager.bytes_transferred(), Some(250));

        h.manager
            .receive_socket_data(&obex::response(ResponseCode::Success, true).unwrap());
        assert_eq!(h.transport.take_sent(), vec![obex::disconnect_request().unwrap()]);
        h.manager
            .receive_socket_data(&obex::response(ResponseCode::Success, true).unwrap());

        let messages = h.drain_messages();
        assert!(matches!(messages[0], SystemMessage::OppTransferStart(_)));
        let done = completion(&messages);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].success, Some(true));
        assert!(!done[0].received);
        assert_eq!(done[0].processed_length, 250);
        assert!(!h.manager.is_transferring());

        // The transport echo of our own close does nothing
        h.manager.on_disconnect();
        assert!(h.drain_messages().is_empty());
    }

    #[test]
    fn test_connect_refused_disconnects() {
        let mut h = Harness::new(false);
        h.client_connection();
        h.manager
            .send_file(Arc::new(MemoryBlob::new(vec![0u8; 4])))
            .unwrap();
        h.transport.take_sent();

        h.manager
            .receive_socket_data(&obex::response(ResponseCode::Forbidden, true).unwrap());
        assert_eq!(h.transport.take_sent(), vec![obex::disconnect_request().unwrap()]);
    }

    fn put_packet(opcode: OpCode, headers: &[Header<'_>]) -> Vec<u8> {
        let mut writer = PacketWriter::new(opcode.as_byte());
        for header in headers {
            writer = writer.header(*header);
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_receive_with_confirmation() {
        let mut h = Harness::new(false);
        h.accept_connection();

        h.manager.receive_socket_data(
            &obex::PacketWriter::connect(OpCode::Connect.as_byte(), 0x2000)
                .finish()
                .unwrap(),
        );
        assert_eq!(h.transport.take_sent(), vec![connect_success(0xFFFE)]);

        h.manager.receive_socket_data(&put_packet(
            OpCode::Put,
            &[
                Header::Name("card.vcf"),
                Header::Type("text/x-vcard"),
                Header::Length(8),
                Header::Body(b"BEGIN:"),
            ],
        ));
        // Nothing is answered until the user decides
        assert!(h.transport.sent().is_empty());
        let messages = h.drain_messages();
        assert!(matches!(
            &messages[..],
            [SystemMessage::OppReceivingFileConfirmation(info)] if info.file_name == "card.vcf"
        ));

        h.manager.confirm_receiving_file(true).unwrap();
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Continue, true).unwrap()]
        );
        assert!(matches!(
            h.manager.confirm_receiving_file(true),
            Err(ProfileError::InvalidState(_))
        ));

        h.manager
            .receive_socket_data(&put_packet(OpCode::PutFinal, &[Header::EndOfBody(b"VC")]));
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Success, true).unwrap()]
        );

        h.manager.receive_socket_data(&obex::disconnect_request().unwrap());
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Success, true).unwrap()]
        );
        let done = completion(&h.drain_messages());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].success, Some(true));
        assert!(done[0].received);
        assert_eq!(done[0].content_type, "text/x-vcard");
        assert_eq!(std::fs::read(h.download("card.vcf")).unwrap(), b"BEGIN:VC");

        h.transport.remote_disconnect();
        h.manager.on_disconnect();
        assert!(h.drain_messages().is_empty());
        assert_eq!(h.manager.status(), SocketStatus::Listening);
    }

    #[test]
    fn test_denied_file_is_deleted() {
        let mut h = Harness::new(false);
        h.accept_connection();

        h.manager.receive_socket_data(&put_packet(
            OpCode::Put,
            &[Header::Name("song.mp3"), Header::Length(1000), Header::Body(&[1; 10])],
        ));
        assert!(h.download("song.mp3").exists());

        h.manager.confirm_receiving_file(false).unwrap();
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Unauthorized, false).unwrap()]
        );

        h.transport.remote_disconnect();
        h.manager.on_disconnect();
        assert!(!h.download("song.mp3").exists());
        let done = completion(&h.drain_messages());
        assert_eq!(done[0].success, Some(false));
    }

    #[test]
    fn test_colliding_name_is_reported() {
        let mut h = Harness::new(true);
        std::fs::write(h.download("photo.jpg"), b"old").unwrap();
        h.accept_connection();

        h.manager.receive_socket_data(&put_packet(
            OpCode::PutFinal,
            &[Header::Name("photo.jpg"), Header::Length(3), Header::EndOfBody(b"new")],
        ));
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Success, true).unwrap()]
        );
        let messages = h.drain_messages();
        assert!(matches!(
            &messages[0],
            SystemMessage::OppReceivingFileConfirmation(info) if info.file_name == "photo-1.jpg"
        ));
        assert_eq!(std::fs::read(h.download("photo-1.jpg")).unwrap(), b"new");
        assert_eq!(std::fs::read(h.download("photo.jpg")).unwrap(), b"old");
    }

    #[test]
    fn test_unknown_request_not_implemented() {
        let mut h = Harness::new(false);
        h.accept_connection();
        h.manager
            .receive_socket_data(&PacketWriter::new(OpCode::SetPath.as_byte()).finish().unwrap());
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::NotImplemented, true).unwrap()]
        );
    }

    #[test]
    fn test_malformed_put_closes_server_link() {
        let mut h = Harness::new(true);
        h.accept_connection();
        // Name header claims 9 bytes but the packet ends after 5
        h.manager
            .receive_socket_data(&[0x02, 0x00, 0x08, 0x01, 0x00, 0x09, 0x00, 0x41]);
        assert!(!h.manager.is_connected());
        assert_eq!(h.manager.status(), SocketStatus::Listening);
        let done = completion(&h.drain_messages());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].success, Some(false));
    }

    #[test]
    fn test_remote_abort_fails_transfer() {
        let mut h = Harness::new(true);
        h.accept_connection();
        h.manager.receive_socket_data(&put_packet(
            OpCode::Put,
            &[Header::Name("big.bin"), Header::Length(500), Header::Body(&[0; 50])],
        ));
        h.transport.take_sent();

        h.manager.receive_socket_data(&obex::abort_request().unwrap());
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Success, true).unwrap()]
        );
        assert!(!h.download("big.bin").exists());
        let done = completion(&h.drain_messages());
        assert_eq!(done[0].success, Some(false));
        assert_eq!(done[0].processed_length, 50);
    }

    #[tokio::test]
    async fn test_push_reports_progress() {
        let mut h = Harness::new(false);
        h.client_connection();
        h.manager
            .send_file(Arc::new(MemoryBlob::new(vec![0x5A; 120_000]).with_name("big.bin")))
            .unwrap();
        h.transport.take_sent();

        // 10000 body bytes per Put
        h.manager.receive_socket_data(&connect_success(10_006));
        h.transport.take_sent();
        let continue_ = obex::response(ResponseCode::Continue, true).unwrap();
        let mut puts = 0;
        loop {
            h.manager.receive_socket_data(&continue_);
            let read = h.chunks.recv().await.unwrap();
            h.manager.on_chunk_read(read);
            puts += 1;
            let sent = h.transport.take_sent();
            if Packet::parse(&sent[0]).unwrap().code == OpCode::PutFinal.as_byte() {
                break;
            }
        }
        assert_eq!(puts, 12);
        // Reported after 60000 and after 110000 bytes
        assert_eq!(progress_updates(&h.drain_messages()), 2);
    }

    #[test]
    fn test_receive_reports_progress() {
        let mut h = Harness::new(true);
        h.accept_connection();
        let chunk = vec![0xA5u8; 10_000];

        h.manager.receive_socket_data(&put_packet(
            OpCode::Put,
            &[Header::Name("video.mp4"), Header::Length(150_000), Header::Body(&chunk)],
        ));
        for _ in 0..13 {
            h.manager
                .receive_socket_data(&put_packet(OpCode::Put, &[Header::Body(&chunk)]));
        }
        h.manager
            .receive_socket_data(&put_packet(OpCode::PutFinal, &[Header::EndOfBody(&chunk)]));

        let messages = h.drain_messages();
        assert_eq!(progress_updates(&messages), 2);
        let done = completion(&messages);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].processed_length, 150_000);
        assert_eq!(std::fs::metadata(h.download("video.mp4")).unwrap().len(), 150_000);
    }

    #[test]
    fn test_two_objects_on_one_connection() {
        let mut h = Harness::new(false);
        h.accept_connection();
        let success = obex::response(ResponseCode::Success, true).unwrap();

        h.manager.receive_socket_data(&put_packet(
            OpCode::PutFinal,
            &[Header::Name("a.txt"), Header::Length(3), Header::EndOfBody(b"AAA")],
        ));
        h.manager.confirm_receiving_file(true).unwrap();
        assert_eq!(h.transport.take_sent(), vec![success.clone()]);
        assert!(!h.manager.is_transferring());

        h.manager.receive_socket_data(&put_packet(
            OpCode::PutFinal,
            &[Header::Name("b.txt"), Header::Length(3), Header::EndOfBody(b"BBB")],
        ));
        assert!(h.transport.sent().is_empty());
        h.manager.confirm_receiving_file(true).unwrap();
        assert_eq!(h.transport.take_sent(), vec![success.clone()]);

        h.manager.receive_socket_data(&obex::disconnect_request().unwrap());
        assert_eq!(h.transport.take_sent(), vec![success]);

        let messages = h.drain_messages();
        let confirmations: Vec<_> = messages
            .iter()
            .filter_map(|message| match message {
                SystemMessage::OppReceivingFileConfirmation(info) => Some(info.file_name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(confirmations, vec!["a.txt", "b.txt"]);
        let done = completion(&messages);
        assert_eq!(
            done.iter().map(|info| info.file_name.as_str()).collect::<Vec<_>>(),
            vec!["a.txt", "b.txt"]
        );
        assert!(done.iter().all(|info| info.success == Some(true)));
        assert_eq!(std::fs::read(h.download("a.txt")).unwrap(), b"AAA");
        assert_eq!(std::fs::read(h.download("b.txt")).unwrap(), b"BBB");
    }

    #[test]
    fn test_unwritable_download_dir_refuses_object() {
        let mut h = Harness::new(true);
        let blocker = h.download("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        h.manager.downloads = DownloadDir::new(&blocker);
        h.accept_connection();

        h.manager.receive_socket_data(&put_packet(
            OpCode::Put,
            &[Header::Name("doc.pdf"), Header::Length(100), Header::Body(&[7; 10])],
        ));
        assert_eq!(
            h.transport.take_sent(),
            vec![obex::response(ResponseCode::Unauthorized, false).unwrap()]
        );
        assert!(!h.manager.is_connected());
        assert_eq!(h.manager.status(), SocketStatus::Listening);
        let done = completion(&h.drain_messages());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].success, Some(false));
        assert!(done[0].received);
    }
}
