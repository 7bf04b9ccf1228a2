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

//! Stream-to-packet reassembly.

use tracing::{debug, warn};

use super::{ObexError, PACKET_HEADER_LENGTH};

/// Collects RFCOMM reads into complete OBEX packets.
///
/// Reads may split a packet anywhere, including inside the length field,
/// and a single read may carry several packets.
pub struct PacketReassembler {
    buffer: Vec<u8>,
    expected_length: usize,
}

impl PacketReassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            expected_length: 0,
        }
    }

    /// Append bytes read from the socket.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete packet, if one is buffered.
    ///
    /// A declared length below the packet header size is unrecoverable for
    /// the stream; the buffer is cleared and an error returned.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, ObexError> {
        if self.buffer.len() < PACKET_HEADER_LENGTH {
            return Ok(None);
        }

        let declared = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
        if declared < PACKET_HEADER_LENGTH {
            warn!("Invalid OBEX packet length: {}", declared);
            self.reset();
            return Err(ObexError::InvalidLength(declared));
        }
        self.expected_length = declared;

        if self.buffer.len() < declared {
            debug!(
                "Waiting for packet data: {}/{} bytes",
                self.buffer.len(),
                declared
            );
            return Ok(None);
        }

        let rest = self.buffer.split_off(declared);
        let packet = std::mem::replace(&mut self.buffer, rest);
        self.expected_length = 0;
        debug!("Packet reassembly complete: {} bytes", packet.len());
        Ok(Some(packet))
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected_length = 0;
    }

    /// Whether a partial packet is buffered.
    pub fn is_in_progress(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Declared length of the packet being collected, 0 if unknown.
    pub fn expected_length(&self) -> usize {
        self.expected_length
    }
}

impl Default for PacketReassembler {
    fn default() -> Self {
        Self::new()
    }
}
