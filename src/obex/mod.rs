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

//! OBEX packet codec.
//!
//! Covers the subset of IrOBEX 1.2 needed by the Object Push Profile:
//! Connect, Disconnect, Put, PutFinal and Abort, with the Name, Type,
//! Length, Body, EndOfBody and ConnectionId headers.

mod header;
mod packet;
mod reassembler;

use thiserror::Error;

pub use header::{Header, HeaderId, HeaderSet};
pub use packet::{
    abort_request, connect_request, connect_response, disconnect_request, max_body_length,
    put_body_request, put_header_request, response, ConnectInfo, Packet, PacketWriter,
    BODY_HEADER_OVERHEAD, MAX_PACKET_LENGTH, OBEX_VERSION, PACKET_HEADER_LENGTH,
};
pub use reassembler::PacketReassembler;

/// Set on every final response code and on final request opcodes.
pub const FINAL_BIT: u8 = 0x80;

/// Errors produced while encoding or decoding OBEX packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObexError {
    /// The header block ended in the middle of a header.
    #[error("header block truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// A declared packet or header length is impossible.
    #[error("invalid length field: {0}")]
    InvalidLength(usize),

    /// The packet does not fit in the 2-byte length field.
    #[error("packet of {0} bytes exceeds the OBEX maximum")]
    PacketTooLarge(usize),

    /// A body chunk does not fit under the negotiated packet length.
    #[error("body of {len} bytes exceeds the {max} bytes allowed per packet")]
    PayloadTooLarge { len: usize, max: usize },

    /// A text header is not valid UTF-16 or ASCII.
    #[error("invalid text in {0} header")]
    InvalidText(&'static str),
}

/// Request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Connect = 0x80,
    Disconnect = 0x81,
    Put = 0x02,
    PutFinal = 0x82,
    Get = 0x03,
    GetFinal = 0x83,
    SetPath = 0x85,
    Abort = 0xFF,
}

impl OpCode {
    /// Decode a request opcode.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(Self::Connect),
            0x81 => Some(Self::Disconnect),
            0x02 => Some(Self::Put),
            0x82 => Some(Self::PutFinal),
            0x03 => Some(Self::Get),
            0x83 => Some(Self::GetFinal),
            0x85 => Some(Self::SetPath),
            0xFF => Some(Self::Abort),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Response codes, with the final bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Continue = 0x90,
    Success = 0xA0,
    BadRequest = 0xC0,
    Unauthorized = 0xC1,
    Forbidden = 0xC3,
    InternalServerError = 0xD0,
    NotImplemented = 0xD1,
}

impl ResponseCode {
    /// Encode, clearing the final bit for intermediate responses.
    pub fn to_byte(self, is_final: bool) -> u8 {
        if is_final {
            self as u8
        } else {
            self as u8 & !FINAL_BIT
        }
    }

    /// Whether `byte` carries this code, with or without the final bit.
    pub fn matches(self, byte: u8) -> bool {
        byte | FINAL_BIT == self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(OpCode::from_byte(0x82), Some(OpCode::PutFinal));
        assert_eq!(OpCode::from_byte(0xFF), Some(OpCode::Abort));
        assert_eq!(OpCode::from_byte(0x10), None);
        assert_eq!(OpCode::Put.as_byte(), 0x02);
    }

    #[test]
    fn test_response_final_bit() {
        assert_eq!(ResponseCode::Success.to_byte(true), 0xA0);
        assert_eq!(ResponseCode::Unauthorized.to_byte(false), 0x41);
        assert!(ResponseCode::Unauthorized.matches(0x41));
        assert!(ResponseCode::Continue.matches(0x90));
        assert!(!ResponseCode::Success.matches(0x90));
    }
}
