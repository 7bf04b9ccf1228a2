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

//! Packet framing and the request/response builders used by OPP.

use super::{Header, HeaderSet, ObexError, OpCode, ResponseCode};

/// Largest packet expressible in the 2-byte length field.
pub const MAX_PACKET_LENGTH: usize = 0xFFFF;

/// Opcode/response byte plus the length field.
pub const PACKET_HEADER_LENGTH: usize = 3;

/// Identifier plus length prefix in front of Body/EndOfBody data.
pub const BODY_HEADER_OVERHEAD: usize = 3;

/// OBEX protocol version 1.0.
pub const OBEX_VERSION: u8 = 0x10;

/// Builds a packet in place, back-patching the length on [`finish`].
///
/// [`finish`]: PacketWriter::finish
#[derive(Debug)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// Start a packet with the given opcode or response code.
    pub fn new(code: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(code);
        buf.extend_from_slice(&[0x00, 0x00]);
        Self { buf }
    }

    /// Start a Connect request or response: version, flags, max length.
    pub fn connect(code: u8, max_packet_length: u16) -> Self {
        let mut writer = Self::new(code);
        writer.buf.push(OBEX_VERSION);
        writer.buf.push(0x00);
        writer
            .buf
            .extend_from_slice(&max_packet_length.to_be_bytes());
        writer
    }

    pub fn header(mut self, header: Header<'_>) -> Self {
        self.buf.reserve(header.encoded_len());
        header.encode(&mut self.buf);
        self
    }

    /// Bytes written so far, including the 3-byte packet header.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= PACKET_HEADER_LENGTH
    }

    /// Write the final length and return the encoded packet.
    pub fn finish(mut self) -> Result<Vec<u8>, ObexError> {
        let len = self.buf.len();
        if len > MAX_PACKET_LENGTH {
            return Err(ObexError::PacketTooLarge(len));
        }
        self.buf[1..3].copy_from_slice(&(len as u16).to_be_bytes());
        Ok(self.buf)
    }
}

/// Parameters carried in the fixed part of a Connect packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectInfo {
    pub version: u8,
    pub flags: u8,
    pub max_packet_length: u16,
}

impl ConnectInfo {
    /// Decode the four bytes following the packet header.
    pub fn parse(data: &[u8]) -> Result<Self, ObexError> {
        if data.len() < 4 {
            return Err(ObexError::Truncated {
                needed: 4,
                available: data.len(),
            });
        }
        Ok(Self {
            version: data[0],
            flags: data[1],
            max_packet_length: u16::from_be_bytes([data[2], data[3]]),
        })
    }
}

/// A complete packet split into its code and the bytes after the length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub code: u8,
    pub data: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Split a complete packet. The declared length must match `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ObexError> {
        if bytes.len() < PACKET_HEADER_LENGTH {
            return Err(ObexError::Truncated {
                needed: PACKET_HEADER_LENGTH,
                available: bytes.len(),
            });
        }
        let declared = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        if declared < PACKET_HEADER_LENGTH {
            return Err(ObexError::InvalidLength(declared));
        }
        if declared > bytes.len() {
            return Err(ObexError::Truncated {
                needed: declared,
                available: bytes.len(),
            });
        }
        Ok(Self {
            code: bytes[0],
            data: &bytes[PACKET_HEADER_LENGTH..declared],
        })
    }

    /// Connect parameters followed by the header block.
    pub fn connect_parts(&self) -> Result<(ConnectInfo, HeaderSet), ObexError> {
        let info = ConnectInfo::parse(self.data)?;
        let headers = HeaderSet::parse(&self.data[4..])?;
        Ok((info, headers))
    }

    /// Header block of a packet without extra fixed fields.
    pub fn headers(&self) -> Result<HeaderSet, ObexError> {
        HeaderSet::parse(self.data)
    }
}

/// Largest body chunk that fits in one Put under the peer's packet limit.
pub fn max_body_length(remote_max_packet_length: u16) -> usize {
    (remote_max_packet_length as usize).saturating_sub(PACKET_HEADER_LENGTH + BODY_HEADER_OVERHEAD)
}

pub fn connect_request(max_packet_length: u16) -> Result<Vec<u8>, ObexError> {
    PacketWriter::connect(OpCode::Connect.as_byte(), max_packet_length).finish()
}

pub fn connect_response(
    code: ResponseCode,
    max_packet_length: u16,
) -> Result<Vec<u8>, ObexError> {
    PacketWriter::connect(code.to_byte(true), max_packet_length).finish()
}

pub fn disconnect_request() -> Result<Vec<u8>, ObexError> {
    PacketWriter::new(OpCode::Disconnect.as_byte()).finish()
}

pub fn abort_request() -> Result<Vec<u8>, ObexError> {
    PacketWriter::new(OpCode::Abort.as_byte()).finish()
}

/// First Put of a transfer: object metadata, no body.
pub fn put_header_request(
    connection_id: u32,
    name: &str,
    content_type: Option<&str>,
    length: u32,
) -> Result<Vec<u8>, ObexError> {
    let mut writer = PacketWriter::new(OpCode::Put.as_byte())
        .header(Header::ConnectionId(connection_id))
        .header(Header::Name(name));
    if let Some(mime) = content_type.filter(|mime| !mime.is_empty()) {
        writer = writer.header(Header::Type(mime));
    }
    writer.header(Header::Length(length)).finish()
}

/// A Put carrying one body chunk, or PutFinal with EndOfBody.
pub fn put_body_request(
    body: &[u8],
    is_final: bool,
    remote_max_packet_length: u16,
) -> Result<Vec<u8>, ObexError> {
    let max = max_body_length(remote_max_packet_length);
    if body.len() > max {
        return Err(ObexError::PayloadTooLarge {
            len: body.len(),
            max,
        });
    }
    if is_final {
        PacketWriter::new(OpCode::PutFinal.as_byte())
            .header(Header::EndOfBody(body))
            .finish()
    } else {
        PacketWriter::new(OpCode::Put.as_byte())
            .header(Header::Body(body))
            .finish()
    }
}

/// A bare response, used by the receiving side.
pub fn response(code: ResponseCode, is_final: bool) -> Result<Vec<u8>, ObexError> {
    PacketWriter::new(code.to_byte(is_final)).finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_bytes() {
        assert_eq!(
            connect_request(0xFFFF).unwrap(),
            vec![0x80, 0x00, 0x07, 0x10, 0x00, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_connect_response_parses() {
        let bytes = connect_response(ResponseCode::Success, 0x1000).unwrap();
        let packet = Packet::parse(&bytes).unwrap();
        assert_eq!(packet.code, 0xA0);
        let (info, headers) = packet.connect_parts().unwrap();
        assert_eq!(info.version, OBEX_VERSION);
        assert_eq!(info.max_packet_length, 0x1000);
        assert_eq!(headers, HeaderSet::new());
    }

    #[test]
    fn test_simple_requests() {
        assert_eq!(disconnect_request().unwrap(), vec![0x81, 0x00, 0x03]);
        assert_eq!(abort_request().unwrap(), vec![0xFF, 0x00, 0x03]);
        assert_eq!(
            response(ResponseCode::Continue, true).unwrap(),
            vec![0x90, 0x00, 0x03]
        );
    }

    #[test]
    fn test_put_header_request() {
        let bytes = put_header_request(1, "photo.jpg", Some("image/jpeg"), 120_000).unwrap();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(
            u16::from_be_bytes([bytes[1], bytes[2]]) as usize,
            bytes.len()
        );

        let headers = Packet::parse(&bytes).unwrap().headers().unwrap();
        assert_eq!(headers.connection_id(), Some(1));
        assert_eq!(headers.name().unwrap().as_deref(), Some("photo.jpg"));
        assert_eq!(headers.content_type().unwrap().as_deref(), Some("image/jpeg"));
        assert_eq!(headers.length(), Some(120_000));
        assert_eq!(headers.body(), None);
    }

    #[test]
    fn test_put_header_without_type() {
        let bytes = put_header_request(1, "notes", None, 0).unwrap();
        let headers = Packet::parse(&bytes).unwrap().headers().unwrap();
        assert!(!headers.has(super::super::HeaderId::Type));
        assert_eq!(headers.length(), Some(0));
    }

    #[test]
    fn test_body_chunk_limits() {
        let max = max_body_length(0x0100);
        assert_eq!(max, 0x0100 - 6);

        let exact = vec![0xAB; max];
        let bytes = put_body_request(&exact, false, 0x0100).unwrap();
        assert_eq!(bytes.len(), 0x0100);
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[3], 0x48);

        let over = vec![0xAB; max + 1];
        assert_eq!(
            put_body_request(&over, false, 0x0100).unwrap_err(),
            ObexError::PayloadTooLarge { len: max + 1, max }
        );
    }

    #[test]
    fn test_final_body_uses_end_of_body() {
        let bytes = put_body_request(b"end", true, 0xFFFF).unwrap();
        assert_eq!(bytes[0], 0x82);
        let headers = Packet::parse(&bytes).unwrap().headers().unwrap();
        assert!(headers.is_end_of_body());
        assert_eq!(headers.body(), Some(&b"end"[..]));
    }

    #[test]
    fn test_empty_final_body() {
        let bytes = put_body_request(&[], true, 0xFFFF).unwrap();
        assert_eq!(bytes, vec![0x82, 0x00, 0x06, 0x49, 0x00, 0x03]);
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let body = vec![0u8; MAX_PACKET_LENGTH];
        let err = PacketWriter::new(0x02)
            .header(Header::Body(&body))
            .finish()
            .unwrap_err();
        assert!(matches!(err, ObexError::PacketTooLarge(_)));
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert!(matches!(
            Packet::parse(&[0xA0, 0x00]),
            Err(ObexError::Truncated { .. })
        ));
        assert_eq!(
            Packet::parse(&[0xA0, 0x00, 0x02]).unwrap_err(),
            ObexError::InvalidLength(2)
        );
        assert!(matches!(
            Packet::parse(&[0xA0, 0x00, 0x08, 0x10]),
            Err(ObexError::Truncated { .. })
        ));
    }
}
