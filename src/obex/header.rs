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

//! OBEX header encoding and header-block parsing.

use std::collections::BTreeMap;
use tracing::debug;

use super::ObexError;

/// Header identifiers understood by the push engine.
///
/// The upper two bits of an identifier select its wire encoding, see
/// [`HeaderEncoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HeaderId {
    Name = 0x01,
    Type = 0x42,
    Length = 0xC3,
    Body = 0x48,
    EndOfBody = 0x49,
    ConnectionId = 0xCB,
}

impl HeaderId {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Name),
            0x42 => Some(Self::Type),
            0xC3 => Some(Self::Length),
            0x48 => Some(Self::Body),
            0x49 => Some(Self::EndOfBody),
            0xCB => Some(Self::ConnectionId),
            _ => None,
        }
    }
}

/// Wire layout selected by the upper two bits of a header identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderEncoding {
    /// NUL-terminated UTF-16BE text with a 2-byte length prefix.
    Text,
    /// Byte sequence with a 2-byte length prefix.
    Bytes,
    OneByte,
    FourBytes,
}

impl HeaderEncoding {
    fn of(id: u8) -> Self {
        match id & 0xC0 {
            0x00 => Self::Text,
            0x40 => Self::Bytes,
            0x80 => Self::OneByte,
            _ => Self::FourBytes,
        }
    }
}

/// A header to be written into an outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header<'a> {
    ConnectionId(u32),
    Name(&'a str),
    Type(&'a str),
    Length(u32),
    Body(&'a [u8]),
    EndOfBody(&'a [u8]),
}

impl Header<'_> {
    pub fn id(&self) -> HeaderId {
        match self {
            Header::ConnectionId(_) => HeaderId::ConnectionId,
            Header::Name(_) => HeaderId::Name,
            Header::Type(_) => HeaderId::Type,
            Header::Length(_) => HeaderId::Length,
            Header::Body(_) => HeaderId::Body,
            Header::EndOfBody(_) => HeaderId::EndOfBody,
        }
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Header::ConnectionId(_) | Header::Length(_) => 5,
            // identifier + length + UTF-16 code units + NUL
            Header::Name(name) => 3 + (name.encode_utf16().count() + 1) * 2,
            Header::Type(mime) => 3 + mime.len() + 1,
            Header::Body(body) | Header::EndOfBody(body) => 3 + body.len(),
        }
    }

    /// Append the encoded header to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.id() as u8);
        match self {
            Header::ConnectionId(value) | Header::Length(value) => {
                buf.extend_from_slice(&value.to_be_bytes());
            }
            Header::Name(name) => {
                buf.extend_from_slice(&(self.encoded_len() as u16).to_be_bytes());
                for unit in name.encode_utf16() {
                    buf.extend_from_slice(&unit.to_be_bytes());
                }
                buf.extend_from_slice(&[0x00, 0x00]);
            }
            Header::Type(mime) => {
                buf.extend_from_slice(&(self.encoded_len() as u16).to_be_bytes());
                buf.extend_from_slice(mime.as_bytes());
                buf.push(0x00);
            }
            Header::Body(body) | Header::EndOfBody(body) => {
                buf.extend_from_slice(&(self.encoded_len() as u16).to_be_bytes());
                buf.extend_from_slice(body);
            }
        }
    }
}

/// Headers decoded from one complete packet, keyed by identifier.
///
/// Values are kept as raw bytes (without identifier or length prefix) and
/// interpreted on access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: BTreeMap<HeaderId, Vec<u8>>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk a header block. Unknown identifiers are skipped using the
    /// length implied by their encoding.
    pub fn parse(block: &[u8]) -> Result<Self, ObexError> {
        let mut set = Self::new();
        let mut offset = 0;

        while offset < block.len() {
            let id = block[offset];
            let (value_start, value_end) = match HeaderEncoding::of(id) {
                HeaderEncoding::Text | HeaderEncoding::Bytes => {
                    ensure_available(block, offset + 3)?;
                    let declared =
                        u16::from_be_bytes([block[offset + 1], block[offset + 2]]) as usize;
                    if declared < 3 {
                        return Err(ObexError::InvalidLength(declared));
                    }
                    ensure_available(block, offset + declared)?;
                    (offset + 3, offset + declared)
                }
                HeaderEncoding::OneByte => {
                    ensure_available(block, offset + 2)?;
                    (offset + 1, offset + 2)
                }
                HeaderEncoding::FourBytes => {
                    ensure_available(block, offset + 5)?;
                    (offset + 1, offset + 5)
                }
            };

            let value = &block[value_start..value_end];
            match HeaderId::from_byte(id) {
                Some(body @ (HeaderId::Body | HeaderId::EndOfBody)) => {
                    set.headers.entry(body).or_default().extend_from_slice(value);
                }
                Some(known) => {
                    set.headers.insert(known, value.to_vec());
                }
                None => debug!("Skipping unknown OBEX header 0x{:02X}", id),
            }

            offset = value_end;
        }

        Ok(set)
    }

    /// Store a header, replacing any previous value with the same id.
    pub fn insert(&mut self, header: Header<'_>) {
        let mut encoded = Vec::with_capacity(header.encoded_len());
        header.encode(&mut encoded);
        let prefix = match HeaderEncoding::of(header.id() as u8) {
            HeaderEncoding::Text | HeaderEncoding::Bytes => 3,
            _ => 1,
        };
        self.headers.insert(header.id(), encoded.split_off(prefix));
    }

    pub fn has(&self, id: HeaderId) -> bool {
        self.headers.contains_key(&id)
    }

    /// Raw value bytes of a header.
    pub fn raw(&self, id: HeaderId) -> Option<&[u8]> {
        self.headers.get(&id).map(Vec::as_slice)
    }

    /// The Name header, decoded from NUL-terminated UTF-16BE.
    pub fn name(&self) -> Result<Option<String>, ObexError> {
        let Some(raw) = self.raw(HeaderId::Name) else {
            return Ok(None);
        };
        if raw.len() % 2 != 0 {
            return Err(ObexError::InvalidText("Name"));
        }
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        String::from_utf16(&units)
            .map(Some)
            .map_err(|_| ObexError::InvalidText("Name"))
    }

    /// The Type header, decoded from NUL-terminated ASCII.
    pub fn content_type(&self) -> Result<Option<String>, ObexError> {
        let Some(raw) = self.raw(HeaderId::Type) else {
            return Ok(None);
        };
        let text = raw.split(|b| *b == 0).next().unwrap_or_default();
        if !text.is_ascii() {
            return Err(ObexError::InvalidText("Type"));
        }
        Ok(Some(String::from_utf8_lossy(text).into_owned()))
    }

    pub fn length(&self) -> Option<u32> {
        self.raw(HeaderId::Length).and_then(be_u32)
    }

    pub fn connection_id(&self) -> Option<u32> {
        self.raw(HeaderId::ConnectionId).and_then(be_u32)
    }

    /// Body bytes carried by either Body or EndOfBody.
    pub fn body(&self) -> Option<&[u8]> {
        self.raw(HeaderId::Body).or_else(|| self.raw(HeaderId::EndOfBody))
    }

    pub fn is_end_of_body(&self) -> bool {
        self.has(HeaderId::EndOfBody)
    }
}

fn ensure_available(block: &[u8], needed: usize) -> Result<(), ObexError> {
    if needed > block.len() {
        return Err(ObexError::Truncated {
            needed,
            available: block.len(),
        });
    }
    Ok(())
}

fn be_u32(raw: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = raw.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
