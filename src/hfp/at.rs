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

//! AT command lines: framing and parsing.

use thiserror::Error;
use tracing::warn;

/// Longest command line kept while waiting for its terminator.
pub const MAX_LINE_LENGTH: usize = 512;

/// Largest speaker gain in `AT+VGS`.
pub const MAX_VGS: u8 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtError {
    #[error("invalid argument for {command}: {argument:?}")]
    InvalidArgument {
        command: &'static str,
        argument: String,
    },
}

/// Commands sent by a hands-free or headset unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `AT+BRSF=<features>`, `None` when the bitmap is unreadable.
    SupportedFeatures(Option<u32>),
    /// `AT+CIND=?`
    IndicatorTest,
    /// `AT+CIND?`
    IndicatorRead,
    /// `AT+CMER=...`
    EventReporting,
    /// `AT+CHLD=?`
    CallHoldTest,
    /// `AT+CHLD=<n>`
    CallHold,
    /// `AT+VGS=<gain>`
    SpeakerGain(u8),
    /// `AT+BLDN`
    Redial,
    /// `ATA`
    Answer,
    /// `AT+CHUP`
    HangUp,
    /// `AT+CKPD=...`, the headset button.
    KeyPress,
    Unknown(String),
}

type ArgParser = fn(&str) -> Result<AtCommand, AtError>;

/// Prefix dispatch table. Longer prefixes that share a stem with a shorter
/// one come first.
static COMMANDS: &[(&str, ArgParser)] = &[
    ("AT+BRSF=", parse_brsf),
    ("AT+CIND=?", |_| Ok(AtCommand::IndicatorTest)),
    ("AT+CIND?", |_| Ok(AtCommand::IndicatorRead)),
    ("AT+CMER=", |_| Ok(AtCommand::EventReporting)),
    ("AT+CHLD=?", |_| Ok(AtCommand::CallHoldTest)),
    ("AT+CHLD=", |_| Ok(AtCommand::CallHold)),
    ("AT+VGS=", parse_vgs),
    ("AT+BLDN", |_| Ok(AtCommand::Redial)),
    ("ATA", |_| Ok(AtCommand::Answer)),
    ("AT+CHUP", |_| Ok(AtCommand::HangUp)),
    ("AT+CKPD", |_| Ok(AtCommand::KeyPress)),
];

impl AtCommand {
    /// Parse one line without its terminator.
    pub fn parse(line: &str) -> Result<Self, AtError> {
        let line = line.trim();
        let upper = line.to_ascii_uppercase();
        for (prefix, parse) in COMMANDS {
            if upper.starts_with(prefix) {
                return parse(line[prefix.len()..].trim());
            }
        }
        Ok(AtCommand::Unknown(line.to_string()))
    }
}

fn parse_brsf(argument: &str) -> Result<AtCommand, AtError> {
    Ok(AtCommand::SupportedFeatures(argument.parse().ok()))
}

fn parse_vgs(argument: &str) -> Result<AtCommand, AtError> {
    let invalid = || AtError::InvalidArgument {
        command: "AT+VGS",
        argument: argument.to_string(),
    };
    if argument.is_empty() || argument.len() > 2 || !argument.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match argument.parse::<u8>() {
        Ok(gain) if gain <= MAX_VGS => Ok(AtCommand::SpeakerGain(gain)),
        _ => Err(invalid()),
    }
}

/// Wrap a response line as `CR LF <line> CR LF`.
pub fn frame(line: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 4);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(b"\r\n");
    out
}

/// Splits a byte stream into command lines.
///
/// CR, LF or both end a line. Bytes after the last terminator stay buffered
/// for the next push.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\r' || byte == b'\n' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else if self.pending.len() >= MAX_LINE_LENGTH {
                warn!("AT line exceeds {} bytes, discarding", MAX_LINE_LENGTH);
                self.pending.clear();
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn has_partial_line(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_order() {
        assert_eq!(AtCommand::parse("AT+CIND=?"), Ok(AtCommand::IndicatorTest));
        assert_eq!(AtCommand::parse("AT+CIND?"), Ok(AtCommand::IndicatorRead));
        assert_eq!(AtCommand::parse("AT+CHLD=?"), Ok(AtCommand::CallHoldTest));
        assert_eq!(AtCommand::parse("AT+CHLD=1"), Ok(AtCommand::CallHold));
        assert_eq!(AtCommand::parse("AT+CMER=3,0,0,1"), Ok(AtCommand::EventReporting));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(AtCommand::parse("AT+BRSF=127"), Ok(AtCommand::SupportedFeatures(Some(127))));
        assert_eq!(AtCommand::parse("ATA"), Ok(AtCommand::Answer));
        assert_eq!(AtCommand::parse("at+chup"), Ok(AtCommand::HangUp));
        assert_eq!(AtCommand::parse("AT+BLDN"), Ok(AtCommand::Redial));
        assert_eq!(AtCommand::parse("AT+CKPD=200"), Ok(AtCommand::KeyPress));
        assert_eq!(
            AtCommand::parse("AT+NREC=0"),
            Ok(AtCommand::Unknown("AT+NREC=0".to_string()))
        );
    }

    #[test]
    fn test_vgs_arguments() {
        assert_eq!(AtCommand::parse("AT+VGS=07"), Ok(AtCommand::SpeakerGain(7)));
        assert_eq!(AtCommand::parse("AT+VGS=15"), Ok(AtCommand::SpeakerGain(15)));
        assert_eq!(AtCommand::parse("AT+VGS=0"), Ok(AtCommand::SpeakerGain(0)));
        for bad in ["AT+VGS=16", "AT+VGS=", "AT+VGS=123", "AT+VGS=x1", "AT+VGS=-1"] {
            assert!(AtCommand::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_brsf_tolerates_garbage() {
        assert_eq!(AtCommand::parse("AT+BRSF=abc"), Ok(AtCommand::SupportedFeatures(None)));
        assert_eq!(AtCommand::parse("AT+BRSF="), Ok(AtCommand::SupportedFeatures(None)));
    }

    #[test]
    fn test_frame() {
        assert_eq!(frame("OK"), b"\r\nOK\r\n".to_vec());
    }

    #[test]
    fn test_line_buffer_partial_lines() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"AT+VG").is_empty());
        assert!(buffer.has_partial_line());
        assert_eq!(buffer.push(b"S=07\r\nAT"), vec!["AT+VGS=07".to_string()]);
        assert_eq!(
            buffer.push(b"A\rAT+CHUP\n"),
            vec!["ATA".to_string(), "AT+CHUP".to_string()]
        );
        assert!(!buffer.has_partial_line());
    }

    #[test]
    fn test_line_buffer_overflow() {
        let mut buffer = LineBuffer::new();
        let noise = vec![b'A'; MAX_LINE_LENGTH + 10];
        buffer.push(&noise);
        assert_eq!(buffer.push(b"\r"), vec!["A".repeat(9)]);
    }
}
