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

//! Error types shared by the profile managers.

use thiserror::Error;

use crate::obex::ObexError;

/// Errors surfaced by the OPP, HFP and SCO managers.
///
/// None of these are fatal: every failure path leaves the manager idle or
/// listening so the next connection can proceed.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Connect, listen or send failed in the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// An OBEX packet could not be decoded.
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] ObexError),

    /// The file does not fit in the 32-bit OBEX Length header.
    #[error("file of {0} bytes exceeds the OBEX length limit")]
    UnsupportedSize(u64),

    /// A connection or transfer is already in progress.
    #[error("operation already in progress")]
    AlreadyActive,

    /// Creating or writing the output file failed.
    #[error("storage error: {0}")]
    Storage(#[source] std::io::Error),

    /// The profile has no established connection.
    #[error("not connected")]
    NotConnected,

    /// The request is not valid in the current session state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The protocol task is gone.
    #[error("profile service stopped")]
    ServiceStopped,
}

impl ProfileError {
    /// Build a transport error from anything printable.
    pub fn transport(reason: impl std::fmt::Display) -> Self {
        Self::Transport(reason.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ProfileError>;
