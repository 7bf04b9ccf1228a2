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

//! Bluetooth profile engines over RFCOMM.
//!
//! Object Push file transfer over OBEX, and the audio gateway side of the
//! Hands-Free and Headset profiles over AT commands. Sockets are abstracted
//! behind [`transport::Transport`]; the BlueZ implementation is behind the
//! `bluez` feature.

pub mod address;
pub mod config;
pub mod error;
pub mod events;
pub mod hfp;
pub mod obex;
pub mod opp;
pub mod sco;
pub mod service;
pub mod session;
pub mod transport;

pub use address::BluetoothAddress;
pub use error::{ProfileError, Result};
pub use events::{Broadcaster, SystemMessage};
pub use service::{Link, ProfileLinks, ProfileService, ServiceHandle};
