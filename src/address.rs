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

//! Bluetooth device addresses and BlueZ object paths.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string is not a `XX:XX:XX:XX:XX:XX` address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bluetooth address: {0}")]
pub struct AddressParseError(String);

/// A Bluetooth device address (`BD_ADDR`), most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BluetoothAddress(pub [u8; 6]);

impl BluetoothAddress {
    /// The all-zero address reported while no device is connected.
    pub const ANY: Self = Self([0; 6]);

    /// Create an address from raw bytes.
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Raw address bytes.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Build the BlueZ device object path below `adapter_path`.
    ///
    /// `/org/bluez/2906/hci0` + `00:23:7F:CB:B4:F1` gives
    /// `/org/bluez/2906/hci0/dev_00_23_7F_CB_B4_F1`.
    pub fn to_object_path(&self, adapter_path: &str) -> String {
        format!("{}/dev_{}", adapter_path, self.to_string().replace(':', "_"))
    }

    /// Extract the address from a BlueZ device object path.
    pub fn from_object_path(path: &str) -> Result<Self, AddressParseError> {
        let leaf = path
            .rsplit('/')
            .next()
            .and_then(|leaf| leaf.strip_prefix("dev_"))
            .ok_or_else(|| AddressParseError(path.to_string()))?;
        leaf.replace('_', ":").parse()
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for BluetoothAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError(s.to_string());
        if s.len() != 17 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for BluetoothAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl Serialize for BluetoothAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let addr: BluetoothAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");

        let lower: BluetoothAddress = "0a:b1:2c:d3:4e:f5".parse().unwrap();
        assert_eq!(lower.to_string(), "0A:B1:2C:D3:4E:F5");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("AA:BB:CC:DD:EE".parse::<BluetoothAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<BluetoothAddress>().is_err());
        assert!("AABBCCDDEEFF12345".parse::<BluetoothAddress>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<BluetoothAddress>().is_err());
        assert!("+A:BB:CC:DD:EE:FF".parse::<BluetoothAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:-1".parse::<BluetoothAddress>().is_err());
    }

    #[test]
    fn test_object_path_conversion() {
        let addr: BluetoothAddress = "00:23:7F:CB:B4:F1".parse().unwrap();
        let path = addr.to_object_path("/org/bluez/2906/hci0");
        assert_eq!(path, "/org/bluez/2906/hci0/dev_00_23_7F_CB_B4_F1");
        assert_eq!(BluetoothAddress::from_object_path(&path).unwrap(), addr);
        assert!(BluetoothAddress::from_object_path("/org/bluez/hci0").is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let addr = BluetoothAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"01:02:03:04:05:06\""
        );
    }
}
