//! LoRaWAN end-device identifiers used during provisioning
//!
//! - DevEUI: derived from the device's hardware MAC address
//! - JoinEUI: fixed all-zero placeholder, no per-device allocation
//! - AppKey: pre-shared root key, see [`keys`]

pub mod keys;

use serde::{Deserialize, Serialize};
use std::fmt;

/// All-zero JoinEUI (a.k.a. AppEUI) written into every registration
pub const ZERO_JOIN_EUI: &str = "0000000000000000";

/// Device EUI as sent to the network server (uppercase hex, no separators)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevEui(String);

impl DevEui {
    /// Derive the DevEUI directly from a MAC address.
    ///
    /// Separators (`:`, `-`, `.`, whitespace) are dropped and the hex digits
    /// uppercased. The digits are used verbatim: no padding is added, so a
    /// 48-bit MAC yields a 12-digit EUI.
    pub fn from_mac(mac: &str) -> anyhow::Result<Self> {
        let bare: String = mac
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if bare.is_empty() {
            return Err(anyhow::anyhow!("MAC address has no hex digits"));
        }
        if bare.len() > 16 {
            return Err(anyhow::anyhow!(
                "MAC address too long for an EUI-64: {} hex digits",
                bare.len()
            ));
        }
        hex::decode(&bare).map_err(|e| anyhow::anyhow!("MAC address {:?} is not hex: {}", mac, e))?;

        Ok(Self(bare))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
