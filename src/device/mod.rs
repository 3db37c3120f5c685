//! Device records and the save-time lifecycle
//!
//! Saving a device makes sure it is registered on the LoRaWAN network and
//! keeps its three-word address and coordinates in agreement.

pub mod manager;
pub mod snapshot;

pub use manager::{DeviceManager, LifecycleError};
pub use snapshot::{ChangeKind, LoadedDevice, LoadedSnapshot};

use crate::geocoding::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deployed sensor node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    /// Assigned by storage on first insert
    pub id: Option<i64>,
    /// Also the device ID on the network registry
    pub name: String,
    #[serde(rename = "macaddress")]
    pub mac_address: String,
    pub w3w_location: Option<String>,
    pub geolocation: Option<Coordinates>,
    /// Set once by registration, never cleared
    pub network_dev_eui: Option<String>,
    pub is_active: bool,
    pub deployed_at: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Operator input for a new device
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    #[serde(rename = "macaddress")]
    pub mac_address: String,
    #[serde(default)]
    pub w3w_location: Option<String>,
    #[serde(default)]
    pub geolocation: Option<Coordinates>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
}

impl From<NewDevice> for Device {
    fn from(new: NewDevice) -> Self {
        Device {
            id: None,
            name: new.name,
            mac_address: new.mac_address,
            w3w_location: new.w3w_location,
            geolocation: new.geolocation,
            network_dev_eui: None,
            is_active: new.is_active,
            deployed_at: new.deployed_at,
            last_seen: None,
        }
    }
}

/// Partial update; absent fields are left as stored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceChanges {
    pub name: Option<String>,
    #[serde(rename = "macaddress")]
    pub mac_address: Option<String>,
    pub w3w_location: Option<String>,
    pub geolocation: Option<Coordinates>,
    pub is_active: Option<bool>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceChanges {
    /// Copy every present field onto `device`. Identity checks happen in the
    /// manager before this is called.
    pub(crate) fn apply_to(self, device: &mut Device) {
        if let Some(name) = self.name {
            device.name = name;
        }
        if let Some(w3w) = self.w3w_location {
            device.w3w_location = Some(w3w);
        }
        if let Some(coordinates) = self.geolocation {
            device.geolocation = Some(coordinates);
        }
        if let Some(active) = self.is_active {
            device.is_active = active;
        }
        if let Some(at) = self.deployed_at {
            device.deployed_at = Some(at);
        }
        if let Some(at) = self.last_seen {
            device.last_seen = Some(at);
        }
    }
}
