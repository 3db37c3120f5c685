//! What a device looked like when it was read, and what changed since

use super::Device;
use crate::geocoding::Coordinates;

/// Location fields as they were at load time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedSnapshot {
    pub w3w_location: Option<String>,
    pub geolocation: Option<Coordinates>,
}

impl LoadedSnapshot {
    pub fn capture(device: &Device) -> Self {
        Self {
            w3w_location: device.w3w_location.clone(),
            geolocation: device.geolocation,
        }
    }

    /// Snapshot of a device that was never stored
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Which location field drives geocoding on this save
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Resolve coordinates from this address
    AddressChanged(String),
    /// Resolve an address from these coordinates
    CoordinatesChanged(Coordinates),
    Unchanged,
}

impl ChangeKind {
    /// An address change wins over a coordinate change.
    ///
    /// A blank address never counts, and neither do coordinates that were
    /// cleared or set to `(0, 0)`.
    pub fn between(snapshot: &LoadedSnapshot, current: &Device) -> Self {
        if let Some(address) = current.w3w_location.as_deref() {
            let address = address.trim();
            let before = snapshot.w3w_location.as_deref().map(str::trim);
            if !address.is_empty() && before != Some(address) {
                return ChangeKind::AddressChanged(address.to_string());
            }
        }

        match current.geolocation {
            Some(coordinates)
                if !coordinates.is_unset() && snapshot.geolocation != Some(coordinates) =>
            {
                ChangeKind::CoordinatesChanged(coordinates)
            }
            _ => ChangeKind::Unchanged,
        }
    }
}

/// A device together with the snapshot it is diffed against on save
#[derive(Debug, Clone)]
pub struct LoadedDevice {
    snapshot: LoadedSnapshot,
    pub device: Device,
}

impl LoadedDevice {
    /// Wrap a device read from storage
    pub fn loaded(device: Device) -> Self {
        Self {
            snapshot: LoadedSnapshot::capture(&device),
            device,
        }
    }

    /// Wrap a device that has not been stored yet; every supplied location
    /// field counts as changed
    pub fn new(device: Device) -> Self {
        Self {
            snapshot: LoadedSnapshot::empty(),
            device,
        }
    }

    pub fn snapshot(&self) -> &LoadedSnapshot {
        &self.snapshot
    }

    pub fn change(&self) -> ChangeKind {
        ChangeKind::between(&self.snapshot, &self.device)
    }
}
