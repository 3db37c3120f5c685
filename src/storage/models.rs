//! Row types for the inventory tables

use crate::device::Device;
use crate::geocoding::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct DeviceRow {
    pub id: i64,
    pub name: String,
    pub mac_address: String,
    pub w3w_location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub network_dev_eui: Option<String>,
    pub is_active: bool,
    pub deployed_at: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        let geolocation = match (row.latitude, row.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };
        Device {
            id: Some(row.id),
            name: row.name,
            mac_address: row.mac_address,
            w3w_location: row.w3w_location,
            geolocation,
            network_dev_eui: row.network_dev_eui,
            is_active: row.is_active,
            deployed_at: row.deployed_at,
            last_seen: row.last_seen,
        }
    }
}

/// A named measurement kind, e.g. soil moisture in %
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricType {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub unit: String,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.name, self.description, self.unit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetricType {
    pub name: String,
    pub description: String,
    pub unit: String,
}

/// One observation; rows are never updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceMetric {
    pub id: i64,
    pub device_id: i64,
    pub metric_type_id: i64,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeviceMetric {
    pub metric_type_id: i64,
    pub value: f64,
    /// Defaults to the time of insertion
    pub recorded_at: Option<DateTime<Utc>>,
}
