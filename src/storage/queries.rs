//! Query methods for the inventory database

use super::models::DeviceRow;
use super::{
    Database, DeviceMetric, DeviceStore, MetricType, NewDeviceMetric, NewMetricType, StoreError,
};
use crate::device::Device;
use async_trait::async_trait;
use chrono::Utc;

const DEVICE_COLUMNS: &str = "id, name, mac_address, w3w_location, latitude, longitude, \
     network_dev_eui, is_active, deployed_at, last_seen";

#[async_trait]
impl DeviceStore for Database {
    async fn insert_device(&self, device: &Device) -> Result<Device, StoreError> {
        let (latitude, longitude) = split_coordinates(device);
        let result = sqlx::query(
            "INSERT INTO devices (name, mac_address, w3w_location, latitude, longitude,
                                  network_dev_eui, is_active, deployed_at, last_seen)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&device.name)
        .bind(&device.mac_address)
        .bind(&device.w3w_location)
        .bind(latitude)
        .bind(longitude)
        .bind(&device.network_dev_eui)
        .bind(device.is_active)
        .bind(device.deployed_at)
        .bind(device.last_seen)
        .execute(self.pool())
        .await?;

        self.device_by_id(result.last_insert_rowid()).await
    }

    async fn update_device(&self, device: &Device) -> Result<Device, StoreError> {
        let id = device
            .id
            .ok_or_else(|| StoreError::NotFound(format!("device {} has no id", device.name)))?;
        let (latitude, longitude) = split_coordinates(device);

        let result = sqlx::query(
            "UPDATE devices
             SET name = ?, mac_address = ?, w3w_location = ?, latitude = ?, longitude = ?,
                 network_dev_eui = ?, is_active = ?, deployed_at = ?, last_seen = ?
             WHERE id = ?",
        )
        .bind(&device.name)
        .bind(&device.mac_address)
        .bind(&device.w3w_location)
        .bind(latitude)
        .bind(longitude)
        .bind(&device.network_dev_eui)
        .bind(device.is_active)
        .bind(device.deployed_at)
        .bind(device.last_seen)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("device id {id}")));
        }
        self.device_by_id(id).await
    }

    async fn device_by_id(&self, id: i64) -> Result<Device, StoreError> {
        let row: DeviceRow =
            sqlx::query_as(&format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("device id {id}")))?;
        Ok(row.into())
    }

    async fn device_by_name(&self, name: &str) -> Result<Device, StoreError> {
        let row: DeviceRow =
            sqlx::query_as(&format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE name = ?"))
                .bind(name)
                .fetch_optional(self.pool())
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("device {name}")))?;
        Ok(row.into())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let rows: Vec<DeviceRow> =
            sqlx::query_as(&format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY name"))
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(Device::from).collect())
    }

    async fn delete_device(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("device id {id}")));
        }
        Ok(())
    }
}

fn split_coordinates(device: &Device) -> (Option<f64>, Option<f64>) {
    match device.geolocation {
        Some(c) => (Some(c.latitude), Some(c.longitude)),
        None => (None, None),
    }
}

// Metric types and device metrics

impl Database {
    pub async fn create_metric_type(&self, new: &NewMetricType) -> Result<MetricType, StoreError> {
        let result =
            sqlx::query("INSERT INTO metric_types (name, description, unit) VALUES (?, ?, ?)")
                .bind(&new.name)
                .bind(&new.description)
                .bind(&new.unit)
                .execute(self.pool())
                .await?;

        self.metric_type(result.last_insert_rowid()).await
    }

    pub async fn metric_type(&self, id: i64) -> Result<MetricType, StoreError> {
        sqlx::query_as("SELECT id, name, description, unit FROM metric_types WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("metric type {id}")))
    }

    pub async fn list_metric_types(&self) -> Result<Vec<MetricType>, StoreError> {
        let types = sqlx::query_as("SELECT id, name, description, unit FROM metric_types ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(types)
    }

    pub async fn delete_metric_type(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM metric_types WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("metric type {id}")));
        }
        Ok(())
    }

    /// Record one observation; an unknown device or metric type is `NotFound`
    pub async fn record_metric(
        &self,
        device_id: i64,
        new: &NewDeviceMetric,
    ) -> Result<DeviceMetric, StoreError> {
        let recorded_at = new.recorded_at.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            "INSERT INTO device_metrics (device_id, metric_type_id, value, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(new.metric_type_id)
        .bind(new.value)
        .bind(recorded_at)
        .execute(self.pool())
        .await?;

        let metric = sqlx::query_as(
            "SELECT id, device_id, metric_type_id, value, recorded_at
             FROM device_metrics WHERE id = ?",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(metric)
    }

    /// Most recent first
    pub async fn metrics_for_device(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<DeviceMetric>, StoreError> {
        let metrics = sqlx::query_as(
            "SELECT id, device_id, metric_type_id, value, recorded_at
             FROM device_metrics WHERE device_id = ?
             ORDER BY recorded_at DESC, id DESC LIMIT ?",
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(metrics)
    }
}
