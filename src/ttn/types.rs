//! Request and response bodies for The Things Stack v3 end-device API
//!
//! Field order and `field_mask.paths` follow the provisioning sequence
//! exactly: every request declares the fields it sets and nothing else, so
//! the registry never overwrites state owned by another step.

use serde::{Deserialize, Serialize};

/// End-device version identifiers (Heltec WiFi LoRa 32, class A)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionIds {
    pub brand_id: String,
    pub model_id: String,
    pub hardware_version: String,
    pub firmware_version: String,
    pub band_id: String,
}

impl Default for VersionIds {
    fn default() -> Self {
        Self {
            brand_id: "heltec".to_string(),
            model_id: "wifi-lora-32-class-a-abp".to_string(),
            hardware_version: "_unknown_hw_version_".to_string(),
            firmware_version: "1.0".to_string(),
            band_id: "EU_863_870".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationIds {
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndDeviceIds {
    pub device_id: String,
    pub dev_eui: String,
    pub join_eui: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_ids: Option<ApplicationIds>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMask {
    pub paths: Vec<String>,
}

impl FieldMask {
    fn of(paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyEnvelope {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootKeys {
    pub app_key: KeyEnvelope,
}

impl RootKeys {
    pub fn app_key(key: &str) -> Self {
        Self {
            app_key: KeyEnvelope {
                key: key.to_string(),
            },
        }
    }
}

/// Step 1: `POST /api/v3/applications/{app}/devices`
#[derive(Debug, Clone, Serialize)]
pub struct CreateDeviceRequest {
    pub end_device: CreateEndDevice,
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateEndDevice {
    pub name: String,
    pub ids: EndDeviceIds,
    pub version_ids: VersionIds,
    pub join_server_address: String,
    pub network_server_address: String,
    pub application_server_address: String,
}

impl CreateDeviceRequest {
    pub const FIELD_MASK: &'static [&'static str] = &[
        "join_server_address",
        "network_server_address",
        "application_server_address",
        "version_ids.brand_id",
        "version_ids.model_id",
        "version_ids.hardware_version",
        "version_ids.firmware_version",
        "version_ids.band_id",
    ];

    pub fn new(ids: EndDeviceIds, server_address: &str) -> Self {
        Self {
            end_device: CreateEndDevice {
                name: ids.device_id.clone(),
                ids,
                version_ids: VersionIds::default(),
                join_server_address: server_address.to_string(),
                network_server_address: server_address.to_string(),
                application_server_address: server_address.to_string(),
            },
            field_mask: FieldMask::of(Self::FIELD_MASK),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacSettings {
    pub rx2_data_rate_index: u8,
    pub rx2_frequency: u64,
    pub rx1_delay: u8,
    pub rx1_data_rate_offset: u8,
    pub resets_f_cnt: bool,
}

impl Default for MacSettings {
    fn default() -> Self {
        Self {
            rx2_data_rate_index: 0,
            rx2_frequency: 869_525_000,
            rx1_delay: 1,
            rx1_data_rate_offset: 0,
            resets_f_cnt: false,
        }
    }
}

/// Step 2: `PUT /api/v3/ns/applications/{app}/devices/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct NetworkServerRequest {
    pub end_device: NetworkServerEndDevice,
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkServerEndDevice {
    pub frequency_plan_id: String,
    pub lorawan_phy_version: String,
    pub supports_join: bool,
    pub lorawan_version: String,
    pub ids: EndDeviceIds,
    pub version_ids: VersionIds,
    pub supports_class_c: bool,
    pub supports_class_b: bool,
    pub mac_settings: MacSettings,
}

impl NetworkServerRequest {
    pub const FIELD_MASK: &'static [&'static str] = &[
        "supports_join",
        "lorawan_version",
        "ids.device_id",
        "ids.dev_eui",
        "ids.join_eui",
        "ids.application_ids.application_id",
        "frequency_plan_id",
        "version_ids.brand_id",
        "version_ids.model_id",
        "version_ids.hardware_version",
        "version_ids.firmware_version",
        "version_ids.band_id",
        "lorawan_phy_version",
        "mac_settings.class_c_timeout",
        "mac_settings.supports_32_bit_f_cnt",
    ];

    /// `ids` must not carry `application_ids`; the path names the application
    pub fn new(ids: EndDeviceIds) -> Self {
        Self {
            end_device: NetworkServerEndDevice {
                frequency_plan_id: "EU_863_870_TTN".to_string(),
                lorawan_phy_version: "PHY_V1_0".to_string(),
                supports_join: true,
                lorawan_version: "MAC_V1_0".to_string(),
                ids,
                version_ids: VersionIds::default(),
                supports_class_c: false,
                supports_class_b: false,
                mac_settings: MacSettings::default(),
            },
            field_mask: FieldMask::of(Self::FIELD_MASK),
        }
    }
}

/// Step 3: `PUT /api/v3/as/applications/{app}/devices/{id}`
///
/// `root_keys` sits beside `end_device` here, not inside it.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationServerRequest {
    pub end_device: ApplicationServerEndDevice,
    pub root_keys: RootKeys,
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationServerEndDevice {
    pub ids: EndDeviceIds,
    pub version_ids: VersionIds,
}

impl ApplicationServerRequest {
    pub const FIELD_MASK: &'static [&'static str] = &[
        "ids.device_id",
        "ids.dev_eui",
        "ids.join_eui",
        "ids.application_ids.application_id",
        "version_ids.brand_id",
        "version_ids.model_id",
        "version_ids.hardware_version",
        "version_ids.firmware_version",
        "version_ids.band_id",
    ];

    pub fn new(ids: EndDeviceIds, app_key: &str) -> Self {
        Self {
            end_device: ApplicationServerEndDevice {
                ids,
                version_ids: VersionIds::default(),
            },
            root_keys: RootKeys::app_key(app_key),
            field_mask: FieldMask::of(Self::FIELD_MASK),
        }
    }
}

/// Step 4: `PUT /api/v3/js/applications/{app}/devices/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct JoinServerRequest {
    pub end_device: JoinServerEndDevice,
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinServerEndDevice {
    pub ids: EndDeviceIds,
    pub network_server_address: String,
    pub application_server_address: String,
    pub root_keys: RootKeys,
}

impl JoinServerRequest {
    pub const FIELD_MASK: &'static [&'static str] = &[
        "network_server_address",
        "application_server_address",
        "root_keys.app_key.key",
        "ids.device_id",
        "ids.dev_eui",
        "ids.join_eui",
        "ids.application_ids.application_id",
    ];

    /// `ids` must carry `application_ids`
    pub fn new(ids: EndDeviceIds, server_address: &str, app_key: &str) -> Self {
        Self {
            end_device: JoinServerEndDevice {
                ids,
                network_server_address: server_address.to_string(),
                application_server_address: server_address.to_string(),
                root_keys: RootKeys::app_key(app_key),
            },
            field_mask: FieldMask::of(Self::FIELD_MASK),
        }
    }
}

/// Read-back field masks, one per sub-service
pub const NS_READ_FIELD_MASK: &str = "ids.device_id,ids.dev_eui,ids.join_eui";
pub const AS_READ_FIELD_MASK: &str = "ids.device_id,ids.dev_eui,ids.join_eui";
pub const JS_READ_FIELD_MASK: &str =
    "ids.device_id,ids.dev_eui,ids.join_eui,root_keys.app_key.key,root_keys.nwk_key.key";

/// Join-server read-back; the only response whose content is used
#[derive(Debug, Clone, Deserialize)]
pub struct JoinServerDevice {
    pub ids: ReadBackIds,
    pub root_keys: RootKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadBackIds {
    pub dev_eui: String,
}
